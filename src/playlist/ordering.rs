use crate::audio::config::FALLBACK_ORDERING_BPM;
use crate::audio::types::Track;

fn comparison_bpm(track: &Track) -> u32 {
    track.bpm.unwrap_or(FALLBACK_ORDERING_BPM)
}

/// Keeps the first track as the anchor and sorts the rest by ascending
/// absolute BPM distance from it. Equal distances keep their original
/// relative order. Unknown tempos compare as 120 BPM; tracks are not mutated.
pub fn order_by_tempo_proximity(tracks: Vec<Track>) -> Vec<Track> {
    if tracks.len() < 2 {
        return tracks;
    }
    let mut iter = tracks.into_iter();
    let Some(anchor) = iter.next() else {
        return Vec::new();
    };
    let anchor_bpm = comparison_bpm(&anchor);

    let mut rest: Vec<Track> = iter.collect();
    // `sort_by_key` is stable.
    rest.sort_by_key(|track| comparison_bpm(track).abs_diff(anchor_bpm));

    let mut ordered = Vec::with_capacity(rest.len() + 1);
    ordered.push(anchor);
    ordered.extend(rest);
    ordered
}
