//! Ordered track sequence owned by a mixer session.

pub mod ordering;

pub use ordering::order_by_tempo_proximity;

use crate::audio::types::{Track, TrackId, TrackSummary};

#[derive(Debug, Clone, Default)]
pub struct Playlist {
    tracks: Vec<Track>,
}

impl Playlist {
    pub fn new() -> Self {
        Playlist { tracks: Vec::new() }
    }

    pub fn from_tracks(tracks: Vec<Track>) -> Self {
        Playlist { tracks }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Track> {
        self.tracks.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    pub fn position_of(&self, id: TrackId) -> Option<usize> {
        self.tracks.iter().position(|t| t.id == id)
    }

    pub fn push(&mut self, track: Track) {
        self.tracks.push(track);
    }

    /// Removes a track, returning it. Dropping the returned track releases its
    /// audio once no deck holds it.
    pub fn remove(&mut self, id: TrackId) -> Option<(usize, Track)> {
        let index = self.position_of(id)?;
        Some((index, self.tracks.remove(index)))
    }

    /// Moves the track at `from` so it ends up at `to`. Returns false when
    /// either index is out of range.
    pub fn move_track(&mut self, from: usize, to: usize) -> bool {
        if from >= self.tracks.len() || to >= self.tracks.len() {
            return false;
        }
        let track = self.tracks.remove(from);
        self.tracks.insert(to, track);
        true
    }

    pub fn auto_order(&mut self) {
        let tracks = std::mem::take(&mut self.tracks);
        self.tracks = order_by_tempo_proximity(tracks);
    }

    pub fn summaries(&self) -> Vec<TrackSummary> {
        self.tracks.iter().map(Track::summary).collect()
    }
}
