use crate::audio::analysis::TempoEstimator;
use crate::audio::config::TempoConfig;
use crate::audio::errors::IngestError;
use crate::audio::types::{DecodedAudio, TempoEstimate, Track};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Result of the ingestion boundary: the tempo estimate plus the duration the
/// buffer implies.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestSummary {
    pub tempo: TempoEstimate,
    pub duration_seconds: Option<f64>,
}

/// Runs the estimator over an already-decoded buffer.
pub fn analyze_samples(
    samples: &[f32],
    channels: usize,
    sample_rate: f32,
    config: &TempoConfig,
) -> IngestSummary {
    let tempo = TempoEstimator::new(config.clone()).estimate(samples, channels, sample_rate);
    let frames = samples.len() / channels.max(1);
    let duration_seconds = if sample_rate > 0.0 && frames > 0 {
        Some(frames as f64 / sample_rate as f64)
    } else {
        None
    };
    IngestSummary {
        tempo,
        duration_seconds,
    }
}

/// Builds a track from decoded mono audio, estimating its tempo.
pub fn ingest_decoded(name: impl Into<String>, audio: DecodedAudio, config: &TempoConfig) -> Track {
    let name = name.into();
    let tempo = TempoEstimator::new(config.clone()).estimate_mono(&audio.samples, audio.sample_rate);
    match &tempo {
        TempoEstimate::Detected { bpm, confidence } => {
            log::info!("Ingest: '{}' estimated at {} BPM (confidence {:.2})", name, bpm, confidence)
        }
        TempoEstimate::Unknown(reason) => {
            log::info!("Ingest: '{}' has unknown tempo: {}", name, reason)
        }
    }
    Track::new(name, Arc::new(audio), tempo.bpm())
}

fn track_name_for(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

/// Decodes a file and ingests it as a track named after the file stem.
pub fn ingest_file(path: impl AsRef<Path>, config: &TempoConfig) -> Result<Track, IngestError> {
    let path = path.as_ref();
    log::info!("Ingest: Starting analysis for: {}", path.display());
    let audio = crate::audio::decoding::decode_file_to_mono(path)?;
    Ok(ingest_decoded(track_name_for(path), audio, config))
}

/// Ingests many files in parallel. Output order matches input order.
pub fn ingest_batch(
    paths: &[PathBuf],
    config: &TempoConfig,
) -> Vec<(PathBuf, Result<Track, IngestError>)> {
    log::info!("Ingest Batch: Starting batch analysis for {} files", paths.len());

    let results: Vec<(PathBuf, Result<Track, IngestError>)> = paths
        .par_iter()
        .map(|path| {
            let result = ingest_file(path, config);
            if let Err(e) = &result {
                log::error!("Ingest Batch: Analysis failed for path '{}': {}", path.display(), e);
            }
            (path.clone(), result)
        })
        .collect();

    log::info!("Ingest Batch: Finished batch analysis.");
    results
}
