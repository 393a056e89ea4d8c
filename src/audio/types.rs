use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::errors::UnknownTempo;

// --- Track Identity ---

static NEXT_TRACK_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a track within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackId(pub u64);

impl TrackId {
    pub fn next() -> Self {
        TrackId(NEXT_TRACK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// --- Decoded Audio ---

/// Mono samples owned by a track. Dropping the last handle releases them.
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: f32,
}

impl DecodedAudio {
    pub fn new(samples: Vec<f32>, sample_rate: f32) -> Self {
        DecodedAudio {
            samples,
            sample_rate,
        }
    }

    pub fn duration_seconds(&self) -> Option<f64> {
        if self.sample_rate > 0.0 && !self.samples.is_empty() {
            Some(self.samples.len() as f64 / self.sample_rate as f64)
        } else {
            None
        }
    }
}

impl fmt::Debug for DecodedAudio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedAudio")
            .field("samples", &self.samples.len())
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

pub type AudioHandle = Arc<DecodedAudio>;

// --- Tempo ---

/// Result of running the tempo estimator over a buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum TempoEstimate {
    Detected { bpm: u32, confidence: f32 },
    Unknown(UnknownTempo),
}

impl TempoEstimate {
    pub fn bpm(&self) -> Option<u32> {
        match self {
            TempoEstimate::Detected { bpm, .. } => Some(*bpm),
            TempoEstimate::Unknown(_) => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, TempoEstimate::Unknown(_))
    }
}

// --- Track ---

#[derive(Debug, Clone)]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    pub audio: AudioHandle,
    pub bpm: Option<u32>,
    /// Seconds; `None` until the media layer reports it.
    pub duration: Option<f64>,
}

impl Track {
    pub fn new(name: impl Into<String>, audio: AudioHandle, bpm: Option<u32>) -> Self {
        let duration = audio.duration_seconds();
        Track {
            id: TrackId::next(),
            name: name.into(),
            audio,
            bpm,
            duration,
        }
    }

    /// A track with no decoded samples of its own, for hosts whose media layer
    /// owns the audio. Duration stays unknown until reported.
    pub fn placeholder(name: impl Into<String>, bpm: Option<u32>) -> Self {
        Track::new(name, Arc::new(DecodedAudio::new(Vec::new(), 0.0)), bpm)
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn summary(&self) -> TrackSummary {
        TrackSummary {
            id: self.id,
            name: self.name.clone(),
            bpm: self.bpm,
            duration_seconds: self.duration,
        }
    }
}

/// Serializable view of a track for the presentation layer.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrackSummary {
    pub id: TrackId,
    pub name: String,
    pub bpm: Option<u32>,
    pub duration_seconds: Option<f64>,
}
