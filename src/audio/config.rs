use serde::{Deserialize, Serialize};

use super::errors::ConfigError;

// --- BPM Analyzer Constants ---
// Plausible tempo range for the estimator
pub const BPM_MIN: u32 = 60;
pub const BPM_MAX: u32 = 200;

pub const BPM_FRAME_SIZE: usize = 1024;
pub const BPM_HOP_SIZE: usize = BPM_FRAME_SIZE / 4;
pub const BPM_DOWNSAMPLE_FACTOR: usize = 2;

/// Normalized autocorrelation peak below which a buffer is considered to
/// have no dominant periodicity.
pub const BPM_MIN_CONFIDENCE: f32 = 0.15;

/// Tempo substituted for tracks of unknown BPM when ordering by proximity.
pub const FALLBACK_ORDERING_BPM: u32 = 120;

// --- Utility Constants --
pub const DEFAULT_MONO_SAMPLE_CAPACITY: usize = 1024 * 256;

// --- Crossfade Scheduling Constants ---
pub const DEFAULT_CROSSFADE_SECONDS: f64 = 8.0;
/// Compensates for timer granularity when checking whether a fade is due.
pub const CROSSFADE_GUARD_MARGIN_SECONDS: f64 = 0.25;
/// Delay past the end of the fade before the deck swap runs.
pub const DECK_SWAP_EPSILON_SECONDS: f64 = 0.05;
/// Slack for comparing live remaining time against the fade threshold.
pub const SCHEDULE_COMPARE_SLACK_SECONDS: f64 = 1e-3;

// --- Mixer Thread Constants ---
// Interval for metadata polling while the active deck waits on a duration.
pub const MIXER_THREAD_TICK_INTERVAL_MS: u64 = 250;
pub const MIXER_COMMAND_CHAN_SIZE: usize = 32;

/// Tuning for the tempo estimator.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct TempoConfig {
    pub min_bpm: u32,
    pub max_bpm: u32,
    pub frame_size: usize,
    pub hop_size: usize,
    pub downsample_factor: usize,
    pub min_confidence: f32,
}

impl Default for TempoConfig {
    fn default() -> Self {
        TempoConfig {
            min_bpm: BPM_MIN,
            max_bpm: BPM_MAX,
            frame_size: BPM_FRAME_SIZE,
            hop_size: BPM_HOP_SIZE,
            downsample_factor: BPM_DOWNSAMPLE_FACTOR,
            min_confidence: BPM_MIN_CONFIDENCE,
        }
    }
}

impl TempoConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_bpm == 0 || self.min_bpm >= self.max_bpm {
            return Err(ConfigError::InvalidBpmRange {
                min_bpm: self.min_bpm,
                max_bpm: self.max_bpm,
            });
        }
        if self.frame_size < 2 || self.hop_size == 0 || self.hop_size > self.frame_size {
            return Err(ConfigError::InvalidFrameLayout {
                frame_size: self.frame_size,
                hop_size: self.hop_size,
            });
        }
        if self.downsample_factor == 0 {
            return Err(ConfigError::InvalidValue {
                field: "downsampleFactor",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(ConfigError::InvalidValue {
                field: "minConfidence",
                reason: format!("{} is outside 0..=1", self.min_confidence),
            });
        }
        Ok(())
    }
}

/// Session-level settings supplied by the host application.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct MixerConfig {
    pub crossfade_seconds: f64,
    pub announce_transitions: bool,
    pub tempo: TempoConfig,
}

impl Default for MixerConfig {
    fn default() -> Self {
        MixerConfig {
            crossfade_seconds: DEFAULT_CROSSFADE_SECONDS,
            announce_transitions: true,
            tempo: TempoConfig::default(),
        }
    }
}

impl MixerConfig {
    /// Parses and validates a JSON document. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: MixerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.crossfade_seconds.is_finite() || self.crossfade_seconds <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "crossfadeSeconds",
                reason: format!("{} is not a positive duration", self.crossfade_seconds),
            });
        }
        self.tempo.validate()
    }
}
