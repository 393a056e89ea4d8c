pub mod bpm_analyzer;

pub use bpm_analyzer::{TempoEstimator, estimate_bpm};
