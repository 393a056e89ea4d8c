pub mod audio;
pub mod mixer;
pub mod playlist;

pub use audio::analysis::{TempoEstimator, estimate_bpm};
pub use audio::config::{MixerConfig, TempoConfig};
pub use audio::processor::{ingest_batch, ingest_file};
pub use audio::types::{TempoEstimate, Track, TrackId};
pub use mixer::TransportController;
pub use playlist::{Playlist, order_by_tempo_proximity};

/// Installs the `env_logger` backend, defaulting to `info`. Safe to call more
/// than once.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
