use symphonia::core::errors::Error as SymphoniaError;
use thiserror::Error;

/// Why the estimator could not settle on a tempo. This is a valid result,
/// not a failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UnknownTempo {
    #[error("Cannot estimate BPM from empty samples")]
    EmptyInput,
    #[error("Invalid sample rate for BPM estimation: {0}")]
    InvalidSampleRate(f32),
    #[error("Input is silent")]
    Silent,
    #[error(
        "Input too short: {flux_frames} envelope frames, need at least {required_frames}"
    )]
    TooShort {
        flux_frames: usize,
        required_frames: usize,
    },
    #[error("Invalid lag range (min: {min_lag}, max: {max_lag})")]
    InvalidLagRange { min_lag: usize, max_lag: usize },
    #[error("No dominant periodicity (peak correlation {confidence:.3})")]
    NoPeriodicity { confidence: f32 },
}

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Failed to open file '{path}': {source}")]
    FileOpenError {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Symphonia probe/format error for '{path}': {source}")]
    FormatError {
        path: String,
        #[source]
        source: SymphoniaError,
    },
    #[error("No suitable audio track in '{path}'")]
    NoSuitableTrack { path: String },
    #[error("Sample rate missing in '{path}'")]
    MissingSampleRate { path: String },
    #[error("Channel info missing in '{path}'")]
    MissingChannelInfo { path: String },
    #[error("Failed to create decoder for '{path}': {source}")]
    DecoderCreationError {
        path: String,
        #[source]
        source: SymphoniaError,
    },
    #[error("Symphonia fatal decode error in '{path}': {source}")]
    FatalDecodeError {
        path: String,
        #[source]
        source: SymphoniaError,
    },
    #[error("Symphonia I/O error reading packet for '{path}': {source}")]
    PacketReadIoError {
        path: String,
        #[source]
        source: SymphoniaError,
    },
    #[error("No samples decoded from '{path}'")]
    NoSamplesDecoded { path: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse mixer config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid BPM range (min: {min_bpm}, max: {max_bpm})")]
    InvalidBpmRange { min_bpm: u32, max_bpm: u32 },
    #[error("Invalid analysis frame layout (frame: {frame_size}, hop: {hop_size})")]
    InvalidFrameLayout { frame_size: usize, hop_size: usize },
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue {
        field: &'static str,
        reason: String,
    },
}

#[derive(Error, Debug)]
pub enum AnnounceError {
    #[error("Announcement sink unavailable: {0}")]
    Unavailable(String),
    #[error("Announcement rejected: {0}")]
    Rejected(String),
}

#[derive(Error, Debug)]
pub enum MixerError {
    #[error("Failed to build mixer runtime: {0}")]
    RuntimeBuild(#[source] std::io::Error),
    #[error("Mixer command channel closed")]
    CommandSendError(
        #[from] tokio::sync::mpsc::error::SendError<crate::mixer::runtime::MixerCommand>,
    ),
    #[error("Mixer thread dropped the reply channel")]
    ReplyDropped(#[from] tokio::sync::oneshot::error::RecvError),
}
