//! Capabilities the mixer consumes from the host: a playback slot per deck and
//! a text announcement sink.

use crate::audio::errors::AnnounceError;
use crate::audio::types::Track;

/// Playback slot driven by the scheduler. Implemented by the host's audio
/// subsystem; the mixer never decodes or renders audio itself.
pub trait DeckOutput {
    /// Bind the track's audio to this slot. Metadata may arrive later.
    fn load(&mut self, track: &Track);
    fn unload(&mut self);
    /// Track length in seconds, or `None` while metadata is pending.
    fn duration(&self) -> Option<f64>;
    /// Current playback position in seconds.
    fn position(&self) -> f64;
    fn seek(&mut self, seconds: f64);
    /// Duration learned outside the media layer, e.g. from a host's metadata
    /// scan. Backends that read duration from the stream can ignore it.
    fn set_duration(&mut self, _seconds: f64) {}
    fn play(&mut self);
    fn pause(&mut self);
    /// Linear gain ramp starting now. Evaluated by the audio layer; the
    /// scheduler does not poll it.
    fn ramp_gain(&mut self, from: f32, to: f32, over_seconds: f64);

    fn set_gain(&mut self, level: f32) {
        self.ramp_gain(level, level, 0.0);
    }
}

/// Fire-and-forget sink for spoken transition announcements.
pub trait AnnouncementSink {
    fn announce(&mut self, text: &str) -> Result<(), AnnounceError>;
}

impl<F: FnMut(&str)> AnnouncementSink for F {
    fn announce(&mut self, text: &str) -> Result<(), AnnounceError> {
        self(text);
        Ok(())
    }
}

/// Writes announcements to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAnnouncer;

impl AnnouncementSink for LogAnnouncer {
    fn announce(&mut self, text: &str) -> Result<(), AnnounceError> {
        log::info!("Announcer: {}", text);
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullAnnouncer;

impl AnnouncementSink for NullAnnouncer {
    fn announce(&mut self, _text: &str) -> Result<(), AnnounceError> {
        Ok(())
    }
}

pub(crate) fn transition_announcement(track: &Track) -> String {
    match track.bpm {
        Some(bpm) => format!("Up next: {} at {} BPM", track.name, bpm),
        None => format!("Up next: {}", track.name),
    }
}
