//! The only control path into a mixer session. Every operation that can
//! invalidate the pending deferred action cancels it before acting.

use std::path::Path;

use super::clock::Clock;
use super::deck::{DeckRole, DeckState};
use super::events::{MixerEvent, SessionSnapshot};
use super::output::{AnnouncementSink, DeckOutput};
use super::scheduler::{MixerSession, ScheduleOutcome, TimerHandle};

use crate::audio::config::MixerConfig;
use crate::audio::errors::IngestError;
use crate::audio::processor::ingest_file;
use crate::audio::types::{Track, TrackId};
use crate::playlist::Playlist;

pub struct TransportController<O: DeckOutput, A: AnnouncementSink, C: Clock> {
    session: MixerSession<O, A, C>,
}

impl<O: DeckOutput, A: AnnouncementSink, C: Clock> TransportController<O, A, C> {
    pub fn new(
        playlist: Playlist,
        config: &MixerConfig,
        outputs: [O; 2],
        announcer: A,
        clock: C,
    ) -> Self {
        TransportController {
            session: MixerSession::new(playlist, config, outputs, announcer, clock),
        }
    }

    pub fn session(&self) -> &MixerSession<O, A, C> {
        &self.session
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    pub fn drain_events(&mut self) -> Vec<MixerEvent> {
        self.session.drain_events()
    }

    // --- Playback ---

    /// Resets to the first track on deck A and starts the scheduler.
    pub fn start(&mut self) -> bool {
        if self.session.playlist().is_empty() {
            log::warn!("Transport: start() ignored, playlist is empty");
            return false;
        }
        self.session.cancel_pending();
        self.session.park(DeckRole::A);
        self.session.park(DeckRole::B);
        self.session.reset_to(DeckRole::A, 0);
        self.session.play_on(DeckRole::A, 0);
        let outcome = self.session.schedule_next();
        log::info!("Transport: Session started ({:?})", outcome);
        true
    }

    /// Resumes a paused session. Starts it when it was never started.
    pub fn play(&mut self) -> bool {
        if !self.session.is_started() {
            return self.start();
        }
        if !self.session.is_paused() {
            return false;
        }
        self.session.resume_outputs();
        self.session.set_paused(false);
        if self.session.crossfade_in_progress() {
            log::info!("Transport: Resuming mid-crossfade, completing the swap");
            self.session.finish_crossfade_now();
        } else {
            self.session.schedule_next();
        }
        true
    }

    pub fn pause(&mut self) -> bool {
        if !self.session.is_started() || self.session.is_paused() {
            return false;
        }
        self.session.cancel_pending();
        self.session.pause_outputs();
        self.session.set_paused(true);
        log::info!("Transport: Paused at track {}", self.session.current_index());
        true
    }

    pub fn next(&mut self) -> bool {
        if self.session.playlist().is_empty() {
            log::debug!("Transport: next() ignored, playlist is empty");
            return false;
        }
        if !self.session.is_started() {
            return self.start();
        }
        let target = self.session.current_index() + 1;
        if target >= self.session.playlist().len() {
            log::debug!("Transport: next() at last track, ignoring");
            return false;
        }
        self.skip_to(target)
    }

    pub fn prev(&mut self) -> bool {
        if self.session.playlist().is_empty() || !self.session.is_started() {
            return false;
        }
        let current = self.session.current_index();
        if current == 0 {
            log::debug!("Transport: prev() at first track, ignoring");
            return false;
        }
        self.skip_to(current - 1)
    }

    /// Hard cut onto the inactive deck.
    fn skip_to(&mut self, index: usize) -> bool {
        self.session.cancel_pending();
        let role = self.session.active_role().other();
        self.session.park(DeckRole::A);
        self.session.park(DeckRole::B);
        self.session.reset_to(role, index);
        if !self.session.play_on(role, index) {
            return false;
        }
        self.session.schedule_next();
        true
    }

    // --- Metadata ---

    /// Re-runs the scheduler once the active deck's duration is known.
    pub fn metadata_loaded(&mut self) -> Option<ScheduleOutcome> {
        if !self.session.is_awaiting_metadata() || self.session.pending_count() > 0 {
            return None;
        }
        let outcome = self.session.schedule_next();
        if outcome != ScheduleOutcome::MetadataPending {
            log::debug!("Transport: Metadata arrived ({:?})", outcome);
        }
        Some(outcome)
    }

    /// Records a duration reported by the media layer for a track, forwards it
    /// to any deck holding the track and re-runs a waiting scheduler.
    pub fn report_duration(&mut self, id: TrackId, seconds: f64) -> bool {
        if !seconds.is_finite() || seconds < 0.0 {
            log::warn!("Transport: Rejected duration of {}s for track {}", seconds, id);
            return false;
        }
        let Some(track) = self
            .session
            .playlist()
            .position_of(id)
            .and_then(|index| self.session.playlist_mut().get_mut(index))
        else {
            return false;
        };
        track.duration = Some(seconds);
        if self.session.push_duration(id, seconds) > 0 {
            self.metadata_loaded();
        }
        true
    }

    // --- Playlist Editing ---

    /// Decodes and analyzes a file with the session's tempo settings, then
    /// appends it.
    pub fn add_file(&mut self, path: impl AsRef<Path>) -> Result<TrackId, IngestError> {
        let track = ingest_file(path, self.session.tempo_config())?;
        let id = track.id;
        self.add_track(track);
        Ok(id)
    }

    pub fn add_track(&mut self, track: Track) {
        log::info!("Transport: Appending track '{}' ({})", track.name, track.id);
        self.session.playlist_mut().push(track);
        // A session idling on its final track now has a successor.
        if self.session.is_started()
            && !self.session.is_paused()
            && self.session.pending_count() == 0
            && !self.session.is_awaiting_metadata()
        {
            self.session.schedule_next();
        }
    }

    pub fn remove_track(&mut self, id: TrackId) -> bool {
        if self.session.playlist().position_of(id).is_none() {
            return false;
        }
        let active = self.session.active_role();
        if self.session.is_started() && self.session.bound_track_id(active) == Some(id) {
            return self.remove_active(id);
        }
        if self.session.playlist_mut().remove(id).is_some() {
            log::info!("Transport: Removed track {}", id);
        }
        self.reconcile();
        true
    }

    fn remove_active(&mut self, id: TrackId) -> bool {
        let was_paused = self.session.is_paused();
        self.session.cancel_pending();
        self.session.park(DeckRole::A);
        self.session.park(DeckRole::B);
        let Some((index, _)) = self.session.playlist_mut().remove(id) else {
            return false;
        };
        log::info!("Transport: Removed the playing track {}", id);
        if index < self.session.playlist().len() {
            self.skip_to(index);
            if was_paused {
                self.pause();
            }
        } else {
            self.session.stop();
        }
        true
    }

    pub fn move_track(&mut self, from: usize, to: usize) -> bool {
        if !self.session.playlist_mut().move_track(from, to) {
            return false;
        }
        self.reconcile();
        true
    }

    pub fn auto_order(&mut self) {
        self.session.playlist_mut().auto_order();
        self.reconcile();
    }

    /// Re-resolves deck bindings after an edit and drops a crossfade whose
    /// incoming track is no longer next.
    fn reconcile(&mut self) {
        self.session.rebind_indices();
        if !self.session.is_started() {
            self.session.cancel_pending();
            return;
        }
        let active = self.session.active_role();
        let incoming_index = self.session.deck(active.other()).bound_track_index;
        let fading = self.session.deck(active).state == DeckState::FadingOut;
        let upcoming = self.session.current_index() + 1;
        if fading && incoming_index != Some(upcoming) {
            self.session.abort_crossfade();
        }
        // A still-valid crossfade keeps its pending swap.
        if self.session.is_paused() || self.session.crossfade_in_progress() {
            return;
        }
        self.session.schedule_next();
    }

    pub fn set_crossfade_seconds(&mut self, seconds: f64) -> bool {
        if !seconds.is_finite() || seconds <= 0.0 {
            log::warn!("Transport: Rejected crossfade of {}s", seconds);
            return false;
        }
        self.session.set_crossfade_seconds(seconds);
        if !self.session.crossfade_in_progress() && !self.session.is_paused() {
            self.session.schedule_next();
        }
        true
    }

    // --- Deferred Actions ---

    pub fn fire(&mut self, handle: TimerHandle) -> bool {
        self.session.fire(handle)
    }

    pub fn fire_due(&mut self) -> bool {
        self.session.fire_due()
    }
}
