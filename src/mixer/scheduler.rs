//! Crossfade scheduling over the two alternating decks.
//!
//! The session owns both decks, the playlist and the single pending deferred
//! action. Every re-check recomputes remaining time from the live deck
//! position, so pauses and seeks between checks cannot leave a stale delay.

use std::time::Duration;

use super::clock::Clock;
use super::deck::{Deck, DeckRole, DeckState};
use super::events::{MixerEvent, PendingActionView, PendingKind, SessionSnapshot};
use super::output::{AnnouncementSink, DeckOutput, transition_announcement};
use crate::audio::config::{
    CROSSFADE_GUARD_MARGIN_SECONDS, DECK_SWAP_EPSILON_SECONDS, DEFAULT_CROSSFADE_SECONDS,
    MixerConfig, SCHEDULE_COMPARE_SLACK_SECONDS, TempoConfig,
};
use crate::audio::types::TrackId;
use crate::playlist::Playlist;

/// Identifies one scheduled deferred action. Handles from cancelled actions
/// never match again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingAction {
    handle: TimerHandle,
    due: Duration,
    kind: PendingKind,
}

/// What a scheduling pass decided.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScheduleOutcome {
    /// Session not started, paused, or active deck unbound. Also returned when
    /// the computed wait is too large to schedule.
    NotPlaying,
    /// Active deck's duration unknown; re-invoke once metadata arrives.
    MetadataPending,
    /// Active track is the last one; it plays out and the session idles.
    NoNextTrack,
    /// A swap is already pending for the fade in flight.
    CrossfadeInProgress,
    RecheckScheduled { in_seconds: f64 },
    CrossfadeStarted { fade_seconds: f64 },
}

/// Fade length for a track: the configured crossfade, capped at a third of
/// the track so short tracks never overlap back-to-back fades.
pub fn fade_window(crossfade_seconds: f64, duration: f64) -> f64 {
    crossfade_seconds.min(duration / 3.0).max(0.0)
}

pub struct MixerSession<O: DeckOutput, A: AnnouncementSink, C: Clock> {
    playlist: Playlist,
    decks: [Deck; 2],
    outputs: [O; 2],
    active_role: DeckRole,
    current_index: usize,
    crossfade_seconds: f64,
    announce_transitions: bool,
    tempo: TempoConfig,
    pending: Option<PendingAction>,
    next_timer_id: u64,
    started: bool,
    paused: bool,
    awaiting_metadata: bool,
    end_reported: bool,
    announcer: A,
    clock: C,
    events: Vec<MixerEvent>,
}

impl<O: DeckOutput, A: AnnouncementSink, C: Clock> MixerSession<O, A, C> {
    /// `outputs[0]` drives deck A, `outputs[1]` deck B. An invalid config is
    /// logged and its rejected parts replaced by defaults.
    pub fn new(
        playlist: Playlist,
        config: &MixerConfig,
        outputs: [O; 2],
        announcer: A,
        clock: C,
    ) -> Self {
        let mut crossfade_seconds = config.crossfade_seconds;
        let mut tempo = config.tempo.clone();
        if let Err(e) = config.validate() {
            log::warn!("Scheduler: Invalid mixer config, using defaults where needed: {}", e);
            if !crossfade_seconds.is_finite() || crossfade_seconds <= 0.0 {
                crossfade_seconds = DEFAULT_CROSSFADE_SECONDS;
            }
            if tempo.validate().is_err() {
                tempo = TempoConfig::default();
            }
        }
        MixerSession {
            playlist,
            decks: [Deck::new(DeckRole::A), Deck::new(DeckRole::B)],
            outputs,
            active_role: DeckRole::A,
            current_index: 0,
            crossfade_seconds,
            announce_transitions: config.announce_transitions,
            tempo,
            pending: None,
            next_timer_id: 0,
            started: false,
            paused: false,
            awaiting_metadata: false,
            end_reported: false,
            announcer,
            clock,
            events: Vec::new(),
        }
    }

    // --- Read Access ---

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn deck(&self, role: DeckRole) -> &Deck {
        &self.decks[role.index()]
    }

    pub fn output(&self, role: DeckRole) -> &O {
        &self.outputs[role.index()]
    }

    pub fn active_role(&self) -> DeckRole {
        self.active_role
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn crossfade_seconds(&self) -> f64 {
        self.crossfade_seconds
    }

    /// Estimator settings for tracks ingested into this session.
    pub fn tempo_config(&self) -> &TempoConfig {
        &self.tempo
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_awaiting_metadata(&self) -> bool {
        self.awaiting_metadata
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn pending_count(&self) -> usize {
        usize::from(self.pending.is_some())
    }

    pub fn pending_handle(&self) -> Option<TimerHandle> {
        self.pending.map(|p| p.handle)
    }

    pub fn pending_kind(&self) -> Option<PendingKind> {
        self.pending.map(|p| p.kind)
    }

    /// Clock time at which the pending action becomes due.
    pub fn next_due(&self) -> Option<Duration> {
        self.pending.map(|p| p.due)
    }

    /// Both decks audible with complementary ramps.
    pub fn crossfade_in_progress(&self) -> bool {
        self.decks[self.active_role.index()].state == DeckState::FadingOut
            && self.decks[self.active_role.other().index()].state == DeckState::Playing
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let now = self.clock.now();
        let mut decks = self.decks.clone();
        for deck in decks.iter_mut() {
            if deck.bound_track_index.is_some() {
                deck.position = self.outputs[deck.role.index()].position();
            }
        }
        SessionSnapshot {
            started: self.started,
            paused: self.paused,
            active_deck: self.active_role,
            current_index: self.current_index,
            crossfade_seconds: self.crossfade_seconds,
            playlist_len: self.playlist.len(),
            pending: self.pending.map(|p| PendingActionView {
                kind: p.kind,
                due_in_seconds: p.due.saturating_sub(now).as_secs_f64(),
            }),
            decks,
        }
    }

    pub fn drain_events(&mut self) -> Vec<MixerEvent> {
        std::mem::take(&mut self.events)
    }

    // --- Deferred Actions ---

    pub(crate) fn cancel_pending(&mut self) -> bool {
        match self.pending.take() {
            Some(action) => {
                log::debug!("Scheduler: Cancelled pending {:?} ({:?})", action.kind, action.handle);
                true
            }
            None => false,
        }
    }

    /// Replaces the pending action. Delays that do not fit a `Duration` leave
    /// nothing scheduled.
    fn set_pending(&mut self, kind: PendingKind, delay_seconds: f64) -> Option<TimerHandle> {
        self.cancel_pending();
        let delay = match Duration::try_from_secs_f64(delay_seconds.max(0.0)) {
            Ok(delay) => delay,
            Err(e) => {
                log::warn!(
                    "Scheduler: Not scheduling {:?}, delay {}s is unusable: {}",
                    kind,
                    delay_seconds,
                    e
                );
                return None;
            }
        };
        self.next_timer_id += 1;
        let handle = TimerHandle(self.next_timer_id);
        let due = self.clock.now().checked_add(delay)?;
        self.pending = Some(PendingAction { handle, due, kind });
        log::debug!(
            "Scheduler: {:?} scheduled in {:.3}s ({:?})",
            kind,
            delay_seconds,
            handle
        );
        Some(handle)
    }

    /// Runs the pending action if `handle` is still the current one.
    pub(crate) fn fire(&mut self, handle: TimerHandle) -> bool {
        match self.pending {
            Some(action) if action.handle == handle => {
                self.pending = None;
                match action.kind {
                    PendingKind::Recheck => {
                        self.schedule_next();
                    }
                    PendingKind::DeckSwap => self.complete_swap(),
                }
                true
            }
            _ => {
                log::debug!("Scheduler: Ignoring stale timer {:?}", handle);
                false
            }
        }
    }

    /// Runs the pending action if its due time has been reached.
    pub(crate) fn fire_due(&mut self) -> bool {
        match self.pending {
            Some(action) if action.due <= self.clock.now() => self.fire(action.handle),
            _ => false,
        }
    }

    // --- Scheduling ---

    /// Decides whether the active deck should start fading now, and arranges
    /// the one deferred action that follows.
    pub(crate) fn schedule_next(&mut self) -> ScheduleOutcome {
        if self.crossfade_in_progress() && self.pending_kind() == Some(PendingKind::DeckSwap) {
            return ScheduleOutcome::CrossfadeInProgress;
        }
        self.cancel_pending();
        if !self.started || self.paused {
            return ScheduleOutcome::NotPlaying;
        }

        let role = self.active_role;
        let Some(track_index) = self.decks[role.index()].bound_track_index else {
            return ScheduleOutcome::NotPlaying;
        };
        let Some(duration) = self.outputs[role.index()]
            .duration()
            .filter(|d| d.is_finite() && *d >= 0.0)
        else {
            if !self.awaiting_metadata {
                log::debug!("Scheduler: Deck {} waiting for track metadata", role);
            }
            self.awaiting_metadata = true;
            return ScheduleOutcome::MetadataPending;
        };
        self.awaiting_metadata = false;

        let next_index = track_index + 1;
        if next_index >= self.playlist.len() {
            if !self.end_reported {
                log::info!("Scheduler: Deck {} holds the last track; letting it play out", role);
                self.end_reported = true;
                self.events.push(MixerEvent::PlaylistEnded);
            }
            return ScheduleOutcome::NoNextTrack;
        }

        let position = self.outputs[role.index()].position();
        self.decks[role.index()].position = position;
        let remaining = (duration - position).max(0.0);
        let fade = fade_window(self.crossfade_seconds, duration);

        if remaining <= fade + CROSSFADE_GUARD_MARGIN_SECONDS + SCHEDULE_COMPARE_SLACK_SECONDS {
            self.begin_crossfade(next_index, fade);
            self.set_pending(PendingKind::DeckSwap, fade + DECK_SWAP_EPSILON_SECONDS);
            ScheduleOutcome::CrossfadeStarted { fade_seconds: fade }
        } else {
            let delay = remaining - fade - CROSSFADE_GUARD_MARGIN_SECONDS;
            match self.set_pending(PendingKind::Recheck, delay) {
                Some(_) => ScheduleOutcome::RecheckScheduled { in_seconds: delay },
                None => ScheduleOutcome::NotPlaying,
            }
        }
    }

    fn begin_crossfade(&mut self, next_index: usize, fade: f64) {
        let from = self.active_role;
        let to = from.other();
        let Some(track) = self.playlist.get(next_index) else {
            return;
        };
        let (track_id, text) = (track.id, transition_announcement(track));

        let incoming = &mut self.outputs[to.index()];
        incoming.load(track);
        incoming.seek(0.0);
        incoming.set_gain(0.0);
        self.decks[to.index()].arm(next_index, track_id);

        if self.announce_transitions {
            if let Err(e) = self.announcer.announce(&text) {
                log::warn!("Scheduler: Announcement failed, continuing: {}", e);
            }
        }

        let incoming = &mut self.outputs[to.index()];
        incoming.play();
        incoming.ramp_gain(0.0, 1.0, fade);
        let incoming_deck = &mut self.decks[to.index()];
        incoming_deck.state = DeckState::Playing;
        incoming_deck.gain_level = 1.0;

        let outgoing_deck = &mut self.decks[from.index()];
        let current_gain = outgoing_deck.gain_level;
        outgoing_deck.gain_level = 0.0;
        outgoing_deck.state = DeckState::FadingOut;
        self.outputs[from.index()].ramp_gain(current_gain, 0.0, fade);

        log::info!(
            "Scheduler: Crossfading deck {} -> {} over {:.2}s into track {}",
            from,
            to,
            fade,
            next_index
        );
        self.events.push(MixerEvent::CrossfadeStarted {
            from_deck: from,
            to_deck: to,
            next_track_id: track_id,
            fade_seconds: fade,
        });
    }

    /// Parks the faded-out deck, hands the active role over, and schedules the
    /// next transition.
    fn complete_swap(&mut self) {
        let from = self.active_role;
        let to = from.other();
        let Some(next_index) = self.decks[to.index()].bound_track_index else {
            log::warn!("Scheduler: Deck swap fired with nothing bound to deck {}", to);
            return;
        };
        self.park(from);
        self.active_role = to;
        self.current_index = next_index;
        // The queue may have grown since the previous end was reported.
        self.end_reported = false;
        let deck = &mut self.decks[to.index()];
        deck.state = DeckState::Playing;
        deck.gain_level = 1.0;
        let track_id = deck.bound_track_id;

        log::info!("Scheduler: Deck {} is now active on track {}", to, next_index);
        if let Some(track_id) = track_id {
            self.events.push(MixerEvent::DeckSwapped {
                active_deck: to,
                track_id,
                index: next_index,
            });
        }
        self.schedule_next();
    }

    /// Completes an interrupted crossfade immediately.
    pub(crate) fn finish_crossfade_now(&mut self) {
        self.cancel_pending();
        let to = self.active_role.other();
        self.outputs[self.active_role.index()].set_gain(0.0);
        self.outputs[to.index()].set_gain(1.0);
        self.complete_swap();
    }

    /// Drops the incoming deck of a crossfade and restores the active deck.
    pub(crate) fn abort_crossfade(&mut self) {
        self.cancel_pending();
        let from = self.active_role;
        let to = from.other();
        self.park(to);
        self.outputs[from.index()].set_gain(1.0);
        let deck = &mut self.decks[from.index()];
        deck.gain_level = 1.0;
        deck.state = DeckState::Playing;
        log::info!("Scheduler: Aborted crossfade into deck {}", to);
        self.events.push(MixerEvent::CrossfadeAborted { deck: to });
    }

    // --- Deck Control ---

    /// Binds `index` to `role` at full gain and starts it.
    pub(crate) fn play_on(&mut self, role: DeckRole, index: usize) -> bool {
        let Some(track) = self.playlist.get(index) else {
            return false;
        };
        let track_id = track.id;
        let output = &mut self.outputs[role.index()];
        output.load(track);
        output.seek(0.0);
        output.set_gain(1.0);
        output.play();
        let deck = &mut self.decks[role.index()];
        deck.arm(index, track_id);
        deck.gain_level = 1.0;
        deck.state = DeckState::Playing;
        self.end_reported = false;
        log::info!("Scheduler: Deck {} playing track {} ({})", role, index, track_id);
        self.events.push(MixerEvent::TrackStarted {
            deck: role,
            track_id,
            index,
        });
        true
    }

    /// Pauses and unbinds a deck.
    pub(crate) fn park(&mut self, role: DeckRole) {
        let output = &mut self.outputs[role.index()];
        output.pause();
        if self.decks[role.index()].bound_track_index.is_some() {
            output.unload();
        }
        self.decks[role.index()].release();
    }

    pub(crate) fn pause_outputs(&mut self) {
        for (deck, output) in self.decks.iter_mut().zip(self.outputs.iter_mut()) {
            if deck.state.is_audible() {
                output.pause();
                deck.position = output.position();
            }
        }
    }

    pub(crate) fn resume_outputs(&mut self) {
        for (deck, output) in self.decks.iter().zip(self.outputs.iter_mut()) {
            if deck.state.is_audible() {
                output.play();
            }
        }
    }

    // --- Session State ---

    pub(crate) fn reset_to(&mut self, role: DeckRole, index: usize) {
        self.active_role = role;
        self.current_index = index;
        self.started = true;
        self.paused = false;
        self.awaiting_metadata = false;
    }

    pub(crate) fn stop(&mut self) {
        self.cancel_pending();
        self.park(DeckRole::A);
        self.park(DeckRole::B);
        self.active_role = DeckRole::A;
        self.current_index = 0;
        self.started = false;
        self.paused = false;
        self.awaiting_metadata = false;
        self.events.push(MixerEvent::Stopped);
    }

    pub(crate) fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
        self.events
            .push(if paused { MixerEvent::Paused } else { MixerEvent::Resumed });
    }

    pub(crate) fn set_crossfade_seconds(&mut self, seconds: f64) {
        self.crossfade_seconds = seconds;
    }

    pub(crate) fn playlist_mut(&mut self) -> &mut Playlist {
        &mut self.playlist
    }

    pub(crate) fn bound_track_id(&self, role: DeckRole) -> Option<TrackId> {
        self.decks[role.index()].bound_track_id
    }

    /// Forwards a learned duration to every deck holding `id`.
    pub(crate) fn push_duration(&mut self, id: TrackId, seconds: f64) -> usize {
        let mut updated = 0;
        for (deck, output) in self.decks.iter().zip(self.outputs.iter_mut()) {
            if deck.bound_track_id == Some(id) {
                output.set_duration(seconds);
                updated += 1;
            }
        }
        updated
    }

    /// Re-resolves deck bindings by track id after a playlist edit. Decks whose
    /// track left the playlist are parked.
    pub(crate) fn rebind_indices(&mut self) {
        for role in [DeckRole::A, DeckRole::B] {
            let Some(id) = self.decks[role.index()].bound_track_id else {
                continue;
            };
            match self.playlist.position_of(id) {
                Some(index) => self.decks[role.index()].bound_track_index = Some(index),
                None => self.park(role),
            }
        }
        if let Some(index) = self.decks[self.active_role.index()].bound_track_index {
            self.current_index = index;
        }
    }
}
