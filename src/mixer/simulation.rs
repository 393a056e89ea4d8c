//! Offline deck backend that advances playback against a [`Clock`]. Used for
//! headless sessions and for exercising the scheduler without audio hardware.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::clock::Clock;
use super::output::DeckOutput;
use crate::audio::types::{Track, TrackId};

/// Shared switch controlling whether loaded tracks report their duration yet.
#[derive(Debug, Clone)]
pub struct MetadataGate(Arc<AtomicBool>);

impl MetadataGate {
    pub fn open() -> Self {
        MetadataGate(Arc::new(AtomicBool::new(true)))
    }

    pub fn closed() -> Self {
        MetadataGate(Arc::new(AtomicBool::new(false)))
    }

    pub fn release(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn hold(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_open(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainRamp {
    pub from: f32,
    pub to: f32,
    pub started_at: Duration,
    pub over_seconds: f64,
}

impl GainRamp {
    pub fn level_at(&self, now: Duration) -> f32 {
        if self.over_seconds <= 0.0 {
            return self.to;
        }
        let elapsed = now.saturating_sub(self.started_at).as_secs_f64();
        let t = (elapsed / self.over_seconds).clamp(0.0, 1.0) as f32;
        self.from + (self.to - self.from) * t
    }
}

pub struct SimulatedOutput<C: Clock> {
    clock: C,
    metadata: MetadataGate,
    loaded: Option<(TrackId, Option<f64>)>,
    playing: bool,
    anchor_position: f64,
    anchor_time: Duration,
    ramp: GainRamp,
    ramp_history: Vec<GainRamp>,
}

impl<C: Clock> SimulatedOutput<C> {
    pub fn new(clock: C) -> Self {
        Self::with_metadata_gate(clock, MetadataGate::open())
    }

    pub fn with_metadata_gate(clock: C, metadata: MetadataGate) -> Self {
        let now = clock.now();
        SimulatedOutput {
            clock,
            metadata,
            loaded: None,
            playing: false,
            anchor_position: 0.0,
            anchor_time: now,
            ramp: GainRamp {
                from: 0.0,
                to: 0.0,
                started_at: now,
                over_seconds: 0.0,
            },
            ramp_history: Vec::new(),
        }
    }

    pub fn loaded_track(&self) -> Option<TrackId> {
        self.loaded.map(|(id, _)| id)
    }

    /// True while playing and short of the track's end.
    pub fn is_playing(&self) -> bool {
        if !self.playing {
            return false;
        }
        match self.known_duration() {
            Some(duration) => self.live_position() < duration,
            None => true,
        }
    }

    /// Gain as the audio layer would render it right now.
    pub fn gain(&self) -> f32 {
        self.ramp.level_at(self.clock.now())
    }

    pub fn current_ramp(&self) -> GainRamp {
        self.ramp
    }

    pub fn ramp_history(&self) -> &[GainRamp] {
        &self.ramp_history
    }

    fn known_duration(&self) -> Option<f64> {
        self.loaded.and_then(|(_, duration)| duration)
    }

    fn live_position(&self) -> f64 {
        let mut position = self.anchor_position;
        if self.playing {
            position += self.clock.now().saturating_sub(self.anchor_time).as_secs_f64();
        }
        match self.known_duration() {
            Some(duration) => position.min(duration),
            None => position,
        }
    }

    fn re_anchor(&mut self, position: f64) {
        self.anchor_position = position;
        self.anchor_time = self.clock.now();
    }
}

impl<C: Clock> DeckOutput for SimulatedOutput<C> {
    fn load(&mut self, track: &Track) {
        self.loaded = Some((track.id, track.duration));
        self.playing = false;
        self.re_anchor(0.0);
    }

    fn unload(&mut self) {
        self.loaded = None;
        self.playing = false;
        self.re_anchor(0.0);
    }

    fn duration(&self) -> Option<f64> {
        if self.metadata.is_open() {
            self.known_duration()
        } else {
            None
        }
    }

    fn position(&self) -> f64 {
        self.live_position()
    }

    fn set_duration(&mut self, seconds: f64) {
        if let Some((id, _)) = self.loaded {
            let position = self.live_position().min(seconds);
            self.loaded = Some((id, Some(seconds)));
            self.re_anchor(position);
        }
    }

    fn seek(&mut self, seconds: f64) {
        let target = match self.known_duration() {
            Some(duration) => seconds.clamp(0.0, duration),
            None => seconds.max(0.0),
        };
        self.re_anchor(target);
    }

    fn play(&mut self) {
        if self.loaded.is_none() || self.playing {
            return;
        }
        let position = self.live_position();
        self.playing = true;
        self.re_anchor(position);
    }

    fn pause(&mut self) {
        if !self.playing {
            return;
        }
        let position = self.live_position();
        self.playing = false;
        self.re_anchor(position);
    }

    fn ramp_gain(&mut self, from: f32, to: f32, over_seconds: f64) {
        self.ramp = GainRamp {
            from: from.clamp(0.0, 1.0),
            to: to.clamp(0.0, 1.0),
            started_at: self.clock.now(),
            over_seconds: over_seconds.max(0.0),
        };
        self.ramp_history.push(self.ramp);
    }
}
