use serde::{Deserialize, Serialize};
use std::fmt;

use crate::audio::types::TrackId;

/// One of the two alternating playback slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeckRole {
    A,
    B,
}

impl DeckRole {
    pub fn index(&self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }

    pub fn other(&self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

impl fmt::Display for DeckRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeckState {
    /// No track bound, silent.
    #[default]
    Idle,
    /// Track bound and cued at the start, silent.
    Armed,
    /// Audible, gain ramping toward or holding at 1.
    Playing,
    /// Still audible while gain ramps toward 0.
    FadingOut,
}

impl DeckState {
    pub fn is_audible(&self) -> bool {
        matches!(self, Self::Playing | Self::FadingOut)
    }
}

/// Scheduler-side record of a deck. `gain_level` is the target of the last
/// issued gain command; the audio layer evaluates the ramp itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Deck {
    pub role: DeckRole,
    pub bound_track_index: Option<usize>,
    pub bound_track_id: Option<TrackId>,
    pub position: f64,
    pub gain_level: f32,
    pub state: DeckState,
}

impl Deck {
    pub fn new(role: DeckRole) -> Self {
        Deck {
            role,
            bound_track_index: None,
            bound_track_id: None,
            position: 0.0,
            gain_level: 0.0,
            state: DeckState::Idle,
        }
    }

    /// Binds a track cued at zero, silent.
    pub(crate) fn arm(&mut self, index: usize, id: TrackId) {
        self.bound_track_index = Some(index);
        self.bound_track_id = Some(id);
        self.position = 0.0;
        self.gain_level = 0.0;
        self.state = DeckState::Armed;
    }

    pub(crate) fn release(&mut self) {
        self.bound_track_index = None;
        self.bound_track_id = None;
        self.position = 0.0;
        self.gain_level = 0.0;
        self.state = DeckState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deck_role() {
        assert_eq!(DeckRole::A.index(), 0);
        assert_eq!(DeckRole::B.index(), 1);
        assert_eq!(DeckRole::A.other(), DeckRole::B);
        assert_eq!(DeckRole::B.other().other(), DeckRole::B);
        assert_eq!(DeckRole::B.to_string(), "B");
    }

    #[test]
    fn test_arm_and_release() {
        let mut deck = Deck::new(DeckRole::A);
        assert!(!deck.state.is_audible());
        deck.arm(3, TrackId(9));
        assert_eq!(deck.bound_track_index, Some(3));
        assert_eq!(deck.bound_track_id, Some(TrackId(9)));
        assert_eq!(deck.state, DeckState::Armed);
        deck.state = DeckState::FadingOut;
        assert!(deck.state.is_audible());
        deck.release();
        assert_eq!(deck, Deck::new(DeckRole::A));
    }
}
