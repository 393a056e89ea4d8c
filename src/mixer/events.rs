use serde::Serialize;

use super::deck::{Deck, DeckRole};
use crate::audio::types::TrackId;

// --- Event Payloads for the Presentation Layer ---

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MixerEvent {
    #[serde(rename_all = "camelCase")]
    TrackStarted {
        deck: DeckRole,
        track_id: TrackId,
        index: usize,
    },
    #[serde(rename_all = "camelCase")]
    CrossfadeStarted {
        from_deck: DeckRole,
        to_deck: DeckRole,
        next_track_id: TrackId,
        fade_seconds: f64,
    },
    #[serde(rename_all = "camelCase")]
    DeckSwapped {
        active_deck: DeckRole,
        track_id: TrackId,
        index: usize,
    },
    #[serde(rename_all = "camelCase")]
    CrossfadeAborted { deck: DeckRole },
    PlaylistEnded,
    Paused,
    Resumed,
    Stopped,
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PendingKind {
    Recheck,
    DeckSwap,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PendingActionView {
    pub kind: PendingKind,
    pub due_in_seconds: f64,
}

/// Point-in-time view of a session for status displays.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub started: bool,
    pub paused: bool,
    pub active_deck: DeckRole,
    pub current_index: usize,
    pub crossfade_seconds: f64,
    pub playlist_len: usize,
    pub pending: Option<PendingActionView>,
    pub decks: [Deck; 2],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_shape() {
        let event = MixerEvent::DeckSwapped {
            active_deck: DeckRole::B,
            track_id: TrackId(7),
            index: 1,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "deckSwapped");
        assert_eq!(json["activeDeck"], "B");
        assert_eq!(json["trackId"], 7);

        let json = serde_json::to_value(MixerEvent::PlaylistEnded).unwrap();
        assert_eq!(json["type"], "playlistEnded");
    }
}
