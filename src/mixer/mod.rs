//! Two-deck automix: crossfade scheduling, transport control, and the async
//! host loop that runs them.

pub mod clock;
pub mod deck;
pub mod events;
pub mod output;
pub mod runtime;
pub mod scheduler;
pub mod simulation;
pub mod transport;

pub use clock::{Clock, ManualClock, TokioClock};
pub use deck::{Deck, DeckRole, DeckState};
pub use events::{MixerEvent, PendingActionView, PendingKind, SessionSnapshot};
pub use output::{AnnouncementSink, DeckOutput, LogAnnouncer, NullAnnouncer};
pub use runtime::{MixerCommand, MixerHandle, mixer_channel, run_mixer, run_mixer_thread};
pub use scheduler::{MixerSession, ScheduleOutcome, TimerHandle, fade_window};
pub use simulation::{MetadataGate, SimulatedOutput};
pub use transport::TransportController;
