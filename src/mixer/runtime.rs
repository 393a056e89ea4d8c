use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use super::clock::Clock;
use super::events::{MixerEvent, SessionSnapshot};
use super::output::{AnnouncementSink, DeckOutput};
use super::transport::TransportController;
use crate::audio::config::{MIXER_COMMAND_CHAN_SIZE, MIXER_THREAD_TICK_INTERVAL_MS};
use crate::audio::errors::MixerError;
use crate::audio::types::{Track, TrackId};

// --- Mixer Thread Commands ---

#[derive(Debug)]
pub enum MixerCommand {
    Start,
    Play,
    Pause,
    Next,
    Prev,
    MetadataLoaded,
    ReportDuration { track_id: TrackId, seconds: f64 },
    AddTrack(Track),
    RemoveTrack(TrackId),
    MoveTrack { from: usize, to: usize },
    AutoOrder,
    SetCrossfade(f64),
    Snapshot(oneshot::Sender<SessionSnapshot>),
    Shutdown(oneshot::Sender<()>),
}

pub fn mixer_channel() -> (MixerHandle, mpsc::Receiver<MixerCommand>) {
    let (sender, receiver) = mpsc::channel::<MixerCommand>(MIXER_COMMAND_CHAN_SIZE);
    (MixerHandle { sender }, receiver)
}

/// Cloneable sender side for hosts driving a mixer loop.
#[derive(Debug, Clone)]
pub struct MixerHandle {
    sender: mpsc::Sender<MixerCommand>,
}

impl MixerHandle {
    pub async fn send(&self, command: MixerCommand) -> Result<(), MixerError> {
        self.sender.send(command).await?;
        Ok(())
    }

    pub async fn start(&self) -> Result<(), MixerError> {
        self.send(MixerCommand::Start).await
    }

    pub async fn play(&self) -> Result<(), MixerError> {
        self.send(MixerCommand::Play).await
    }

    pub async fn pause(&self) -> Result<(), MixerError> {
        self.send(MixerCommand::Pause).await
    }

    pub async fn next(&self) -> Result<(), MixerError> {
        self.send(MixerCommand::Next).await
    }

    pub async fn prev(&self) -> Result<(), MixerError> {
        self.send(MixerCommand::Prev).await
    }

    pub async fn add_track(&self, track: Track) -> Result<(), MixerError> {
        self.send(MixerCommand::AddTrack(track)).await
    }

    pub async fn remove_track(&self, track_id: TrackId) -> Result<(), MixerError> {
        self.send(MixerCommand::RemoveTrack(track_id)).await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, MixerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(MixerCommand::Snapshot(reply_tx)).await?;
        Ok(reply_rx.await?)
    }

    /// Stops the loop and waits for it to acknowledge.
    pub async fn shutdown(&self) -> Result<(), MixerError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.send(MixerCommand::Shutdown(done_tx)).await?;
        log::info!("Mixer Thread: Waiting for shutdown confirmation...");
        Ok(done_rx.await?)
    }
}

/// Drives a controller on a dedicated current-thread runtime until shutdown.
/// Meant to be called from a thread the host spawns for the mixer.
pub fn run_mixer_thread<O, A, C>(
    controller: TransportController<O, A, C>,
    receiver: mpsc::Receiver<MixerCommand>,
    events: Option<mpsc::UnboundedSender<MixerEvent>>,
) -> Result<(), MixerError>
where
    O: DeckOutput,
    A: AnnouncementSink,
    C: Clock,
{
    log::info!("Mixer Thread: Building Tokio current_thread runtime...");
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(MixerError::RuntimeBuild)?;
    rt.block_on(run_mixer(controller, receiver, events));
    log::info!("Mixer Thread: Exited.");
    Ok(())
}

/// Command loop. Returns the controller once shut down or once every sender
/// has been dropped.
pub async fn run_mixer<O, A, C>(
    mut controller: TransportController<O, A, C>,
    mut receiver: mpsc::Receiver<MixerCommand>,
    events: Option<mpsc::UnboundedSender<MixerEvent>>,
) -> TransportController<O, A, C>
where
    O: DeckOutput,
    A: AnnouncementSink,
    C: Clock,
{
    log::info!("Mixer Thread: Entering main loop.");
    let mut metadata_poll =
        tokio::time::interval(Duration::from_millis(MIXER_THREAD_TICK_INTERVAL_MS));
    metadata_poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        let wait = {
            let session = controller.session();
            session
                .next_due()
                .map(|due| due.saturating_sub(session.clock().now()))
        };

        tokio::select! {
            maybe_command = receiver.recv() => {
                match maybe_command {
                    Some(MixerCommand::Shutdown(done_tx)) => {
                        log::info!("Mixer Thread: Shutdown received.");
                        forward_events(&mut controller, &events);
                        if done_tx.send(()).is_err() {
                            log::error!("Mixer Thread: Failed to send shutdown completion signal.");
                        }
                        break;
                    }
                    Some(command) => {
                        log::debug!("Mixer Thread Received: {:?}", command);
                        handle_command(&mut controller, command);
                    }
                    None => {
                        log::info!("Mixer Thread: Command channel closed. Exiting loop.");
                        break;
                    }
                }
            },
            _ = sleep_for(wait), if wait.is_some() => {
                controller.fire_due();
            },
            _ = metadata_poll.tick() => {
                controller.metadata_loaded();
            }
        }
        forward_events(&mut controller, &events);
    }
    controller
}

async fn sleep_for(wait: Option<Duration>) {
    if let Some(wait) = wait {
        tokio::time::sleep(wait).await;
    }
}

fn handle_command<O, A, C>(controller: &mut TransportController<O, A, C>, command: MixerCommand)
where
    O: DeckOutput,
    A: AnnouncementSink,
    C: Clock,
{
    let applied = match command {
        MixerCommand::Start => controller.start(),
        MixerCommand::Play => controller.play(),
        MixerCommand::Pause => controller.pause(),
        MixerCommand::Next => controller.next(),
        MixerCommand::Prev => controller.prev(),
        MixerCommand::MetadataLoaded => controller.metadata_loaded().is_some(),
        MixerCommand::ReportDuration { track_id, seconds } => {
            controller.report_duration(track_id, seconds)
        }
        MixerCommand::AddTrack(track) => {
            controller.add_track(track);
            true
        }
        MixerCommand::RemoveTrack(track_id) => controller.remove_track(track_id),
        MixerCommand::MoveTrack { from, to } => controller.move_track(from, to),
        MixerCommand::AutoOrder => {
            controller.auto_order();
            true
        }
        MixerCommand::SetCrossfade(seconds) => controller.set_crossfade_seconds(seconds),
        MixerCommand::Snapshot(reply_tx) => {
            if reply_tx.send(controller.snapshot()).is_err() {
                log::warn!("Mixer Thread: Snapshot requester went away.");
            }
            true
        }
        MixerCommand::Shutdown(_) => true,
    };
    if !applied {
        log::debug!("Mixer Thread: Command had no effect.");
    }
}

fn forward_events<O, A, C>(
    controller: &mut TransportController<O, A, C>,
    events: &Option<mpsc::UnboundedSender<MixerEvent>>,
) where
    O: DeckOutput,
    A: AnnouncementSink,
    C: Clock,
{
    let drained = controller.drain_events();
    let Some(sender) = events else {
        return;
    };
    for event in drained {
        if sender.send(event).is_err() {
            log::debug!("Mixer Thread: Event receiver dropped.");
            break;
        }
    }
}
