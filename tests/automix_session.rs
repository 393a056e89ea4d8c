use std::sync::{Arc, Mutex};
use std::time::Duration;

use auto_dj_lib::audio::config::{MixerConfig, TempoConfig};
use auto_dj_lib::audio::errors::{AnnounceError, IngestError};
use auto_dj_lib::audio::types::Track;
use auto_dj_lib::mixer::{
    AnnouncementSink, Clock, DeckOutput, DeckRole, DeckState, ManualClock, MetadataGate, MixerEvent,
    PendingKind, ScheduleOutcome, SimulatedOutput, TransportController,
};
use auto_dj_lib::playlist::Playlist;

type Output = SimulatedOutput<ManualClock>;

struct Rig<A: AnnouncementSink> {
    clock: ManualClock,
    transport: TransportController<Output, A, ManualClock>,
    ids: Vec<auto_dj_lib::TrackId>,
}

fn tracks(durations: &[f64]) -> Vec<Track> {
    durations
        .iter()
        .enumerate()
        .map(|(i, d)| Track::placeholder(format!("t{i}"), Some(120 + i as u32)).with_duration(*d))
        .collect()
}

fn rig_with<A: AnnouncementSink>(
    durations: &[f64],
    crossfade: f64,
    gate: MetadataGate,
    announcer: A,
) -> Rig<A> {
    let config = MixerConfig {
        crossfade_seconds: crossfade,
        ..MixerConfig::default()
    };
    rig_from_parts(tracks(durations), &config, gate, announcer)
}

fn rig_from_parts<A: AnnouncementSink>(
    tracks: Vec<Track>,
    config: &MixerConfig,
    gate: MetadataGate,
    announcer: A,
) -> Rig<A> {
    let clock = ManualClock::new();
    let ids = tracks.iter().map(|t| t.id).collect();
    let outputs = [
        SimulatedOutput::with_metadata_gate(clock.clone(), gate.clone()),
        SimulatedOutput::with_metadata_gate(clock.clone(), gate),
    ];
    let transport = TransportController::new(
        Playlist::from_tracks(tracks),
        config,
        outputs,
        announcer,
        clock.clone(),
    );
    Rig {
        clock,
        transport,
        ids,
    }
}

fn recording_rig(
    durations: &[f64],
    crossfade: f64,
) -> (Rig<impl AnnouncementSink>, Arc<Mutex<Vec<String>>>) {
    let heard = Arc::new(Mutex::new(Vec::new()));
    let sink = heard.clone();
    let announcer = move |text: &str| sink.lock().unwrap().push(text.to_string());
    (
        rig_with(durations, crossfade, MetadataGate::open(), announcer),
        heard,
    )
}

/// Advances the clock to the pending action and runs it.
fn run_pending<A: AnnouncementSink>(rig: &mut Rig<A>) -> Duration {
    let due = rig.transport.session().next_due().expect("an action is pending");
    rig.clock.set(due);
    assert!(rig.transport.fire_due());
    due
}

fn secs(d: Duration) -> f64 {
    d.as_secs_f64()
}

#[test]
fn crossfade_completes_and_swaps_decks() {
    let (mut rig, heard) = recording_rig(&[30.0, 30.0, 30.0], 8.0);
    assert!(rig.transport.start());
    assert_eq!(rig.transport.session().pending_kind(), Some(PendingKind::Recheck));
    let recheck = rig.transport.session().next_due().unwrap();
    assert!((secs(recheck) - 21.75).abs() < 1e-6);

    let fade_start = run_pending(&mut rig);
    let session = rig.transport.session();
    assert!(session.crossfade_in_progress());
    assert_eq!(session.pending_kind(), Some(PendingKind::DeckSwap));
    assert_eq!(session.output(DeckRole::A).current_ramp().over_seconds, 8.0);
    assert_eq!(session.output(DeckRole::B).loaded_track(), Some(rig.ids[1]));
    assert_eq!(heard.lock().unwrap().as_slice(), ["Up next: t1 at 121 BPM"]);

    let swap_at = session.next_due().unwrap();
    let offset = secs(swap_at - fade_start);
    assert!((8.0..8.1).contains(&offset), "swap offset {offset}");

    rig.clock.set(swap_at - Duration::from_millis(10));
    assert!(!rig.transport.fire_due());
    run_pending(&mut rig);

    let session = rig.transport.session();
    assert_eq!(session.active_role(), DeckRole::B);
    assert_eq!(session.current_index(), 1);
    let old = session.output(DeckRole::A);
    assert!(!old.is_playing());
    assert_eq!(old.gain(), 0.0);
    let new = session.output(DeckRole::B);
    assert!(new.is_playing());
    assert_eq!(new.gain(), 1.0);
    assert_eq!(session.deck(DeckRole::A).state, DeckState::Idle);
    assert_eq!(session.deck(DeckRole::B).state, DeckState::Playing);
    // Next transition already armed for the new active deck.
    assert_eq!(session.pending_kind(), Some(PendingKind::Recheck));
}

#[test]
fn short_track_caps_fade_at_a_third() {
    let (mut rig, _) = recording_rig(&[9.0, 9.0], 20.0);
    rig.transport.start();
    let recheck = rig.transport.session().next_due().unwrap();
    assert!((secs(recheck) - 5.75).abs() < 1e-6);
    run_pending(&mut rig);

    let fades: Vec<f64> = rig
        .transport
        .drain_events()
        .into_iter()
        .filter_map(|e| match e {
            MixerEvent::CrossfadeStarted { fade_seconds, .. } => Some(fade_seconds),
            _ => None,
        })
        .collect();
    assert_eq!(fades, vec![3.0]);
    let session = rig.transport.session();
    assert_eq!(session.output(DeckRole::B).current_ramp().over_seconds, 3.0);
}

#[test]
fn last_track_plays_out_without_scheduling() {
    let (mut rig, heard) = recording_rig(&[30.0], 8.0);
    rig.transport.start();
    let session = rig.transport.session();
    assert_eq!(session.pending_count(), 0);
    let before = [
        session.deck(DeckRole::A).clone(),
        session.deck(DeckRole::B).clone(),
    ];

    rig.clock.advance_secs(29.0);
    assert!(!rig.transport.fire_due());
    assert_eq!(rig.transport.metadata_loaded(), None);
    let session = rig.transport.session();
    assert_eq!(session.pending_count(), 0);
    assert_eq!(session.deck(DeckRole::A), &before[0]);
    assert_eq!(session.deck(DeckRole::B), &before[1]);
    assert!(heard.lock().unwrap().is_empty());
    assert!(rig.transport.drain_events().contains(&MixerEvent::PlaylistEnded));
}

#[test]
fn scheduler_waits_for_metadata() {
    let gate = MetadataGate::closed();
    let mut rig = rig_with(&[30.0, 30.0], 8.0, gate.clone(), |_: &str| {});
    rig.transport.start();
    assert_eq!(rig.transport.session().pending_count(), 0);
    assert!(rig.transport.session().is_awaiting_metadata());
    assert_eq!(
        rig.transport.metadata_loaded(),
        Some(ScheduleOutcome::MetadataPending)
    );

    rig.clock.advance_secs(2.0);
    gate.release();
    match rig.transport.metadata_loaded() {
        Some(ScheduleOutcome::RecheckScheduled { in_seconds }) => {
            assert!((in_seconds - 19.75).abs() < 1e-6, "{in_seconds}")
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(rig.transport.metadata_loaded(), None);
    assert_eq!(rig.transport.session().pending_count(), 1);
}

#[test]
fn transport_sequences_keep_at_most_one_pending_action() {
    let (mut rig, _) = recording_rig(&[30.0, 30.0, 30.0, 30.0], 8.0);
    rig.transport.start();
    let before_pause = rig.transport.session().pending_handle().unwrap();

    let steps = ["pause", "next", "pause", "play", "prev", "next", "next", "pause"];
    for step in steps {
        rig.clock.advance_secs(1.0);
        match step {
            "pause" => rig.transport.pause(),
            "play" => rig.transport.play(),
            "next" => rig.transport.next(),
            _ => rig.transport.prev(),
        };
        assert!(rig.transport.session().pending_count() <= 1, "after {step}");
    }
    assert!(rig.transport.session().is_paused());
    assert_eq!(rig.transport.session().pending_count(), 0);

    rig.transport.play();
    assert_eq!(rig.transport.session().pending_count(), 1);
    rig.clock.advance_secs(60.0);
    assert!(!rig.transport.fire(before_pause));
}

#[test]
fn pause_cancels_and_resume_recomputes_from_position() {
    let (mut rig, _) = recording_rig(&[30.0, 30.0], 8.0);
    rig.transport.start();
    rig.clock.advance_secs(10.0);
    assert!(rig.transport.pause());
    assert!(!rig.transport.pause());
    assert_eq!(rig.transport.session().pending_count(), 0);
    assert!(!rig.transport.session().output(DeckRole::A).is_playing());

    rig.clock.advance_secs(100.0);
    assert!(!rig.transport.fire_due());
    assert!(rig.transport.play());
    let due = rig.transport.session().next_due().unwrap();
    let wait = secs(due) - secs(rig.clock.now());
    assert!((wait - 11.75).abs() < 1e-6, "{wait}");
}

#[test]
fn next_and_prev_clamp_at_boundaries() {
    let (mut rig, _) = recording_rig(&[30.0, 30.0, 30.0], 8.0);
    rig.transport.start();
    assert!(!rig.transport.prev());

    assert!(rig.transport.next());
    let session = rig.transport.session();
    assert_eq!(session.current_index(), 1);
    assert_eq!(session.active_role(), DeckRole::B);
    assert_eq!(session.output(DeckRole::B).loaded_track(), Some(rig.ids[1]));
    assert_eq!(session.output(DeckRole::A).loaded_track(), None);

    assert!(rig.transport.next());
    assert_eq!(rig.transport.session().active_role(), DeckRole::A);
    assert!(!rig.transport.next());
    assert_eq!(rig.transport.session().current_index(), 2);

    assert!(rig.transport.prev());
    assert_eq!(rig.transport.session().current_index(), 1);
}

#[test]
fn empty_playlist_operations_are_no_ops() {
    let (mut rig, _) = recording_rig(&[], 8.0);
    assert!(!rig.transport.start());
    assert!(!rig.transport.play());
    assert!(!rig.transport.pause());
    assert!(!rig.transport.next());
    assert!(!rig.transport.prev());
    assert!(!rig.transport.session().is_started());
}

#[test]
fn resume_mid_crossfade_finishes_the_swap() {
    let (mut rig, _) = recording_rig(&[30.0, 30.0], 8.0);
    rig.transport.start();
    run_pending(&mut rig);
    rig.clock.advance_secs(2.0);
    assert!(rig.transport.pause());
    let session = rig.transport.session();
    assert_eq!(session.pending_count(), 0);
    assert!(!session.output(DeckRole::A).is_playing());
    assert!(!session.output(DeckRole::B).is_playing());

    rig.clock.advance_secs(60.0);
    assert!(rig.transport.play());
    let session = rig.transport.session();
    assert_eq!(session.active_role(), DeckRole::B);
    assert_eq!(session.current_index(), 1);
    assert_eq!(session.output(DeckRole::A).loaded_track(), None);
    assert_eq!(session.output(DeckRole::B).gain(), 1.0);
    assert!(session.output(DeckRole::B).is_playing());

    let events = rig.transport.drain_events();
    let paused = events.iter().position(|e| *e == MixerEvent::Paused).unwrap();
    let resumed = events.iter().position(|e| *e == MixerEvent::Resumed).unwrap();
    let swapped = events
        .iter()
        .position(|e| matches!(e, MixerEvent::DeckSwapped { index: 1, .. }))
        .unwrap();
    assert!(paused < resumed && resumed < swapped);
}

#[test]
fn removing_incoming_track_aborts_crossfade() {
    let (mut rig, _) = recording_rig(&[30.0, 30.0, 30.0], 8.0);
    rig.transport.start();
    run_pending(&mut rig);
    rig.transport.drain_events();

    assert!(rig.transport.remove_track(rig.ids[1]));
    let events = rig.transport.drain_events();
    assert_eq!(events[0], MixerEvent::CrossfadeAborted { deck: DeckRole::B });
    // Still inside the fade window, so the new successor fades in at once.
    assert!(matches!(
        events[1],
        MixerEvent::CrossfadeStarted { next_track_id, .. } if next_track_id == rig.ids[2]
    ));
    let session = rig.transport.session();
    assert_eq!(session.pending_count(), 1);
    assert_eq!(session.deck(DeckRole::B).bound_track_index, Some(1));
    assert_eq!(session.output(DeckRole::B).loaded_track(), Some(rig.ids[2]));
}

#[test]
fn reordering_while_paused_drops_stale_crossfade() {
    let (mut rig, _) = recording_rig(&[30.0, 30.0, 30.0], 8.0);
    rig.transport.start();
    run_pending(&mut rig);
    rig.transport.pause();

    assert!(rig.transport.move_track(1, 2));
    let session = rig.transport.session();
    assert!(!session.crossfade_in_progress());
    assert_eq!(session.deck(DeckRole::A).state, DeckState::Playing);
    assert_eq!(session.output(DeckRole::A).gain(), 1.0);
    assert_eq!(session.pending_count(), 0);
    assert!(!rig.transport.move_track(0, 5));
}

#[test]
fn removing_active_track_skips_or_stops() {
    let (mut rig, _) = recording_rig(&[30.0, 30.0], 8.0);
    rig.transport.start();
    assert!(rig.transport.remove_track(rig.ids[0]));
    let session = rig.transport.session();
    assert_eq!(session.current_index(), 0);
    let active = session.active_role();
    assert_eq!(session.output(active).loaded_track(), Some(rig.ids[1]));
    assert!(session.output(active).is_playing());

    assert!(rig.transport.remove_track(rig.ids[1]));
    assert!(!rig.transport.session().is_started());
    assert!(rig.transport.drain_events().contains(&MixerEvent::Stopped));
    assert!(!rig.transport.remove_track(rig.ids[1]));
}

#[test]
fn appending_to_finished_queue_rearms_scheduler() {
    let (mut rig, _) = recording_rig(&[30.0], 8.0);
    rig.transport.start();
    assert_eq!(rig.transport.session().pending_count(), 0);
    rig.transport
        .add_track(Track::placeholder("late", None).with_duration(40.0));
    assert_eq!(rig.transport.session().pending_kind(), Some(PendingKind::Recheck));
}

#[test]
fn unknown_tempo_track_is_announced_without_bpm() {
    let (mut rig, heard) = recording_rig(&[30.0], 8.0);
    rig.transport.start();
    rig.transport
        .add_track(Track::placeholder("Mystery", None).with_duration(30.0));
    run_pending(&mut rig);
    assert_eq!(heard.lock().unwrap().as_slice(), ["Up next: Mystery"]);
}

struct BrokenSpeaker;

impl AnnouncementSink for BrokenSpeaker {
    fn announce(&mut self, _text: &str) -> Result<(), AnnounceError> {
        Err(AnnounceError::Unavailable("no voice".into()))
    }
}

#[test]
fn failing_announcer_does_not_block_crossfade() {
    let mut rig = rig_with(&[30.0, 30.0], 8.0, MetadataGate::open(), BrokenSpeaker);
    rig.transport.start();
    run_pending(&mut rig);
    assert!(rig.transport.session().crossfade_in_progress());
    run_pending(&mut rig);
    assert_eq!(rig.transport.session().current_index(), 1);
}

#[test]
fn next_during_crossfade_rejects_the_old_swap() {
    let (mut rig, _) = recording_rig(&[30.0, 30.0, 30.0], 8.0);
    rig.transport.start();
    run_pending(&mut rig);
    let swap = rig.transport.session().pending_handle().unwrap();
    assert_eq!(rig.transport.session().pending_kind(), Some(PendingKind::DeckSwap));

    rig.clock.advance_secs(1.0);
    assert!(rig.transport.next());
    let replacement = rig.transport.session().pending_handle().unwrap();
    assert_ne!(replacement, swap);

    rig.clock.advance_secs(60.0);
    assert!(!rig.transport.fire(swap));
    let session = rig.transport.session();
    assert_eq!(session.pending_count(), 1);
    assert_eq!(session.pending_handle(), Some(replacement));
    assert_eq!(session.current_index(), 1);
    assert!(!session.crossfade_in_progress());

    assert!(rig.transport.prev());
    assert!(!rig.transport.fire(replacement));
    assert_eq!(rig.transport.session().pending_count(), 1);
}

#[test]
fn grown_queue_reports_its_new_end() {
    let (mut rig, _) = recording_rig(&[30.0], 8.0);
    rig.transport.start();
    assert!(rig.transport.drain_events().contains(&MixerEvent::PlaylistEnded));

    rig.transport
        .add_track(Track::placeholder("encore", None).with_duration(30.0));
    run_pending(&mut rig);
    run_pending(&mut rig);
    assert_eq!(rig.transport.session().current_index(), 1);

    let events = rig.transport.drain_events();
    let swapped = events
        .iter()
        .position(|e| matches!(e, MixerEvent::DeckSwapped { index: 1, .. }))
        .unwrap();
    assert_eq!(events.last(), Some(&MixerEvent::PlaylistEnded));
    assert!(swapped < events.len() - 1);
}

#[test]
fn reported_duration_unblocks_waiting_deck() {
    let tracks = vec![
        Track::placeholder("streamed", Some(120)),
        Track::placeholder("after", Some(122)).with_duration(30.0),
    ];
    let first = tracks[0].id;
    let mut rig = rig_from_parts(tracks, &MixerConfig::default(), MetadataGate::open(), |_: &str| {});
    rig.transport.start();
    assert!(rig.transport.session().is_awaiting_metadata());
    assert_eq!(
        rig.transport.metadata_loaded(),
        Some(ScheduleOutcome::MetadataPending)
    );

    rig.clock.advance_secs(4.0);
    assert!(rig.transport.report_duration(first, 30.0));
    let session = rig.transport.session();
    assert!(!session.is_awaiting_metadata());
    assert_eq!(session.output(DeckRole::A).duration(), Some(30.0));
    assert_eq!(session.playlist().get(0).unwrap().duration, Some(30.0));
    assert_eq!(session.pending_kind(), Some(PendingKind::Recheck));
    let wait = secs(session.next_due().unwrap()) - secs(rig.clock.now());
    assert!((wait - 17.75).abs() < 1e-6, "{wait}");
}

#[test]
fn unusable_durations_never_panic() {
    let tracks = vec![
        Track::placeholder("pending", None),
        Track::placeholder("next", None).with_duration(30.0),
    ];
    let first = tracks[0].id;
    let mut rig = rig_from_parts(tracks, &MixerConfig::default(), MetadataGate::open(), |_: &str| {});
    assert!(!rig.transport.report_duration(first, f64::INFINITY));
    assert!(!rig.transport.report_duration(first, f64::NAN));
    assert!(!rig.transport.report_duration(first, -1.0));
    assert_eq!(rig.transport.session().playlist().get(0).unwrap().duration, None);
    assert!(rig.transport.start());
    assert!(rig.transport.session().is_awaiting_metadata());
    assert_eq!(rig.transport.session().pending_count(), 0);
}

#[test]
fn infinite_output_duration_is_treated_as_pending() {
    let mut rig = rig_with(&[f64::INFINITY, 30.0], 8.0, MetadataGate::open(), |_: &str| {});
    assert!(rig.transport.start());
    let session = rig.transport.session();
    assert!(session.is_awaiting_metadata());
    assert_eq!(session.pending_count(), 0);
}

#[test]
fn oversized_wait_leaves_nothing_scheduled() {
    let mut rig = rig_with(&[1e300, 30.0], 8.0, MetadataGate::open(), |_: &str| {});
    assert!(rig.transport.start());
    let session = rig.transport.session();
    assert!(!session.is_awaiting_metadata());
    assert_eq!(session.pending_count(), 0);
    assert!(!rig.transport.fire_due());
}

#[test]
fn invalid_config_falls_back_to_defaults() {
    let config = MixerConfig {
        crossfade_seconds: f64::NAN,
        tempo: TempoConfig {
            min_bpm: 200,
            max_bpm: 100,
            ..TempoConfig::default()
        },
        ..MixerConfig::default()
    };
    let rig = rig_from_parts(tracks(&[30.0]), &config, MetadataGate::open(), |_: &str| {});
    let session = rig.transport.session();
    assert_eq!(session.crossfade_seconds(), 8.0);
    assert_eq!(session.tempo_config(), &TempoConfig::default());

    let config = MixerConfig {
        crossfade_seconds: 0.0,
        ..MixerConfig::default()
    };
    let rig = rig_from_parts(tracks(&[30.0]), &config, MetadataGate::open(), |_: &str| {});
    assert_eq!(rig.transport.session().crossfade_seconds(), 8.0);
}

#[test]
fn add_file_uses_session_tempo_settings() {
    let config = MixerConfig {
        tempo: TempoConfig {
            min_bpm: 80,
            max_bpm: 160,
            ..TempoConfig::default()
        },
        ..MixerConfig::default()
    };
    let mut rig = rig_from_parts(tracks(&[30.0]), &config, MetadataGate::open(), |_: &str| {});
    assert_eq!(rig.transport.session().tempo_config().min_bpm, 80);
    assert!(matches!(
        rig.transport.add_file("/nonexistent/dir/track.wav"),
        Err(IngestError::FileOpenError { .. })
    ));
    assert_eq!(rig.transport.session().playlist().len(), 1);
}
