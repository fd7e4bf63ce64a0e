//! End-to-end tests for the decode scheduler
//!
//! These tests validate that:
//! 1. Playback starts on the exact sample of the requested position
//! 2. Complete loops wrap at their end without gaps or overlaps
//! 3. Seeks and stops never leak audio queued for an earlier position
//! 4. Worker outcomes come back as events tagged with the right session

mod common;

use aural_decode::ReaderOptions;
use aural_playback::{
    BufferSink, DecodeScheduler, PlaybackError, PlaybackLoop, PlaybackState, Player, ScheduledBuffer,
    Scheduler, SchedulerConfig, SchedulerEvent, SessionContext, Track,
};
use common::{ramp_value, ramp_wav, SAMPLE_RATE};
use std::sync::Arc;
use std::time::{Duration, Instant};

const BUFFER_FRAMES: usize = 1000;
const WAIT: Duration = Duration::from_secs(5);

fn scheduler() -> DecodeScheduler {
    scheduler_with(ReaderOptions::default())
}

fn scheduler_with(options: ReaderOptions) -> DecodeScheduler {
    let config = SchedulerConfig {
        buffer_frames: BUFFER_FRAMES,
        queue_depth: 4,
        thread_name: "aural-decoder-test".to_string(),
    };
    DecodeScheduler::new(config, options).unwrap()
}

/// Take buffers until the worker reports the end (or a failure) and the sink is drained
fn collect_to_end(scheduler: &DecodeScheduler, sink: &BufferSink) -> (Vec<ScheduledBuffer>, Vec<SchedulerEvent>) {
    let deadline = Instant::now() + Duration::from_secs(20);
    let mut buffers = Vec::new();
    let mut events = Vec::new();

    loop {
        events.extend(scheduler.drain_events());
        let finished = events.iter().any(|event| {
            matches!(
                event,
                SchedulerEvent::TrackCompleted { .. } | SchedulerEvent::PlaybackFailed { .. }
            )
        });
        if finished && sink.is_empty() {
            return (buffers, events);
        }

        if let Some(buffer) = sink.next_timeout(Duration::from_millis(20)) {
            buffers.push(buffer);
        }
        assert!(Instant::now() < deadline, "timed out waiting for end of track");
    }
}

#[test]
fn test_plays_from_exact_sample_to_end() {
    let (_dir, path) = ramp_wav(2);
    let track = Arc::new(Track::new(&path));
    let mut sessions = SessionContext::new();
    let session = sessions.begin(Arc::clone(&track));

    let mut scheduler = scheduler();
    let sink = scheduler.sink();
    scheduler.play_track(&session, 0.5, true);
    assert_eq!(scheduler.seek_position(), 0.5);

    let (buffers, events) = collect_to_end(&scheduler, &sink);

    assert_eq!(events, vec![SchedulerEvent::TrackCompleted { session_id: session.id() }]);
    assert!((buffers[0].start_time - 0.5).abs() < 1e-9);
    assert!((buffers[0].buffer.channel(0)[0] - ramp_value(4000)).abs() < 1e-6);
    assert!((buffers[0].buffer.channel(1)[0] + ramp_value(4000)).abs() < 1e-6);

    let total: usize = buffers.iter().map(|b| b.buffer.frame_length()).sum();
    assert_eq!(total, (SAMPLE_RATE as usize * 3) / 2);

    for pair in buffers.windows(2) {
        assert!((pair[0].end_time() - pair[1].start_time).abs() < 1e-9);
    }
    assert!(buffers.iter().all(|b| b.session_id == session.id()));

    // The worker resolves the duration on open
    assert!((track.duration() - 2.0).abs() < 1e-6);
}

#[test]
fn test_sample_values_survive_buffer_splits() {
    let (_dir, path) = ramp_wav(1);
    let mut sessions = SessionContext::new();
    let session = sessions.begin(Arc::new(Track::new(&path)));

    let mut scheduler = scheduler();
    let sink = scheduler.sink();
    scheduler.play_track(&session, 0.0, true);

    let (buffers, _) = collect_to_end(&scheduler, &sink);

    let left: Vec<f32> = buffers.iter().flat_map(|b| b.buffer.channel(0).to_vec()).collect();
    assert_eq!(left.len(), SAMPLE_RATE as usize);
    for (i, sample) in left.iter().enumerate() {
        assert!((sample - ramp_value(i)).abs() < 1e-6, "sample {i}");
    }
}

#[test]
fn test_complete_loop_wraps_at_its_end() {
    let (_dir, path) = ramp_wav(2);
    let mut sessions = SessionContext::new();
    let session = sessions.begin_with_loop(
        Arc::new(Track::new(&path)),
        PlaybackLoop::new(0.5, 1.0).unwrap(),
    );

    let mut scheduler = scheduler();
    let sink = scheduler.sink();
    scheduler.play_loop(&session, 0.5, true);

    let buffers: Vec<ScheduledBuffer> = (0..12).map(|_| sink.next_timeout(WAIT).unwrap()).collect();

    // Each pass over the loop is exactly 0.5s of audio
    let mut pass_frames = 0;
    let mut restarts = 0;
    for buffer in &buffers {
        if (buffer.start_time - 0.5).abs() < 1e-9 && pass_frames > 0 {
            assert_eq!(pass_frames, SAMPLE_RATE as usize / 2);
            assert!((buffer.buffer.channel(0)[0] - ramp_value(4000)).abs() < 1e-6);
            pass_frames = 0;
            restarts += 1;
        }
        assert!(buffer.end_time() <= 1.0 + 1e-9);
        pass_frames += buffer.buffer.frame_length();
    }
    assert!(restarts >= 2);

    let events = scheduler.drain_events();
    assert!(events.iter().all(|event| matches!(
        event,
        SchedulerEvent::LoopRestarted { loop_start, .. } if *loop_start == 0.5
    )));
    assert!(events.len() >= 2);
}

#[test]
fn test_seek_discards_queued_audio() {
    let (_dir, path) = ramp_wav(2);
    let mut sessions = SessionContext::new();
    let session = sessions.begin(Arc::new(Track::new(&path)));

    let mut scheduler = scheduler();
    let sink = scheduler.sink();
    scheduler.play_track(&session, 0.0, true);

    let first = sink.next_timeout(WAIT).unwrap();
    assert_eq!(first.start_time, 0.0);

    // Let the queue fill up with audio from the old position
    std::thread::sleep(Duration::from_millis(100));

    scheduler.seek_to_time(&session, 1.5, true);
    assert_eq!(scheduler.seek_position(), 1.5);

    let next = sink.next_timeout(WAIT).unwrap();
    assert!((next.start_time - 1.5).abs() < 1e-9);
    assert!((next.buffer.channel(0)[0] - ramp_value(12000)).abs() < 1e-6);
    assert_eq!(scheduler.seek_position(), next.start_time);
}

#[test]
fn test_end_loop_plays_on_under_new_session() {
    let (_dir, path) = ramp_wav(2);
    let track = Arc::new(Track::new(&path));
    let mut sessions = SessionContext::new();
    let looped = sessions.begin_with_loop(Arc::clone(&track), PlaybackLoop::new(0.5, 1.0).unwrap());

    let mut scheduler = scheduler();
    let sink = scheduler.sink();
    scheduler.play_loop(&looped, 0.5, true);
    sink.next_timeout(WAIT).unwrap();

    let unlooped = sessions.begin(Arc::clone(&track));
    scheduler.end_loop(&unlooped, 1.0);

    let (buffers, events) = collect_to_end(&scheduler, &sink);

    assert!(events.contains(&SchedulerEvent::TrackCompleted { session_id: unlooped.id() }));
    let last = buffers.last().unwrap();
    assert_eq!(last.session_id, unlooped.id());
    assert!((last.end_time() - 2.0).abs() < 1e-6);
}

#[test]
fn test_stop_is_idempotent_and_silences_output() {
    let (_dir, path) = ramp_wav(2);
    let mut sessions = SessionContext::new();
    let session = sessions.begin(Arc::new(Track::new(&path)));

    let mut scheduler = scheduler();
    let sink = scheduler.sink();
    scheduler.play_track(&session, 0.0, true);
    sink.next_timeout(WAIT).unwrap();

    scheduler.stop();
    scheduler.stop();

    assert_eq!(scheduler.seek_position(), 0.0);
    assert!(sink.next_timeout(Duration::from_millis(200)).is_none());
}

#[test]
fn test_paused_start_holds_audio_until_resume() {
    let (_dir, path) = ramp_wav(1);
    let mut sessions = SessionContext::new();
    let session = sessions.begin(Arc::new(Track::new(&path)));

    let mut scheduler = scheduler();
    let sink = scheduler.sink();
    scheduler.play_track(&session, 0.25, false);

    std::thread::sleep(Duration::from_millis(100));
    assert!(sink.try_next().is_none());

    scheduler.resume();
    let buffer = sink.next_timeout(WAIT).unwrap();
    assert!((buffer.start_time - 0.25).abs() < 1e-9);
}

#[test]
fn test_missing_file_reports_failure() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut sessions = SessionContext::new();
    let session = sessions.begin(Arc::new(Track::new(dir.path().join("missing.flac"))));

    let mut scheduler = scheduler();
    scheduler.play_track(&session, 0.0, true);

    match scheduler.next_event(WAIT) {
        Some(SchedulerEvent::PlaybackFailed { session_id, .. }) => assert_eq!(session_id, session.id()),
        other => panic!("expected failure, got {other:?}"),
    }
}

#[test]
fn test_start_past_end_completes_track() {
    let (_dir, path) = ramp_wav(1);
    let mut sessions = SessionContext::new();
    let session = sessions.begin(Arc::new(Track::new(&path)));

    let mut scheduler = scheduler();
    scheduler.play_track(&session, 5.0, true);

    assert_eq!(
        scheduler.next_event(WAIT),
        Some(SchedulerEvent::TrackCompleted { session_id: session.id() })
    );
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = SchedulerConfig {
        queue_depth: 0,
        ..Default::default()
    };

    assert!(matches!(
        DecodeScheduler::new(config, ReaderOptions::default()),
        Err(PlaybackError::Config(_))
    ));
}

#[test]
fn test_player_drives_decode_scheduler_to_completion() {
    let (_dir, path) = ramp_wav(1);
    let track = Arc::new(Track::probe(&path, &ReaderOptions::default()).unwrap());

    let scheduler = scheduler();
    let sink = scheduler.sink();
    let mut player = Player::new(scheduler);
    player.play(Arc::clone(&track), 0.0, None);

    let deadline = Instant::now() + Duration::from_secs(20);
    let finished = loop {
        sink.next_timeout(Duration::from_millis(20));
        let events = player.scheduler().drain_events();
        if let Some(done) = events
            .into_iter()
            .find_map(|event| player.handle_scheduler_event(event))
        {
            break done;
        }
        assert!(Instant::now() < deadline, "timed out");
    };

    assert_eq!(finished, track);
    assert_eq!(player.state(), PlaybackState::NoTrack);
}

// ===== Paused at end of track =====

#[test]
fn test_paused_start_past_end_completes_on_resume() {
    let (_dir, path) = ramp_wav(1);
    let mut sessions = SessionContext::new();
    let session = sessions.begin(Arc::new(Track::new(&path)));

    let mut scheduler = scheduler();
    scheduler.play_track(&session, 5.0, false);

    assert_eq!(scheduler.next_event(Duration::from_millis(300)), None);

    scheduler.resume();
    assert_eq!(
        scheduler.next_event(WAIT),
        Some(SchedulerEvent::TrackCompleted { session_id: session.id() })
    );
}

#[test]
fn test_paused_player_seeking_past_end_stays_paused() {
    let (_dir, path) = ramp_wav(2);
    let track = Arc::new(Track::probe(&path, &ReaderOptions::default()).unwrap());

    let mut player = Player::new(scheduler());
    player.play(Arc::clone(&track), 0.0, None);
    player.pause();

    let result = player.attempt_seek_to_time(&track, 10.0);
    assert!((result.actual_seek_position - 2.0).abs() < 1e-6);
    assert!(!result.track_playback_completed);

    // Nothing may end the track while it sits paused at the end
    let deadline = Instant::now() + Duration::from_millis(300);
    while Instant::now() < deadline {
        if let Some(event) = player.scheduler().next_event(Duration::from_millis(20)) {
            assert!(player.handle_scheduler_event(event).is_none());
        }
    }
    assert_eq!(player.state(), PlaybackState::Paused);

    player.resume();
    let finished = loop {
        let event = player.scheduler().next_event(WAIT).expect("completion after resume");
        if let Some(done) = player.handle_scheduler_event(event) {
            break done;
        }
    };

    assert_eq!(finished, track);
    assert_eq!(player.state(), PlaybackState::NoTrack);
}

#[test]
fn test_seek_away_from_end_while_paused_clears_parked_completion() {
    let (_dir, path) = ramp_wav(2);
    let mut sessions = SessionContext::new();
    let session = sessions.begin(Arc::new(Track::new(&path)));

    let mut scheduler = scheduler();
    let sink = scheduler.sink();
    scheduler.play_track(&session, 5.0, false);
    scheduler.seek_to_time(&session, 0.5, false);
    scheduler.resume();

    let buffer = sink.next_timeout(WAIT).unwrap();
    assert!((buffer.start_time - 0.5).abs() < 1e-9);
    assert!(!scheduler
        .drain_events()
        .iter()
        .any(|event| matches!(event, SchedulerEvent::TrackCompleted { .. })));
}

// ===== Raw files =====

#[test]
fn test_raw_track_keeps_its_packet_table_for_playback() {
    let (_dir, path) = ramp_wav(1);
    let options = ReaderOptions::default().with_raw_extensions(["wav"]);
    let track = Arc::new(Track::probe(&path, &options).unwrap());
    let table = track.packet_table().expect("probing a raw file keeps its packet table");
    assert!((table.duration() - 1.0).abs() < 1e-6);

    let mut sessions = SessionContext::new();
    let session = sessions.begin(Arc::clone(&track));
    let mut scheduler = scheduler_with(options);
    let sink = scheduler.sink();
    scheduler.play_track(&session, 0.5, true);

    let buffer = sink.next_timeout(WAIT).unwrap();
    assert!((buffer.start_time - 0.5).abs() < 1e-9);
    assert!((buffer.buffer.channel(0)[0] - ramp_value(4000)).abs() < 1e-6);
    assert!(Arc::ptr_eq(&table, &track.packet_table().unwrap()));
}
