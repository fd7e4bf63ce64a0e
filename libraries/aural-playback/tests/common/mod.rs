//! Shared helpers for playback tests

#![allow(dead_code)]

use aural_playback::{PlaybackSession, Player, Scheduler, SessionId, Track};
use std::sync::Arc;

/// One call made on the scheduler
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    PlayTrack { session: SessionId, start_position: f64, begin_immediately: bool },
    PlayLoop { session: SessionId, start_time: f64, begin_immediately: bool },
    EndLoop { session: SessionId, loop_end_time: f64 },
    SeekToTime { session: SessionId, time: f64, begin_immediately: bool },
    Pause,
    Resume,
    Stop,
}

/// Scheduler that records every call and reports a settable position
#[derive(Debug, Default)]
pub struct RecordingScheduler {
    pub calls: Vec<Call>,
    pub position: f64,
}

impl RecordingScheduler {
    pub fn reset(&mut self) {
        self.calls.clear();
    }

    pub fn last_call(&self) -> Option<&Call> {
        self.calls.last()
    }

    pub fn seeks(&self) -> Vec<&Call> {
        self.calls
            .iter()
            .filter(|call| matches!(call, Call::SeekToTime { .. }))
            .collect()
    }
}

impl Scheduler for RecordingScheduler {
    fn play_track(&mut self, session: &PlaybackSession, start_position: f64, begin_immediately: bool) {
        self.calls.push(Call::PlayTrack {
            session: session.id(),
            start_position,
            begin_immediately,
        });
    }

    fn play_loop(&mut self, session: &PlaybackSession, start_time: f64, begin_immediately: bool) {
        self.calls.push(Call::PlayLoop {
            session: session.id(),
            start_time,
            begin_immediately,
        });
    }

    fn end_loop(&mut self, session: &PlaybackSession, loop_end_time: f64) {
        self.calls.push(Call::EndLoop {
            session: session.id(),
            loop_end_time,
        });
    }

    fn seek_to_time(&mut self, session: &PlaybackSession, time: f64, begin_immediately: bool) {
        self.calls.push(Call::SeekToTime {
            session: session.id(),
            time,
            begin_immediately,
        });
    }

    fn pause(&mut self) {
        self.calls.push(Call::Pause);
    }

    fn resume(&mut self) {
        self.calls.push(Call::Resume);
    }

    fn stop(&mut self) {
        self.calls.push(Call::Stop);
    }

    fn seek_position(&self) -> f64 {
        self.position
    }
}

pub const TRACK_DURATION: f64 = 300.0;

pub fn track() -> Arc<Track> {
    Arc::new(Track::with_duration("/Dummy/Path", TRACK_DURATION))
}

pub fn player() -> Player<RecordingScheduler> {
    Player::new(RecordingScheduler::default())
}

/// Play from the start, optionally pause, and forget the calls made so far
pub fn playing(track: &Arc<Track>, paused: bool) -> Player<RecordingScheduler> {
    let mut player = player();
    player.play(Arc::clone(track), 0.0, None);
    if paused {
        player.pause();
    }
    player.scheduler_mut().reset();
    player
}

/// Install a loop the way a user would: incomplete via toggle, complete via define
pub fn install_loop(player: &mut Player<RecordingScheduler>, start: f64, end: Option<f64>) {
    match end {
        Some(end) => player.define_loop(start, Some(end)).unwrap(),
        None => {
            player.scheduler_mut().position = start;
            player.toggle_loop();
        }
    }
    player.scheduler_mut().reset();
}

// ===== WAV fixtures =====

pub const SAMPLE_RATE: u32 = 8000;

/// Left channel value at frame `i`, as decoded to `f32`
pub fn ramp_value(i: usize) -> f32 {
    (((i % 997) as i16) * 16) as f32 / 32768.0
}

/// Stereo 16-bit WAV of `seconds`, left channel a ramp, right channel its negation
pub fn ramp_wav(seconds: u32) -> (tempfile::TempDir, std::path::PathBuf) {
    use hound::{WavSpec, WavWriter};

    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("ramp.wav");

    let spec = WavSpec {
        channels: 2,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::create(&path, spec).unwrap();
    for i in 0..(seconds * SAMPLE_RATE) as usize {
        let sample = ((i % 997) as i16) * 16;
        writer.write_sample(sample).unwrap();
        writer.write_sample(-sample).unwrap();
    }
    writer.finalize().unwrap();

    (dir, path)
}
