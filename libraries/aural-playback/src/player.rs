//! Player state machine
//!
//! Single-writer: every method runs on the owner thread, and the player holds
//! no locks. Work the scheduler does elsewhere reaches the player only through
//! [`Player::handle_scheduler_event`].

use crate::error::Result;
use crate::playback_loop::PlaybackLoop;
use crate::scheduler::{Scheduler, SchedulerEvent};
use crate::session::{PlaybackSession, SessionContext};
use crate::types::{PlaybackState, SeekResult, Track};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Orchestrates sessions, loops and seeks over a [`Scheduler`]
pub struct Player<S: Scheduler> {
    scheduler: S,
    sessions: SessionContext,
    state: PlaybackState,
}

impl<S: Scheduler> Player<S> {
    pub fn new(scheduler: S) -> Self {
        Self {
            scheduler,
            sessions: SessionContext::new(),
            state: PlaybackState::NoTrack,
        }
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    // ===== Playback Control =====

    /// Play `track` from `start_time`, looping up to `end_time` when given
    ///
    /// Always begins a new session. An `end_time` that is not after
    /// `start_time` is ignored and the track plays unlooped.
    pub fn play(&mut self, track: Arc<Track>, start_time: f64, end_time: Option<f64>) {
        let playback_loop = end_time.and_then(|end| match PlaybackLoop::new(start_time, end) {
            Ok(playback_loop) => Some(playback_loop),
            Err(e) => {
                warn!(error = %e, "ignoring loop end, playing without a loop");
                None
            }
        });

        self.state = PlaybackState::Playing;

        match playback_loop {
            Some(playback_loop) => {
                let session = self.sessions.begin_with_loop(track, playback_loop);
                self.scheduler.play_loop(&session, start_time, true);
            }
            None => {
                let session = self.sessions.begin(track);
                self.scheduler.play_track(&session, start_time, true);
            }
        }
    }

    /// Pause playback (only while playing)
    pub fn pause(&mut self) {
        if self.state != PlaybackState::Playing {
            debug!(state = ?self.state, "pause ignored");
            return;
        }

        self.scheduler.pause();
        self.state = PlaybackState::Paused;
    }

    /// Resume playback (only while paused)
    pub fn resume(&mut self) {
        if self.state != PlaybackState::Paused {
            debug!(state = ?self.state, "resume ignored");
            return;
        }

        self.scheduler.resume();
        self.state = PlaybackState::Playing;
    }

    /// Stop playback and drop the session. Safe from any state.
    pub fn stop(&mut self) {
        self.sessions.clear();
        self.scheduler.stop();
        self.state = PlaybackState::NoTrack;
    }

    /// Track data is not ready to schedule yet
    pub fn waiting(&mut self) {
        self.state = PlaybackState::Waiting;
    }

    /// Track is being transcoded before it can be scheduled
    pub fn transcoding(&mut self) {
        self.state = PlaybackState::Transcoding;
    }

    // ===== Seeking =====

    /// Seek within `track`, respecting an active complete loop
    ///
    /// Targets outside a complete loop go to the loop's start. Reaching the
    /// end of the track while playing reports completion instead of seeking.
    pub fn attempt_seek_to_time(&mut self, track: &Track, time: f64) -> SeekResult {
        let mut target = clamp_to_track(track, time);

        if let Some(playback_loop) = self.sessions.current_loop().filter(PlaybackLoop::is_complete) {
            if !playback_loop.contains(target) {
                debug!(target, loop_start = playback_loop.start_time(), "seek redirected to loop start");
                target = playback_loop.start_time();
            }
        }

        self.finish_seek(track, target, false)
    }

    /// Seek within `track`, removing any loop
    pub fn force_seek_to_time(&mut self, track: &Track, time: f64) -> SeekResult {
        let target = clamp_to_track(track, time);

        let loop_removed = match self.sessions.current() {
            Some(session) if session.playback_loop().is_some() => {
                let track = Arc::clone(session.track());
                self.sessions.begin(track);
                true
            }
            _ => false,
        };

        self.finish_seek(track, target, loop_removed)
    }

    fn finish_seek(&mut self, track: &Track, target: f64, loop_removed: bool) -> SeekResult {
        let completed = self.state == PlaybackState::Playing && track.has_duration() && target >= track.duration();

        if completed {
            debug!(target, "seek reached end of track");
        } else if let Some(session) = self.sessions.current() {
            let begin_immediately = self.state == PlaybackState::Playing;
            self.scheduler.seek_to_time(session, target, begin_immediately);
        } else {
            debug!(target, "seek without a session");
        }

        SeekResult {
            actual_seek_position: target,
            loop_removed,
            track_playback_completed: completed,
        }
    }

    // ===== Loops =====

    /// Replace the current loop with `[start, end]` (incomplete without `end`)
    ///
    /// Does nothing without a session. Playback continues from the current
    /// position if it lies inside the new loop, otherwise from `start`.
    pub fn define_loop(&mut self, start: f64, end: Option<f64>) -> Result<()> {
        let Some(track) = self.sessions.current().map(|session| Arc::clone(session.track())) else {
            debug!("define_loop ignored: no session");
            return Ok(());
        };

        let playback_loop = match end {
            Some(end) => PlaybackLoop::new(start, end)?,
            None => PlaybackLoop::incomplete(start),
        };

        let position = self.scheduler.seek_position();
        let start_at = if playback_loop.contains(position) { position } else { start };

        let begin_immediately = !self.is_paused();
        let session = self.sessions.begin_with_loop(track, playback_loop);
        self.scheduler.play_loop(&session, start_at, begin_immediately);

        Ok(())
    }

    /// Cycle the loop: none -> started -> complete -> none
    ///
    /// Returns the loop after toggling.
    pub fn toggle_loop(&mut self) -> Option<PlaybackLoop> {
        let session = self.sessions.current()?.clone();
        let position = self.scheduler.seek_position();

        match session.playback_loop() {
            None => self.sessions.begin_loop(position),
            Some(pending) if !pending.is_complete() => self.complete_loop(&session, pending, position),
            Some(complete) => {
                let new_session = self.sessions.begin(Arc::clone(session.track()));
                if let Some(end) = complete.end_time() {
                    self.scheduler.end_loop(&new_session, end);
                }
                None
            }
        }
    }

    fn complete_loop(
        &mut self,
        session: &PlaybackSession,
        pending: PlaybackLoop,
        position: f64,
    ) -> Option<PlaybackLoop> {
        match pending.complete(position) {
            Ok(complete) => {
                let begin_immediately = !self.is_paused();
                let new_session = self.sessions.begin_with_loop(Arc::clone(session.track()), complete);
                self.scheduler
                    .play_loop(&new_session, complete.start_time(), begin_immediately);
                Some(complete)
            }
            Err(e) => {
                debug!(error = %e, "loop left incomplete");
                Some(pending)
            }
        }
    }

    // ===== Scheduler Events =====

    /// Apply an event reported by the scheduler
    ///
    /// Events for sessions that are no longer current are ignored. Returns the
    /// finished track when the current session's track completed, so the
    /// caller can move on to the next one.
    pub fn handle_scheduler_event(&mut self, event: SchedulerEvent) -> Option<Arc<Track>> {
        if !self.sessions.is_current(event.session_id()) {
            debug!(?event, "ignoring event for stale session");
            return None;
        }

        match event {
            SchedulerEvent::TrackCompleted { session_id } => {
                let track = self.sessions.current().map(|session| Arc::clone(session.track()));
                debug!(session = %session_id, "track completed");
                self.stop();
                track
            }
            SchedulerEvent::LoopRestarted { session_id, loop_start } => {
                debug!(session = %session_id, loop_start, "loop restarted");
                None
            }
            SchedulerEvent::PlaybackFailed { session_id, reason } => {
                error!(session = %session_id, %reason, "playback failed");
                self.stop();
                None
            }
        }
    }

    // ===== State =====

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_paused(&self) -> bool {
        self.state == PlaybackState::Paused
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.sessions.current()
    }

    pub fn playing_track(&self) -> Option<&Arc<Track>> {
        self.sessions.current().map(PlaybackSession::track)
    }

    /// The current session's loop
    pub fn playback_loop(&self) -> Option<PlaybackLoop> {
        self.sessions.current_loop()
    }

    /// Scheduler position while playing or paused, otherwise 0
    pub fn seek_position(&self) -> f64 {
        if self.state.is_active() {
            self.scheduler.seek_position()
        } else {
            0.0
        }
    }
}

impl<S: Scheduler> std::fmt::Debug for Player<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("state", &self.state)
            .field("session", &self.sessions.current())
            .finish_non_exhaustive()
    }
}

/// Clamp into `[0, duration]`; with an unknown duration only the lower bound applies
fn clamp_to_track(track: &Track, time: f64) -> f64 {
    let time = time.max(0.0);
    if track.has_duration() {
        time.min(track.duration())
    } else {
        time
    }
}
