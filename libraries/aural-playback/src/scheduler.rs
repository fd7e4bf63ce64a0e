//! The scheduler seam
//!
//! The player decides *what* should play; a scheduler makes it audible.
//! Scheduler calls are fire-and-forget. Anything the scheduler learns later
//! (the track ran out, a loop wrapped, a file failed to decode) comes back as
//! a [`SchedulerEvent`] that the owner thread hands to
//! [`Player::handle_scheduler_event`](crate::Player::handle_scheduler_event).

use crate::session::{PlaybackSession, SessionId};
use serde::{Deserialize, Serialize};

/// Feeds decoded audio for a session to the output on a timeline
pub trait Scheduler {
    /// Start playing the session's track from `start_position` seconds
    fn play_track(&mut self, session: &PlaybackSession, start_position: f64, begin_immediately: bool);

    /// Start playing the session's loop from `start_time` seconds
    fn play_loop(&mut self, session: &PlaybackSession, start_time: f64, begin_immediately: bool);

    /// Stop looping: play on past `loop_end_time` under the (unlooped) session
    fn end_loop(&mut self, session: &PlaybackSession, loop_end_time: f64);

    /// Reposition the session to `time` seconds
    fn seek_to_time(&mut self, session: &PlaybackSession, time: f64, begin_immediately: bool);

    fn pause(&mut self);

    fn resume(&mut self);

    /// Stop and forget the current session. Safe to call repeatedly.
    fn stop(&mut self);

    /// Current playback position in seconds
    fn seek_position(&self) -> f64;
}

/// Something a scheduler's worker observed, tagged with the session it concerns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SchedulerEvent {
    /// The last audio of the track has been scheduled
    TrackCompleted { session_id: SessionId },

    /// A complete loop reached its end and playback wrapped to its start
    LoopRestarted { session_id: SessionId, loop_start: f64 },

    /// The track could not be opened, sought or decoded
    PlaybackFailed { session_id: SessionId, reason: String },
}

impl SchedulerEvent {
    pub fn session_id(&self) -> SessionId {
        match self {
            Self::TrackCompleted { session_id }
            | Self::LoopRestarted { session_id, .. }
            | Self::PlaybackFailed { session_id, .. } => *session_id,
        }
    }
}
