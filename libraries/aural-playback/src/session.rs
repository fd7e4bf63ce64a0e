//! Playback sessions
//!
//! A session is one playback intent: "this track, optionally looped, is what
//! the scheduler should be playing". The player never edits the scheduler's
//! view of a session. When loop state changes materially it begins a new
//! session instead, so anything still tagged with the old id (queued buffers,
//! worker events) can be recognised as stale by identity alone.

use crate::playback_loop::PlaybackLoop;
use crate::types::Track;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Session identifier, unique within a `SessionContext`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(u64);

impl SessionId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One playback intent for a track
///
/// Sessions compare by identity: two sessions for the same track and loop
/// are still different sessions.
#[derive(Debug, Clone)]
pub struct PlaybackSession {
    id: SessionId,
    track: Arc<Track>,
    playback_loop: Option<PlaybackLoop>,
}

impl PlaybackSession {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn track(&self) -> &Arc<Track> {
        &self.track
    }

    pub fn playback_loop(&self) -> Option<PlaybackLoop> {
        self.playback_loop
    }

    /// End of the loop, when a complete loop is set
    pub fn loop_end(&self) -> Option<f64> {
        self.playback_loop.and_then(|lp| lp.end_time())
    }
}

impl PartialEq for PlaybackSession {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PlaybackSession {}

/// Owner of the current session
///
/// At most one session is current. Ids increase monotonically and are never
/// reused, even after `clear`.
#[derive(Debug, Default)]
pub struct SessionContext {
    last_id: u64,
    current: Option<PlaybackSession>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new unlooped session for `track`, replacing the current one
    pub fn begin(&mut self, track: Arc<Track>) -> PlaybackSession {
        self.install(track, None)
    }

    /// Start a new session for `track` carrying `playback_loop`
    pub fn begin_with_loop(&mut self, track: Arc<Track>, playback_loop: PlaybackLoop) -> PlaybackSession {
        self.install(track, Some(playback_loop))
    }

    /// Install an incomplete loop on the current session, keeping its identity
    pub fn begin_loop(&mut self, start_time: f64) -> Option<PlaybackLoop> {
        let session = self.current.as_mut()?;
        let playback_loop = PlaybackLoop::incomplete(start_time);
        session.playback_loop = Some(playback_loop);

        debug!(session = %session.id, start_time, "began loop");
        Some(playback_loop)
    }

    /// Complete the current session's pending loop in place
    ///
    /// Ignored when there is no incomplete loop or `end_time` is not after
    /// its start.
    pub fn end_loop(&mut self, end_time: f64) -> Option<PlaybackLoop> {
        let session = self.current.as_mut()?;
        let pending = session.playback_loop.filter(|lp| !lp.is_complete())?;
        let completed = pending.complete(end_time).ok()?;
        session.playback_loop = Some(completed);

        debug!(session = %session.id, end_time, "ended loop");
        Some(completed)
    }

    /// Drop the current session and its loop
    pub fn clear(&mut self) {
        if let Some(session) = self.current.take() {
            debug!(session = %session.id, "cleared session");
        }
    }

    pub fn current(&self) -> Option<&PlaybackSession> {
        self.current.as_ref()
    }

    pub fn current_loop(&self) -> Option<PlaybackLoop> {
        self.current.as_ref().and_then(PlaybackSession::playback_loop)
    }

    pub fn is_current(&self, id: SessionId) -> bool {
        self.current.as_ref().is_some_and(|session| session.id == id)
    }

    fn install(&mut self, track: Arc<Track>, playback_loop: Option<PlaybackLoop>) -> PlaybackSession {
        self.last_id += 1;
        let session = PlaybackSession {
            id: SessionId(self.last_id),
            track,
            playback_loop,
        };

        debug!(
            session = %session.id,
            track = %session.track.path().display(),
            looped = playback_loop.is_some(),
            "began session"
        );

        self.current = Some(session.clone());
        session
    }
}
