//! Core types for playback

use aural_decode::{FormatContext, PacketTable, ReaderOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

/// A decodable media resource
///
/// The duration is resolved at most once. Until then it reads as `0.0`,
/// meaning unknown. Tracks compare equal by path.
#[derive(Debug)]
pub struct Track {
    path: PathBuf,
    duration: OnceLock<f64>,
    /// Packet index of a raw file, kept so the file is scanned only once
    packet_table: OnceLock<Arc<PacketTable>>,
}

impl Track {
    /// Track whose duration is not known yet
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            duration: OnceLock::new(),
            packet_table: OnceLock::new(),
        }
    }

    /// Track with an already-known duration in seconds
    pub fn with_duration(path: impl Into<PathBuf>, duration: f64) -> Self {
        let track = Self::new(path);
        track.set_duration(duration);
        track
    }

    /// Open the file once to learn its duration
    pub fn probe(path: impl Into<PathBuf>, options: &ReaderOptions) -> crate::Result<Self> {
        let track = Self::new(path);
        let context = FormatContext::open(&track.path, options)?;
        track.set_duration(context.duration());
        if let Some(table) = context.shared_packet_table() {
            track.set_packet_table(table);
        }
        Ok(track)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Duration in seconds, 0 if unknown
    pub fn duration(&self) -> f64 {
        self.duration.get().copied().unwrap_or(0.0)
    }

    pub fn has_duration(&self) -> bool {
        self.duration() > 0.0
    }

    /// Record the duration. Returns false if it was already resolved.
    ///
    /// Non-positive or non-finite values are ignored.
    pub fn set_duration(&self, duration: f64) -> bool {
        if !duration.is_finite() || duration <= 0.0 {
            return false;
        }
        self.duration.set(duration).is_ok()
    }

    /// Packet table built by an earlier open of this track's file
    pub fn packet_table(&self) -> Option<Arc<PacketTable>> {
        self.packet_table.get().cloned()
    }

    /// Keep a built packet table. Ignored if one is already kept.
    pub fn set_packet_table(&self, table: Arc<PacketTable>) {
        let _ = self.packet_table.set(table);
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for Track {}

/// Player state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaybackState {
    /// No track loaded
    #[default]
    NoTrack,

    /// Currently playing
    Playing,

    /// Paused mid-track
    Paused,

    /// Track data not ready yet
    Waiting,

    /// Track is being transcoded before it can be scheduled
    Transcoding,
}

impl PlaybackState {
    /// Playing or paused: a session is actively scheduled
    pub fn is_active(self) -> bool {
        matches!(self, Self::Playing | Self::Paused)
    }
}

/// Outcome of a player seek
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeekResult {
    /// Where playback was positioned, after clamping and loop redirection
    pub actual_seek_position: f64,

    /// Whether the seek removed the active loop
    pub loop_removed: bool,

    /// Whether the seek reached the end of the track while playing
    pub track_playback_completed: bool,
}
