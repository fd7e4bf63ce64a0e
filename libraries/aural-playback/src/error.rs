//! Error types for playback

use aural_decode::DecodeError;
use thiserror::Error;

/// Playback errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Loop bounds are not ordered
    #[error("Invalid loop: start {start:.3}s must be before end {end:.3}s")]
    InvalidLoop { start: f64, end: f64 },

    /// Opening, seeking or decoding the track failed
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The scheduler's worker could not be started or has gone away
    #[error("Scheduler unavailable: {0}")]
    SchedulerUnavailable(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
