//! Scheduler configuration

use crate::error::{PlaybackError, Result};
use serde::{Deserialize, Serialize};

/// Tuning for the decode scheduler's worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Samples per channel in each scheduled buffer
    pub buffer_frames: usize,

    /// Scheduled buffers that may wait for the sink before decoding blocks
    pub queue_depth: usize,

    /// Name of the worker thread
    pub thread_name: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            buffer_frames: 4096,
            queue_depth: 8,
            thread_name: "aural-decoder".to_string(),
        }
    }
}

impl SchedulerConfig {
    /// Reject values the worker cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.buffer_frames == 0 {
            return Err(PlaybackError::Config("buffer_frames must be at least 1".to_string()));
        }
        if self.queue_depth == 0 {
            return Err(PlaybackError::Config("queue_depth must be at least 1".to_string()));
        }
        if self.thread_name.trim().is_empty() {
            return Err(PlaybackError::Config("thread_name must not be empty".to_string()));
        }
        Ok(())
    }
}
