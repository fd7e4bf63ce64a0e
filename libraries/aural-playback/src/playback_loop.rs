//! Loop regions within a track

use crate::error::{PlaybackError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A region of a track to repeat
///
/// Incomplete until an end time is set. When both bounds are set,
/// `start_time < end_time`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackLoop {
    start_time: f64,
    end_time: Option<f64>,
}

impl PlaybackLoop {
    /// Complete loop between `start_time` and `end_time`
    pub fn new(start_time: f64, end_time: f64) -> Result<Self> {
        Self::incomplete(start_time).complete(end_time)
    }

    /// Loop with only a start, waiting for its end
    pub fn incomplete(start_time: f64) -> Self {
        Self {
            start_time,
            end_time: None,
        }
    }

    /// This loop's start with the given end
    pub fn complete(&self, end_time: f64) -> Result<Self> {
        match self.start_time.partial_cmp(&end_time) {
            Some(Ordering::Less) => Ok(Self {
                start_time: self.start_time,
                end_time: Some(end_time),
            }),
            _ => Err(PlaybackError::InvalidLoop {
                start: self.start_time,
                end: end_time,
            }),
        }
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn end_time(&self) -> Option<f64> {
        self.end_time
    }

    pub fn is_complete(&self) -> bool {
        self.end_time.is_some()
    }

    /// Whether `time` lies within the loop, bounds included
    ///
    /// Always false for incomplete loops.
    pub fn contains(&self, time: f64) -> bool {
        self.end_time
            .is_some_and(|end| time >= self.start_time && time <= end)
    }

    /// Length in seconds (complete loops only)
    pub fn duration(&self) -> Option<f64> {
        self.end_time.map(|end| end - self.start_time)
    }
}
