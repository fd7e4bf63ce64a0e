//! Decoded audio frames
//!
//! A `Frame` is a window over a block of planar `f32` samples produced by one
//! decode call. Truncating a frame produces a new window over the same block,
//! so trimming to sample-accurate seek and loop boundaries never copies audio.

use crate::buffer::PlaybackBuffer;
use crate::error::{DecodeError, Result};
use std::sync::Arc;

/// A window of decoded samples (per channel) starting at `timestamp`
#[derive(Debug, Clone)]
pub struct Frame {
    samples: Arc<Vec<Vec<f32>>>,
    sample_rate: u32,
    /// Presentation time of the block's first sample, in seconds
    block_timestamp: f64,
    first_sample_index: usize,
    sample_count: usize,
}

impl Frame {
    /// Wrap planar samples (one `Vec` per channel, all the same length)
    pub fn new(samples: Vec<Vec<f32>>, sample_rate: u32, timestamp: f64) -> Self {
        let sample_count = samples.iter().map(Vec::len).min().unwrap_or(0);

        Self {
            samples: Arc::new(samples),
            sample_rate,
            block_timestamp: timestamp,
            first_sample_index: 0,
            sample_count,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.samples.len()
    }

    /// Offset of this window within the decoded block
    pub fn first_sample_index(&self) -> usize {
        self.first_sample_index
    }

    /// Samples per channel in this window
    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    pub fn is_empty(&self) -> bool {
        self.sample_count == 0
    }

    /// Presentation time of the first sample in this window
    pub fn timestamp(&self) -> f64 {
        self.block_timestamp + self.first_sample_index as f64 / self.sample_rate.max(1) as f64
    }

    /// Playing time of this window in seconds
    pub fn duration(&self) -> f64 {
        self.sample_count as f64 / self.sample_rate.max(1) as f64
    }

    /// Presentation time just past the last sample
    pub fn end_timestamp(&self) -> f64 {
        self.timestamp() + self.duration()
    }

    /// Samples of one channel within the window
    pub fn channel(&self, channel: usize) -> Option<&[f32]> {
        self.samples
            .get(channel)
            .map(|samples| &samples[self.first_sample_index..self.first_sample_index + self.sample_count])
    }

    /// Keep only the first `n` samples
    pub fn keep_first_n_samples(&self, n: usize) -> Frame {
        if n >= self.sample_count {
            return self.clone();
        }

        Frame {
            sample_count: n,
            ..self.clone()
        }
    }

    /// Keep only the last `n` samples
    pub fn keep_last_n_samples(&self, n: usize) -> Frame {
        if n >= self.sample_count {
            return self.clone();
        }

        Frame {
            first_sample_index: self.first_sample_index + (self.sample_count - n),
            sample_count: n,
            ..self.clone()
        }
    }

    /// Number of samples from the start of the window up to `time`
    ///
    /// Clamped to the window: times before it give 0, times past it give
    /// `sample_count`.
    pub fn samples_until(&self, time: f64) -> usize {
        let offset = (time - self.timestamp()) * self.sample_rate as f64;
        if offset <= 0.0 {
            0
        } else {
            (offset.round() as usize).min(self.sample_count)
        }
    }

    /// Copy the window into `buffer`, starting at frame `offset` in every channel
    pub fn copy_samples(&self, buffer: &mut PlaybackBuffer, offset: usize) -> Result<()> {
        if buffer.channel_count() < self.channel_count() {
            return Err(DecodeError::InvalidBuffer(format!(
                "buffer has {} channels, frame needs {}",
                buffer.channel_count(),
                self.channel_count()
            )));
        }

        let end = offset + self.sample_count;
        if end > buffer.capacity() {
            return Err(DecodeError::InvalidBuffer(format!(
                "{} samples at offset {} exceed capacity {}",
                self.sample_count,
                offset,
                buffer.capacity()
            )));
        }

        let window = self.first_sample_index..self.first_sample_index + self.sample_count;
        for (channel, samples) in self.samples.iter().enumerate() {
            buffer.channel_storage_mut(channel)[offset..end].copy_from_slice(&samples[window.clone()]);
        }
        buffer.extend_frame_length(end);

        Ok(())
    }
}
