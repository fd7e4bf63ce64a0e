//! Destination buffers for decoded audio

/// Planar `f32` buffer with a fixed capacity, filled frame by frame
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
    capacity: usize,
    frame_length: usize,
}

impl PlaybackBuffer {
    /// Zeroed buffer holding up to `capacity` samples per channel
    pub fn new(channel_count: usize, sample_rate: u32, capacity: usize) -> Self {
        Self {
            channels: vec![vec![0.0; capacity]; channel_count],
            sample_rate,
            capacity,
            frame_length: 0,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Maximum samples per channel
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples per channel written so far
    pub fn frame_length(&self) -> usize {
        self.frame_length
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.frame_length
    }

    pub fn is_empty(&self) -> bool {
        self.frame_length == 0
    }

    pub fn is_full(&self) -> bool {
        self.frame_length >= self.capacity
    }

    /// Playing time of the filled portion in seconds
    pub fn duration(&self) -> f64 {
        self.frame_length as f64 / self.sample_rate.max(1) as f64
    }

    /// Filled samples of one channel (empty for out-of-range channels)
    pub fn channel(&self, channel: usize) -> &[f32] {
        self.channels
            .get(channel)
            .map(|samples| &samples[..self.frame_length])
            .unwrap_or(&[])
    }

    /// Interleave the filled portion, for sinks that want LRLR order
    pub fn to_interleaved(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.frame_length * self.channels.len());
        for i in 0..self.frame_length {
            for channel in &self.channels {
                out.push(channel[i]);
            }
        }
        out
    }

    pub(crate) fn channel_storage_mut(&mut self, channel: usize) -> &mut [f32] {
        &mut self.channels[channel]
    }

    pub(crate) fn extend_frame_length(&mut self, end: usize) {
        self.frame_length = self.frame_length.max(end.min(self.capacity));
    }
}
