//! Audio codec wrapper
//!
//! Decoding is a send/receive exchange: packets go in with `send_packet`,
//! frames come out with `receive_frame`. A `None` from `receive_frame` means
//! the codec needs more input, never that something failed.

use crate::error::{DecodeError, Result};
use crate::frame::Frame;
use crate::stream::AudioStream;
use std::collections::VecDeque;
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::conv::IntoSample;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::Packet;
use symphonia::core::sample::Sample;
use tracing::{debug, warn};

/// Decoder for one audio stream
pub struct AudioCodec {
    decoder: Box<dyn Decoder>,
    stream: AudioStream,
    pending: VecDeque<Frame>,
    skipped_packets: u64,
}

impl AudioCodec {
    /// Create a decoder for `stream`
    pub fn new(stream: &AudioStream) -> Result<Self> {
        let decoder = symphonia::default::get_codecs()
            .make(stream.codec_params(), &DecoderOptions::default())
            .map_err(|e| DecodeError::Decode(format!("Failed to create decoder: {}", e)))?;

        Ok(Self {
            decoder,
            stream: stream.clone(),
            pending: VecDeque::new(),
            skipped_packets: 0,
        })
    }

    pub fn stream(&self) -> &AudioStream {
        &self.stream
    }

    /// Packets dropped because they could not be decoded
    pub fn skipped_packets(&self) -> u64 {
        self.skipped_packets
    }

    /// Decode one packet
    ///
    /// Corrupt packets are logged and skipped. Only unrecoverable decoder
    /// failures are returned.
    pub fn send_packet(&mut self, packet: &Packet) -> Result<()> {
        let timestamp = self.stream.timestamp_to_seconds(packet.ts());

        match self.decoder.decode(packet) {
            Ok(decoded) => {
                let sample_rate = decoded.spec().rate;
                let samples = to_planar(decoded);
                let frame = Frame::new(samples, sample_rate, timestamp);
                if !frame.is_empty() {
                    self.pending.push_back(frame);
                }
                Ok(())
            }
            Err(SymphoniaError::DecodeError(e)) => {
                self.skipped_packets += 1;
                warn!(ts = packet.ts(), error = e, "skipping undecodable packet");
                Ok(())
            }
            Err(SymphoniaError::ResetRequired) => {
                debug!("decoder reset required");
                self.decoder.reset();
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Next decoded frame, or `None` if more packets are needed
    pub fn receive_frame(&mut self) -> Option<Frame> {
        self.pending.pop_front()
    }

    /// Drop buffered frames and decoder state (after a seek)
    pub fn flush(&mut self) {
        self.pending.clear();
        self.decoder.reset();
    }
}

impl std::fmt::Debug for AudioCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioCodec")
            .field("stream", &self.stream.index())
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

/// Convert any decoded sample format to planar `f32`
fn to_planar(decoded: AudioBufferRef<'_>) -> Vec<Vec<f32>> {
    match decoded {
        AudioBufferRef::F32(buf) => planar(&buf, |s: f32| s.clamp(-1.0, 1.0)),
        AudioBufferRef::F64(buf) => planar(&buf, |s: f64| (s as f32).clamp(-1.0, 1.0)),
        AudioBufferRef::S32(buf) => planar(&buf, IntoSample::<f32>::into_sample),
        AudioBufferRef::S24(buf) => planar(&buf, IntoSample::<f32>::into_sample),
        AudioBufferRef::S16(buf) => planar(&buf, IntoSample::<f32>::into_sample),
        AudioBufferRef::S8(buf) => planar(&buf, IntoSample::<f32>::into_sample),
        AudioBufferRef::U32(buf) => planar(&buf, IntoSample::<f32>::into_sample),
        AudioBufferRef::U24(buf) => planar(&buf, IntoSample::<f32>::into_sample),
        AudioBufferRef::U16(buf) => planar(&buf, IntoSample::<f32>::into_sample),
        AudioBufferRef::U8(buf) => planar(&buf, IntoSample::<f32>::into_sample),
    }
}

fn planar<S: Sample>(buf: &AudioBuffer<S>, convert: impl Fn(S) -> f32) -> Vec<Vec<f32>> {
    (0..buf.spec().channels.count())
        .map(|channel| buf.chan(channel).iter().map(|&s| convert(s)).collect())
        .collect()
}
