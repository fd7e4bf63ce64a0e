//! Demuxed streams
//!
//! A file exposes any number of audio tracks plus, optionally, embedded
//! pictures. Pictures are modelled as an "image stream" holding a single
//! packet: the cover art.

use symphonia::core::codecs::{CodecParameters, CODEC_TYPE_NULL};
use symphonia::core::formats::Track;
use symphonia::core::meta::{StandardVisualKey, Visual};
use symphonia::core::units::{Time, TimeBase};

/// An audio stream within a container
#[derive(Debug, Clone)]
pub struct AudioStream {
    index: u32,
    codec_params: CodecParameters,
    sample_rate: u32,
    channel_count: usize,
    time_base: Option<TimeBase>,
    duration: Option<f64>,
    time_base_duration: Option<u64>,
}

impl AudioStream {
    /// Wrap a demuxed track, or `None` if it carries no decodable audio
    pub fn from_track(track: &Track) -> Option<Self> {
        let params = &track.codec_params;
        if params.codec == CODEC_TYPE_NULL {
            return None;
        }

        let sample_rate = params.sample_rate?;
        let channel_count = params.channels.map(|c| c.count()).unwrap_or(2);

        let duration = match (params.time_base, params.n_frames) {
            (Some(time_base), Some(n_frames)) => Some(seconds(time_base.calc_time(n_frames))),
            (None, Some(n_frames)) if sample_rate > 0 => Some(n_frames as f64 / sample_rate as f64),
            _ => None,
        }
        .filter(|d| *d > 0.0);

        Some(Self {
            index: track.id,
            codec_params: params.clone(),
            sample_rate,
            channel_count,
            time_base: params.time_base,
            duration,
            time_base_duration: params.n_frames.filter(|n| *n > 0),
        })
    }

    /// Stream (track) identifier within the container
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Codec parameters used to build a decoder
    pub fn codec_params(&self) -> &CodecParameters {
        &self.codec_params
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of channels
    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Stream-level duration in seconds, if the container reports one
    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    /// Stream duration expressed in time base units
    pub fn time_base_duration(&self) -> Option<u64> {
        self.time_base_duration
    }

    /// Convert a timestamp in this stream's time base to seconds
    pub fn timestamp_to_seconds(&self, ts: u64) -> f64 {
        match self.time_base {
            Some(time_base) => seconds(time_base.calc_time(ts)),
            None => ts as f64 / self.sample_rate.max(1) as f64,
        }
    }

    /// Convert seconds to a timestamp in this stream's time base
    pub fn seconds_to_timestamp(&self, secs: f64) -> u64 {
        let secs = secs.max(0.0);
        match self.time_base {
            Some(time_base) => time_base.calc_timestamp(Time::new(secs.trunc() as u64, secs.fract())),
            None => (secs * self.sample_rate as f64) as u64,
        }
    }
}

/// Cover art carried by a file
#[derive(Debug, Clone)]
pub struct ImageStream {
    index: u32,
    media_type: String,
    usage: Option<StandardVisualKey>,
    data: Vec<u8>,
}

impl ImageStream {
    pub(crate) fn from_visual(index: u32, visual: &Visual) -> Self {
        Self {
            index,
            media_type: visual.media_type.clone(),
            usage: visual.usage,
            data: visual.data.to_vec(),
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    /// MIME type as reported by the container (may be empty)
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn is_front_cover(&self) -> bool {
        self.usage == Some(StandardVisualKey::FrontCover)
    }

    /// The single "packet" of this stream: the encoded picture
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Any stream this reader cares about
#[derive(Debug, Clone)]
pub enum Stream {
    Audio(AudioStream),
    Image(ImageStream),
}

impl Stream {
    pub fn index(&self) -> u32 {
        match self {
            Stream::Audio(audio) => audio.index(),
            Stream::Image(image) => image.index(),
        }
    }

    pub fn as_audio(&self) -> Option<&AudioStream> {
        match self {
            Stream::Audio(audio) => Some(audio),
            Stream::Image(_) => None,
        }
    }

    pub fn as_image(&self) -> Option<&ImageStream> {
        match self {
            Stream::Image(image) => Some(image),
            Stream::Audio(_) => None,
        }
    }
}

pub(crate) fn seconds(time: Time) -> f64 {
    time.seconds as f64 + time.frac
}
