//! Aural Decode
//!
//! Format reading and frame decoding for the Aural playback core.
//!
//! This crate provides:
//! - `FormatContext`: opens a file, demuxes its streams, resolves duration,
//!   bit rate, tags and chapters, and seeks by byte (raw files) or by
//!   frame timestamp (containers)
//! - `PacketTable`: brute-force packet index for raw audio files
//! - `AudioCodec`: send/receive decoding into planar `f32` frames
//! - `Frame` / `PlaybackBuffer`: zero-copy truncation and sample-accurate copies
//!
//! # Example: Decoding a File
//!
//! ```rust,no_run
//! use aural_decode::{AudioCodec, FormatContext, PlaybackBuffer, ReaderOptions};
//!
//! # fn example() -> aural_decode::Result<()> {
//! let mut context = FormatContext::open("/music/song.flac", &ReaderOptions::default())?;
//! let stream = context.audio_stream().clone();
//! let mut codec = AudioCodec::new(&stream)?;
//!
//! context.seek(&stream, 30.0)?;
//! codec.flush();
//!
//! let mut buffer = PlaybackBuffer::new(stream.channel_count(), stream.sample_rate(), 4096);
//! while !buffer.is_full() {
//!     let Some(packet) = context.read_packet(&stream)? else { continue };
//!     codec.send_packet(&packet)?;
//!     while let Some(frame) = codec.receive_frame() {
//!         let frame = frame.keep_first_n_samples(buffer.remaining());
//!         let offset = buffer.frame_length();
//!         frame.copy_samples(&mut buffer, offset)?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod buffer;
mod codec;
mod error;
mod format;
mod frame;
mod options;
mod packet_table;
mod stream;

pub use buffer::PlaybackBuffer;
pub use codec::AudioCodec;
pub use error::{DecodeError, Result};
pub use format::{Chapter, FormatContext, FormatSummary, SeekOutcome, SeekTarget};
pub use frame::Frame;
pub use options::ReaderOptions;
pub use packet_table::{PacketEntry, PacketTable};
pub use stream::{AudioStream, ImageStream, Stream};

/// Encoded packet as read from the demuxer
pub use symphonia::core::formats::Packet;
