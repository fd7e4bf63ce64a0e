//! Format context: container-level access to a single audio file
//!
//! - Demultiplexing: reads all streams within the file
//! - Reads the audio stream as encoded packets (to be passed to a codec)
//! - Resolves duration, bit rate, tags and chapters
//! - Seeks to arbitrary positions within the audio stream

use crate::error::{DecodeError, Result};
use crate::options::ReaderOptions;
use crate::packet_table::PacketTable;
use crate::stream::{AudioStream, ImageStream, Stream};
use serde::Serialize;
use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use symphonia::core::errors::{Error as SymphoniaError, SeekErrorKind};
use symphonia::core::formats::{Cue, FormatOptions, FormatReader, Packet, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, MetadataRevision, StandardTagKey, Visual};
use symphonia::core::probe::{Hint, ProbeResult};
use tracing::{debug, warn};

/// Where a seek will land, as understood by the demuxer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekTarget {
    /// Raw files: seek to a packet's byte position (resolved via the packet table)
    Byte { position: u64, timestamp: u64 },
    /// Containers: backward seek to the closest keyframe at or before `timestamp`
    Frame { timestamp: u64 },
}

impl SeekTarget {
    /// Target timestamp in the stream's time base
    pub fn timestamp(&self) -> u64 {
        match *self {
            SeekTarget::Byte { timestamp, .. } | SeekTarget::Frame { timestamp } => timestamp,
        }
    }
}

/// Result of a low-level seek
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekOutcome {
    pub target: SeekTarget,
    /// Timestamp that was asked for
    pub required_ts: u64,
    /// Timestamp of the first packet the demuxer will return next
    ///
    /// May precede `required_ts`; decoded samples before it must be trimmed.
    pub actual_ts: u64,
}

/// A chapter marking within the file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chapter {
    pub index: usize,
    pub title: Option<String>,
    pub start_time: f64,
    pub end_time: f64,
}

impl Chapter {
    pub fn duration(&self) -> f64 {
        (self.end_time - self.start_time).max(0.0)
    }
}

/// Serializable overview of an open file
#[derive(Debug, Clone, Serialize)]
pub struct FormatSummary {
    pub path: PathBuf,
    pub is_raw_audio_file: bool,
    pub duration: f64,
    pub bit_rate: u64,
    pub file_size: u64,
    pub sample_rate: u32,
    pub channel_count: usize,
    pub stream_count: usize,
    pub has_cover_art: bool,
    pub metadata: BTreeMap<String, String>,
    pub chapters: Vec<Chapter>,
}

/// An open audio file
pub struct FormatContext {
    path: PathBuf,
    options: ReaderOptions,
    /// `None` once destroyed
    reader: Option<Box<dyn FormatReader>>,
    streams: Vec<Stream>,
    audio_stream: AudioStream,
    image_stream: Option<ImageStream>,
    is_raw_audio_file: bool,
    duration: f64,
    bit_rate: u64,
    file_size: u64,
    metadata: BTreeMap<String, String>,
    chapters: Vec<Chapter>,
    packet_table: OnceCell<Option<Arc<PacketTable>>>,
}

impl FormatContext {
    /// Open `path` and read its streams
    ///
    /// Fails if the file cannot be opened or probed, if no stream
    /// information can be read, or if there is no audio stream.
    pub fn open(path: impl AsRef<Path>, options: &ReaderOptions) -> Result<Self> {
        Self::open_with_packet_table(path, options, None)
    }

    /// Open `path`, reusing a packet table an earlier context already built
    /// for the same file so raw files are scanned only once
    pub fn open_with_packet_table(
        path: impl AsRef<Path>,
        options: &ReaderOptions,
        packet_table: Option<Arc<PacketTable>>,
    ) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        let mut probed = probe(path, options)?;

        if probed.format.tracks().is_empty() {
            return Err(DecodeError::NoStreamInfo(path_str));
        }

        let audio_streams: Vec<AudioStream> = probed
            .format
            .tracks()
            .iter()
            .filter_map(AudioStream::from_track)
            .collect();

        let default_id = probed.format.default_track().map(|track| track.id);
        let audio_stream = select_audio_stream(&audio_streams, default_id)
            .ok_or_else(|| DecodeError::NoAudioStream(path_str.clone()))?;

        let mut metadata = BTreeMap::new();
        let mut visuals = Vec::new();

        if let Some(metadata_log) = probed.metadata.get() {
            if let Some(revision) = metadata_log.current() {
                collect_revision(revision, &mut metadata, &mut visuals);
            }
        }

        // Container metadata overrides whatever the probe found
        if let Some(revision) = probed.format.metadata().current() {
            collect_revision(revision, &mut metadata, &mut visuals);
        }

        let next_index = audio_streams.iter().map(AudioStream::index).max().unwrap_or(0) + 1;
        let image_stream = visuals
            .first()
            .map(|visual| ImageStream::from_visual(next_index, visual));

        let mut streams: Vec<Stream> = audio_streams.iter().cloned().map(Stream::Audio).collect();
        if let Some(image) = &image_stream {
            streams.push(Stream::Image(image.clone()));
        }

        let file_size = match std::fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(e) => {
                warn!(path = %path_str, error = %e, "unable to read file size");
                0
            }
        };

        let cues = probed.format.cues().to_vec();

        let mut context = Self {
            path: path.to_path_buf(),
            options: options.clone(),
            reader: Some(probed.format),
            streams,
            audio_stream,
            image_stream,
            is_raw_audio_file: options.is_raw_audio_file(path),
            duration: 0.0,
            bit_rate: 0,
            file_size,
            metadata,
            chapters: Vec::new(),
            packet_table: packet_table.map(Some).map(OnceCell::from).unwrap_or_default(),
        };

        context.duration = context.resolve_duration(&audio_streams);
        context.bit_rate = if context.duration > 0.0 {
            (context.file_size as f64 * 8.0 / context.duration).round() as u64
        } else {
            0
        };
        context.chapters = build_chapters(&cues, &context.audio_stream, context.duration);

        debug!(
            path = %path_str,
            raw = context.is_raw_audio_file,
            duration = context.duration,
            bit_rate = context.bit_rate,
            streams = context.streams.len(),
            chapters = context.chapters.len(),
            "opened format context"
        );

        Ok(context)
    }

    /// Duration, in order of precedence:
    ///
    /// - raw files: brute-force scan of every packet
    /// - stream-level duration
    /// - container estimate (longest of all audio streams)
    /// - 0, meaning unknown
    fn resolve_duration(&self, audio_streams: &[AudioStream]) -> f64 {
        let duration = if self.is_raw_audio_file {
            self.packet_table().map(PacketTable::duration)
        } else {
            self.audio_stream
                .duration()
                .or_else(|| estimate_container_duration(audio_streams))
        };

        duration.filter(|d| d.is_finite() && *d > 0.0).unwrap_or(0.0)
    }

    /// Packet table for this file, built on first access
    ///
    /// Expensive: reads every packet of the file. `None` if the scan failed.
    pub fn packet_table(&self) -> Option<&PacketTable> {
        self.packet_table
            .get_or_init(|| {
                match PacketTable::build(&self.path, &self.options, &self.audio_stream) {
                    Ok(table) => Some(Arc::new(table)),
                    Err(e) => {
                        warn!(path = %self.path.display(), error = %e, "unable to build packet table");
                        None
                    }
                }
            })
            .as_deref()
    }

    /// The packet table if it has already been built, without scanning
    pub fn shared_packet_table(&self) -> Option<Arc<PacketTable>> {
        self.packet_table.get().cloned().flatten()
    }

    /// Read one packet, returning it only if it belongs to `stream`
    ///
    /// Packets of other streams are discarded, not buffered.
    pub fn read_packet(&mut self, stream: &AudioStream) -> Result<Option<Packet>> {
        let reader = self.reader_mut()?;
        let packet = reader.next_packet()?;

        Ok((packet.track_id() == stream.index()).then_some(packet))
    }

    /// Work out where a seek to `time` seconds would land, without seeking
    pub fn resolve_seek(&self, stream: &AudioStream, time: f64) -> Result<SeekTarget> {
        let time = time.max(0.0);

        if self.is_raw_audio_file {
            let (position, timestamp) = self
                .packet_table()
                .and_then(|table| table.closest_packet(time))
                .map(|entry| (entry.byte_position, entry.ts))
                .unwrap_or((0, 0));

            // Payload offsets exclude headers, so this only catches a stale table
            if position >= self.file_size {
                return Err(DecodeError::SeekOutOfRange { target: time });
            }

            Ok(SeekTarget::Byte {
                position,
                timestamp,
            })
        } else {
            if self.duration <= 0.0 {
                return Err(DecodeError::InvalidDurationForSeek(self.path.display().to_string()));
            }

            let time_base_duration = stream
                .time_base_duration()
                .unwrap_or_else(|| stream.seconds_to_timestamp(self.duration));

            let timestamp = (time * time_base_duration as f64 / self.duration) as u64;
            if timestamp >= time_base_duration {
                return Err(DecodeError::SeekOutOfRange { target: time });
            }

            Ok(SeekTarget::Frame { timestamp })
        }
    }

    /// Seek within `stream` to `time` seconds
    ///
    /// The target is validated before the demuxer is touched, so an
    /// out-of-range request fails fast without disturbing the read position.
    pub fn seek(&mut self, stream: &AudioStream, time: f64) -> Result<SeekOutcome> {
        let target = self.resolve_seek(stream, time)?;

        let mode = match target {
            SeekTarget::Byte { .. } => SeekMode::Accurate,
            SeekTarget::Frame { .. } => SeekMode::Coarse,
        };

        let track_id = stream.index();
        let reader = self.reader_mut()?;
        let seeked = reader
            .seek(
                mode,
                SeekTo::TimeStamp {
                    ts: target.timestamp(),
                    track_id,
                },
            )
            .map_err(|e| match e {
                SymphoniaError::SeekError(SeekErrorKind::OutOfRange) => {
                    DecodeError::SeekOutOfRange { target: time }
                }
                other => {
                    warn!(stream = track_id, error = %other, "unable to seek within stream");
                    DecodeError::from(other)
                }
            })?;

        debug!(
            time,
            ?target,
            required_ts = seeked.required_ts,
            actual_ts = seeked.actual_ts,
            "seeked"
        );

        Ok(SeekOutcome {
            target,
            required_ts: seeked.required_ts,
            actual_ts: seeked.actual_ts,
        })
    }

    /// Release the demuxer. Safe to call any number of times.
    pub fn destroy(&mut self) {
        if self.reader.take().is_some() {
            debug!(path = %self.path.display(), "destroyed format context");
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.reader.is_none()
    }

    fn reader_mut(&mut self) -> Result<&mut Box<dyn FormatReader>> {
        self.reader
            .as_mut()
            .ok_or_else(|| DecodeError::InvalidState("format context has been destroyed".to_string()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn streams(&self) -> &[Stream] {
        &self.streams
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    /// The first / best audio stream
    pub fn audio_stream(&self) -> &AudioStream {
        &self.audio_stream
    }

    /// Embedded cover art, if any
    pub fn image_stream(&self) -> Option<&ImageStream> {
        self.image_stream.as_ref()
    }

    /// Whether the file is raw audio (not muxed into a container)
    pub fn is_raw_audio_file(&self) -> bool {
        self.is_raw_audio_file
    }

    /// Duration in seconds, 0 if unknown
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Bit rate in bits per second, 0 if unknown
    pub fn bit_rate(&self) -> u64 {
        self.bit_rate
    }

    /// File size in bytes
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Tag key/value pairs from the file's header
    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// Chapter markings, sorted by start time
    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn chapter_count(&self) -> usize {
        self.chapters.len()
    }

    pub fn summary(&self) -> FormatSummary {
        FormatSummary {
            path: self.path.clone(),
            is_raw_audio_file: self.is_raw_audio_file,
            duration: self.duration,
            bit_rate: self.bit_rate,
            file_size: self.file_size,
            sample_rate: self.audio_stream.sample_rate(),
            channel_count: self.audio_stream.channel_count(),
            stream_count: self.streams.len(),
            has_cover_art: self.image_stream.is_some(),
            metadata: self.metadata.clone(),
            chapters: self.chapters.clone(),
        }
    }
}

impl Drop for FormatContext {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for FormatContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatContext")
            .field("path", &self.path)
            .field("is_raw_audio_file", &self.is_raw_audio_file)
            .field("duration", &self.duration)
            .field("destroyed", &self.is_destroyed())
            .finish_non_exhaustive()
    }
}

/// Open and probe a file with symphonia
pub(crate) fn probe(path: &Path, options: &ReaderOptions) -> Result<ProbeResult> {
    let path_str = path.display().to_string();

    if !path.exists() {
        return Err(DecodeError::open_failed(&path_str, "file not found"));
    }

    let file = std::fs::File::open(path).map_err(|e| DecodeError::open_failed(&path_str, e.to_string()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let format_options = FormatOptions {
        enable_gapless: options.enable_gapless,
        ..Default::default()
    };

    symphonia::default::get_probe()
        .format(&hint, mss, &format_options, &MetadataOptions::default())
        .map_err(|e| DecodeError::open_failed(&path_str, format!("Failed to probe file: {}", e)))
}

/// The container's default track if it is audio, otherwise the first audio stream
fn select_audio_stream(audio_streams: &[AudioStream], default_id: Option<u32>) -> Option<AudioStream> {
    default_id
        .and_then(|id| audio_streams.iter().find(|s| s.index() == id))
        .or_else(|| audio_streams.first())
        .cloned()
}

fn estimate_container_duration(audio_streams: &[AudioStream]) -> Option<f64> {
    audio_streams
        .iter()
        .filter_map(AudioStream::duration)
        .reduce(f64::max)
}

fn collect_revision(
    revision: &MetadataRevision,
    metadata: &mut BTreeMap<String, String>,
    visuals: &mut Vec<Visual>,
) {
    for tag in revision.tags() {
        let value = tag.value.to_string();
        if value.trim().is_empty() {
            continue;
        }

        let key = match tag.std_key {
            Some(std_key) => format!("{:?}", std_key),
            None => tag.key.clone(),
        };
        metadata.insert(key, value);
    }

    visuals.extend(revision.visuals().iter().cloned());
}

fn build_chapters(cues: &[Cue], stream: &AudioStream, duration: f64) -> Vec<Chapter> {
    let mut starts: Vec<(f64, Option<String>)> = cues
        .iter()
        .map(|cue| {
            let title = cue
                .tags
                .iter()
                .find(|tag| {
                    tag.std_key == Some(StandardTagKey::TrackTitle)
                        || tag.key.eq_ignore_ascii_case("title")
                })
                .map(|tag| tag.value.to_string());
            (stream.timestamp_to_seconds(cue.start_ts), title)
        })
        .collect();

    starts.sort_by(|a, b| a.0.total_cmp(&b.0));

    let ends: Vec<f64> = starts
        .iter()
        .skip(1)
        .map(|(start, _)| *start)
        .chain(std::iter::once(duration))
        .collect();

    starts
        .into_iter()
        .zip(ends)
        .enumerate()
        .map(|(index, ((start_time, title), end_time))| Chapter {
            index,
            title,
            start_time,
            end_time: end_time.max(start_time),
        })
        .collect()
}
