//! Brute-force packet index for raw audio files
//!
//! Raw (containerless) streams such as ADTS AAC or AC-3 carry no reliable
//! duration and no seek index. The packet table reads every packet of the
//! audio stream once, recording where it starts and when it plays. This is
//! an O(file size) scan, so the format context builds it lazily and caches it.

use crate::error::{DecodeError, Result};
use crate::format::probe;
use crate::options::ReaderOptions;
use crate::stream::AudioStream;
use std::path::Path;
use std::time::Instant;
use tracing::debug;

/// One packet of the scanned stream
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacketEntry {
    /// Offset of the packet's payload within the elementary stream
    ///
    /// A running total of earlier payload sizes, not a file offset: it never
    /// counts container headers, so it is always below the file size.
    pub byte_position: u64,
    /// Presentation time in seconds
    pub timestamp: f64,
    /// Stream timestamp in time base units
    pub ts: u64,
    /// Playing time of the packet in seconds
    pub duration: f64,
}

/// Position and timestamp of every packet in an audio stream
#[derive(Debug, Clone, Default)]
pub struct PacketTable {
    entries: Vec<PacketEntry>,
    duration: f64,
}

impl PacketTable {
    /// Scan `path` with a fresh reader, leaving any open context untouched
    pub fn build(path: &Path, options: &ReaderOptions, stream: &AudioStream) -> Result<Self> {
        let started = Instant::now();
        let mut format = probe(path, options)?.format;

        let mut entries = Vec::new();
        let mut byte_position = 0u64;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(e) => match DecodeError::from(e) {
                    DecodeError::EndOfStream => break,
                    other => return Err(other),
                },
            };

            if packet.track_id() != stream.index() {
                continue;
            }

            entries.push(PacketEntry {
                byte_position,
                timestamp: stream.timestamp_to_seconds(packet.ts()),
                ts: packet.ts(),
                duration: stream.timestamp_to_seconds(packet.dur()),
            });
            byte_position += packet.buf().len() as u64;
        }

        let table = Self::from_entries(entries);

        debug!(
            path = %path.display(),
            packets = table.len(),
            duration = table.duration,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "built packet table"
        );

        Ok(table)
    }

    /// Build a table from already-known entries (sorted by timestamp)
    pub fn from_entries(mut entries: Vec<PacketEntry>) -> Self {
        entries.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        let duration = entries
            .last()
            .map(|last| last.timestamp + last.duration)
            .unwrap_or(0.0);

        Self { entries, duration }
    }

    /// Total duration in seconds (0 when the stream had no packets)
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[PacketEntry] {
        &self.entries
    }

    /// The last packet starting at or before `time`
    ///
    /// Times before the first packet resolve to the first packet.
    pub fn closest_packet(&self, time: f64) -> Option<&PacketEntry> {
        let after = self.entries.partition_point(|entry| entry.timestamp <= time);
        self.entries.get(after.saturating_sub(1))
    }

    /// Byte position of the packet that plays at `time`
    pub fn closest_packet_byte_position(&self, time: f64) -> Option<u64> {
        self.closest_packet(time).map(|entry| entry.byte_position)
    }
}
