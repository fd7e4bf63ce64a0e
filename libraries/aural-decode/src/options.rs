//! Reader configuration

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Options controlling how files are opened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderOptions {
    /// Extensions (lowercase, no dot) of raw, containerless audio files.
    ///
    /// Such files carry no reliable duration, so their duration is computed
    /// by scanning every packet, and seeks go through the packet table.
    pub raw_extensions: Vec<String>,

    /// Trim encoder delay and padding where the format reports it
    pub enable_gapless: bool,
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            raw_extensions: ["aac", "adts", "ac3", "eac3", "dts", "mp2", "mpc"]
                .iter()
                .map(|ext| (*ext).to_string())
                .collect(),
            enable_gapless: true,
        }
    }
}

impl ReaderOptions {
    /// Whether the file at `path` should be treated as raw audio
    pub fn is_raw_audio_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| {
                let ext = ext.to_lowercase();
                self.raw_extensions.iter().any(|raw| *raw == ext)
            })
            .unwrap_or(false)
    }

    /// Builder-style override of the raw extension list
    pub fn with_raw_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.raw_extensions = extensions
            .into_iter()
            .map(|ext| ext.into().to_lowercase())
            .collect();
        self
    }
}
