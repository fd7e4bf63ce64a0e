//! Shared fixtures for decode tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const SAMPLE_RATE: u32 = 8000;

/// Value of the ramp at frame `i`, as written to the left channel
pub fn ramp_sample(i: usize) -> i16 {
    ((i % 997) as i16) * 16
}

/// Expected decoded `f32` for frame `i` of the left channel
pub fn ramp_value(i: usize) -> f32 {
    ramp_sample(i) as f32 / 32768.0
}

/// Write a stereo 16-bit WAV whose left channel is a ramp and right channel its negation
pub fn create_ramp_wav(path: &Path, frames: usize) -> std::io::Result<()> {
    use hound::{WavSpec, WavWriter};

    let spec = WavSpec {
        channels: 2,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec).map_err(std::io::Error::other)?;
    for i in 0..frames {
        writer.write_sample(ramp_sample(i)).map_err(std::io::Error::other)?;
        writer.write_sample(-ramp_sample(i)).map_err(std::io::Error::other)?;
    }
    writer.finalize().map_err(std::io::Error::other)?;

    Ok(())
}

/// A two second ramp WAV in a fresh temp dir
pub fn two_second_wav() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ramp.wav");
    create_ramp_wav(&path, 2 * SAMPLE_RATE as usize).unwrap();
    (dir, path)
}
