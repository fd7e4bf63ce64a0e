//! Decoding and sample-accurate trimming

mod common;

use aural_decode::{AudioCodec, DecodeError, FormatContext, Frame, PlaybackBuffer, ReaderOptions};
use common::{ramp_value, two_second_wav, SAMPLE_RATE};

fn decode_all(context: &mut FormatContext, codec: &mut AudioCodec) -> Vec<Frame> {
    let stream = codec.stream().clone();
    let mut frames = Vec::new();

    loop {
        match context.read_packet(&stream) {
            Ok(Some(packet)) => {
                codec.send_packet(&packet).unwrap();
                while let Some(frame) = codec.receive_frame() {
                    frames.push(frame);
                }
            }
            Ok(None) => {}
            Err(DecodeError::EndOfStream) => break,
            Err(e) => panic!("decode failed: {e}"),
        }
    }

    frames
}

#[test]
fn test_decodes_every_sample() {
    let (_dir, path) = two_second_wav();
    let mut context = FormatContext::open(&path, &ReaderOptions::default()).unwrap();
    let mut codec = AudioCodec::new(context.audio_stream()).unwrap();

    let frames = decode_all(&mut context, &mut codec);

    let total: usize = frames.iter().map(Frame::sample_count).sum();
    assert_eq!(total, 2 * SAMPLE_RATE as usize);
    assert_eq!(codec.skipped_packets(), 0);

    let first = &frames[0];
    assert_eq!(first.channel_count(), 2);
    assert_eq!(first.timestamp(), 0.0);
    let left = first.channel(0).unwrap();
    let right = first.channel(1).unwrap();
    for i in 0..left.len().min(64) {
        assert!((left[i] - ramp_value(i)).abs() < 1e-6);
        assert!((right[i] + ramp_value(i)).abs() < 1e-6);
    }
}

#[test]
fn test_frames_are_contiguous() {
    let (_dir, path) = two_second_wav();
    let mut context = FormatContext::open(&path, &ReaderOptions::default()).unwrap();
    let mut codec = AudioCodec::new(context.audio_stream()).unwrap();

    let frames = decode_all(&mut context, &mut codec);

    for pair in frames.windows(2) {
        assert!((pair[0].end_timestamp() - pair[1].timestamp()).abs() < 1e-9);
    }
}

#[test]
fn test_seek_then_trim_starts_on_exact_sample() {
    let (_dir, path) = two_second_wav();
    let mut context = FormatContext::open(&path, &ReaderOptions::default()).unwrap();
    let stream = context.audio_stream().clone();
    let mut codec = AudioCodec::new(&stream).unwrap();

    context.seek(&stream, 0.5).unwrap();
    codec.flush();

    let frame = loop {
        if let Some(packet) = context.read_packet(&stream).unwrap() {
            codec.send_packet(&packet).unwrap();
            if let Some(frame) = codec.receive_frame() {
                break frame;
            }
        }
    };
    assert!(frame.timestamp() <= 0.5);

    let skip = frame.samples_until(0.5);
    let trimmed = frame.keep_last_n_samples(frame.sample_count() - skip);

    assert!((trimmed.timestamp() - 0.5).abs() < 1e-9);
    let left = trimmed.channel(0).unwrap();
    assert!((left[0] - ramp_value(4000)).abs() < 1e-6);
}

#[test]
fn test_fill_playback_buffer_from_frames() {
    let (_dir, path) = two_second_wav();
    let mut context = FormatContext::open(&path, &ReaderOptions::default()).unwrap();
    let mut codec = AudioCodec::new(context.audio_stream()).unwrap();
    let frames = decode_all(&mut context, &mut codec);

    let mut buffer = PlaybackBuffer::new(2, SAMPLE_RATE, 1500);
    for frame in &frames {
        if buffer.is_full() {
            break;
        }
        let frame = frame.keep_first_n_samples(buffer.remaining());
        let offset = buffer.frame_length();
        frame.copy_samples(&mut buffer, offset).unwrap();
    }

    assert!(buffer.is_full());
    let left = buffer.channel(0);
    for (i, sample) in left.iter().enumerate() {
        assert!((sample - ramp_value(i)).abs() < 1e-6, "sample {i}");
    }
}
