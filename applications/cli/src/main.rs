//! Aural - probe audio files and drive the gapless playback core

mod config;

use anyhow::Context;
use aural_decode::{FormatContext, FormatSummary};
use aural_playback::{DecodeScheduler, PlaybackState, Player, SchedulerEvent, Track};
use clap::{Parser, Subcommand};
use crate::config::AuralConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long to wait on the sink before checking for events
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Parser)]
#[command(name = "aural")]
#[command(about = "Inspect audio files and run them through the gapless player", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "AURAL_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print streams, tags and chapters of a file
    Probe {
        /// Audio file
        file: PathBuf,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Decode a file through the player, discarding the audio
    Play {
        /// Audio file
        file: PathBuf,
        /// Start position in seconds
        #[arg(short, long, default_value_t = 0.0)]
        start: f64,
        /// Loop end in seconds; loops the range from --start
        #[arg(short, long)]
        end: Option<f64>,
        /// Loop passes before stopping
        #[arg(short, long, default_value_t = 1)]
        loops: u32,
    },
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so `probe --json` output stays clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aural_cli=info,aural_decode=info,aural_playback=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = AuralConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Probe { file, json } => probe(&config, &file, json),
        Commands::Play {
            file,
            start,
            end,
            loops,
        } => play(&config, &file, start, end, loops),
    }
}

fn probe(config: &AuralConfig, file: &Path, json: bool) -> anyhow::Result<()> {
    let context = FormatContext::open(file, &config.reader)?;
    let summary = context.summary();

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    Ok(())
}

fn print_summary(summary: &FormatSummary) {
    println!("File:        {}", summary.path.display());
    println!("Duration:    {:.3}s", summary.duration);
    println!("Sample rate: {} Hz", summary.sample_rate);
    println!("Channels:    {}", summary.channel_count);
    println!("Bit rate:    {} kbps", summary.bit_rate / 1000);
    println!("Size:        {} bytes", summary.file_size);
    println!("Streams:     {}", summary.stream_count);
    if summary.is_raw_audio_file {
        println!("Raw audio:   yes (packet-indexed seeking)");
    }
    if summary.has_cover_art {
        println!("Cover art:   yes");
    }

    if !summary.metadata.is_empty() {
        println!("Tags:");
        for (key, value) in &summary.metadata {
            println!("  {key}: {value}");
        }
    }

    if !summary.chapters.is_empty() {
        println!("Chapters:");
        for chapter in &summary.chapters {
            println!(
                "  {:>3}  {:>9.3}s - {:>9.3}s  {}",
                chapter.index,
                chapter.start_time,
                chapter.end_time,
                chapter.title.as_deref().unwrap_or("")
            );
        }
    }
}

/// Totals for one `play` run
#[derive(Debug, Default)]
struct PlayStats {
    buffers: u64,
    frames: u64,
    seconds: f64,
    peak: f32,
    loop_restarts: u32,
}

fn play(config: &AuralConfig, file: &Path, start: f64, end: Option<f64>, loops: u32) -> anyhow::Result<()> {
    let track = Arc::new(
        Track::probe(file, &config.reader).with_context(|| format!("unable to open {}", file.display()))?,
    );
    tracing::info!(path = %file.display(), duration = track.duration(), "playing");

    let scheduler = DecodeScheduler::new(config.scheduler.clone(), config.reader.clone())?;
    let sink = scheduler.sink();
    let mut player = Player::new(scheduler);
    player.play(Arc::clone(&track), start, end);

    let looping = player.playback_loop().is_some_and(|lp| lp.is_complete());
    let started = Instant::now();
    let mut stats = PlayStats::default();
    let mut failure = None;

    while player.state() != PlaybackState::NoTrack {
        if let Some(scheduled) = sink.next_timeout(POLL_INTERVAL) {
            stats.buffers += 1;
            stats.frames += scheduled.buffer.frame_length() as u64;
            stats.seconds += scheduled.buffer.duration();
            for channel in 0..scheduled.buffer.channel_count() {
                let peak = scheduled.buffer.channel(channel).iter().fold(0.0_f32, |acc, s| acc.max(s.abs()));
                stats.peak = stats.peak.max(peak);
            }
        }

        for event in player.scheduler().drain_events() {
            let current = player.session().is_some_and(|session| session.id() == event.session_id());
            match &event {
                SchedulerEvent::LoopRestarted { .. } if current => stats.loop_restarts += 1,
                SchedulerEvent::PlaybackFailed { reason, .. } if current => failure = Some(reason.clone()),
                _ => {}
            }
            if player.handle_scheduler_event(event).is_some() {
                tracing::info!("track completed");
            }
        }

        if looping && stats.loop_restarts >= loops {
            tracing::info!(passes = stats.loop_restarts, "loop passes done");
            player.stop();
        }
    }

    if let Some(reason) = failure {
        anyhow::bail!("playback failed: {reason}");
    }

    println!("Buffers:       {}", stats.buffers);
    println!("Frames:        {}", stats.frames);
    println!("Audio time:    {:.3}s", stats.seconds);
    println!("Peak:          {:.4}", stats.peak);
    if looping {
        println!("Loop restarts: {}", stats.loop_restarts);
    }
    println!("Wall time:     {:.3}s", started.elapsed().as_secs_f64());

    Ok(())
}
