//! Aural Playback
//!
//! Gapless playback core: sessions, loops, scheduling and the player state
//! machine.
//!
//! This crate provides:
//! - `Player`: play / pause / resume / stop, seek clamping, loop precedence
//!   and loop toggling
//! - `SessionContext`: the current playback session, owned by the player
//! - `Scheduler`: the seam between the player and whatever makes audio audible
//! - `DecodeScheduler`: a scheduler that decodes on a worker thread and hands
//!   sample-accurate buffers to a sink
//!
//! # Architecture
//!
//! The player is single-writer and lock-free. Decoding and file I/O happen on
//! the scheduler's worker; what the worker learns comes back as
//! `SchedulerEvent`s, which the owner thread feeds to
//! `Player::handle_scheduler_event`.
//!
//! # Example: Playing a Loop
//!
//! ```rust,no_run
//! use aural_decode::ReaderOptions;
//! use aural_playback::{DecodeScheduler, Player, SchedulerConfig, Track};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # fn example() -> aural_playback::Result<()> {
//! let options = ReaderOptions::default();
//! let track = Arc::new(Track::probe("/music/song.flac", &options)?);
//!
//! let scheduler = DecodeScheduler::new(SchedulerConfig::default(), options)?;
//! let sink = scheduler.sink();
//! let mut player = Player::new(scheduler);
//!
//! // Loop 20s..40s
//! player.play(track, 20.0, Some(40.0));
//!
//! while let Some(scheduled) = sink.next_timeout(Duration::from_secs(1)) {
//!     // Send scheduled.buffer to the audio device
//!     for event in player.scheduler().drain_events() {
//!         player.handle_scheduler_event(event);
//!     }
//! #   let _ = scheduled;
//! }
//! # Ok(())
//! # }
//! ```

mod config;
mod decode_scheduler;
mod error;
mod player;
mod playback_loop;
mod scheduler;
mod session;
mod types;

pub use config::SchedulerConfig;
pub use decode_scheduler::{BufferSink, DecodeScheduler, ScheduledBuffer};
pub use error::{PlaybackError, Result};
pub use player::Player;
pub use playback_loop::PlaybackLoop;
pub use scheduler::{Scheduler, SchedulerEvent};
pub use session::{PlaybackSession, SessionContext, SessionId};
pub use types::{PlaybackState, SeekResult, Track};
