//! Decode scheduler
//!
//! Production [`Scheduler`]: decodes the session's track on a dedicated
//! worker thread and hands finished [`ScheduledBuffer`]s to a sink.
//!
//! ## Architecture
//!
//! ```text
//! Owner thread                 Decode worker                    Sink
//!      │                             │                            │
//!      │  Command (crossbeam)        │                            │
//!      │────────────────────────────>│ FormatContext::seek        │
//!      │                             │ AudioCodec decode/trim     │
//!      │                             │  ScheduledBuffer (bounded) │
//!      │                             │───────────────────────────>│
//!      │  SchedulerEvent             │                            │
//!      │<────────────────────────────│                            │
//! ```
//!
//! Every repositioning command (play, loop, seek, stop) starts a new epoch.
//! Buffers carry the epoch they were decoded for, and the sink silently drops
//! any buffer from an older epoch, so audio queued before a seek is never heard.

use crate::config::SchedulerConfig;
use crate::error::{PlaybackError, Result};
use crate::scheduler::{Scheduler, SchedulerEvent};
use crate::session::{PlaybackSession, SessionId};
use aural_decode::{
    AudioCodec, AudioStream, DecodeError, FormatContext, Frame, PlaybackBuffer, ReaderOptions,
};
use crossbeam_channel::{
    bounded, unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError,
};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// How long the worker waits on a full sink before re-checking commands
const BACKPRESSURE_POLL: Duration = Duration::from_millis(10);

/// Decoded audio for one session, ready for output
#[derive(Debug, Clone)]
pub struct ScheduledBuffer {
    /// Session the audio was decoded for
    pub session_id: SessionId,
    /// Track time of the buffer's first sample, in seconds
    pub start_time: f64,
    pub buffer: PlaybackBuffer,
    epoch: u64,
}

impl ScheduledBuffer {
    /// Track time just past the buffer's last sample
    pub fn end_time(&self) -> f64 {
        self.start_time + self.buffer.duration()
    }
}

/// State shared between the owner, the worker and sinks
#[derive(Debug, Default)]
struct Shared {
    epoch: AtomicU64,
    position_bits: AtomicU64,
    paused: AtomicBool,
}

impl Shared {
    fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    fn next_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn position(&self) -> f64 {
        f64::from_bits(self.position_bits.load(Ordering::Acquire))
    }

    fn set_position(&self, position: f64) {
        self.position_bits.store(position.to_bits(), Ordering::Release);
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
    }
}

/// Receiving end for scheduled audio
///
/// Cheap to clone. Taking a buffer advances the scheduler's seek position.
#[derive(Debug, Clone)]
pub struct BufferSink {
    buffer_rx: Receiver<ScheduledBuffer>,
    shared: Arc<Shared>,
}

impl BufferSink {
    /// Take the next buffer if one is ready
    ///
    /// Returns `None` while paused.
    pub fn try_next(&self) -> Option<ScheduledBuffer> {
        if self.shared.is_paused() {
            return None;
        }

        loop {
            match self.buffer_rx.try_recv() {
                Ok(buffer) => {
                    if let Some(buffer) = self.accept(buffer) {
                        return Some(buffer);
                    }
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return None,
            }
        }
    }

    /// Wait up to `timeout` for the next buffer
    ///
    /// Returns `None` on timeout, while paused, or once the scheduler is gone.
    pub fn next_timeout(&self, timeout: Duration) -> Option<ScheduledBuffer> {
        if self.shared.is_paused() {
            return None;
        }

        let deadline = Instant::now() + timeout;
        loop {
            match self.buffer_rx.recv_deadline(deadline) {
                Ok(buffer) => {
                    if let Some(buffer) = self.accept(buffer) {
                        return Some(buffer);
                    }
                }
                Err(_) => return None,
            }
        }
    }

    /// Whether no buffer is waiting
    pub fn is_empty(&self) -> bool {
        self.buffer_rx.is_empty()
    }

    fn accept(&self, buffer: ScheduledBuffer) -> Option<ScheduledBuffer> {
        if buffer.epoch != self.shared.epoch() {
            return None;
        }
        self.shared.set_position(buffer.start_time);
        Some(buffer)
    }
}

enum Command {
    /// Play (or seek within) the session from `start_time`
    Schedule {
        session: PlaybackSession,
        start_time: f64,
        begin_immediately: bool,
        epoch: u64,
    },
    /// Carry on from the current position under an unlooped session
    EndLoop { session: PlaybackSession },
    /// Output resumed; releases completion held while paused at the end
    Resume,
    Stop,
    Shutdown,
}

/// [`Scheduler`] that decodes on a background thread
pub struct DecodeScheduler {
    command_tx: Sender<Command>,
    event_rx: Receiver<SchedulerEvent>,
    sink: BufferSink,
    shared: Arc<Shared>,
    thread_handle: Option<JoinHandle<()>>,
}

impl DecodeScheduler {
    /// Spawn the decode worker
    pub fn new(config: SchedulerConfig, options: ReaderOptions) -> Result<Self> {
        config.validate()?;

        let (command_tx, command_rx) = unbounded::<Command>();
        let (buffer_tx, buffer_rx) = bounded::<ScheduledBuffer>(config.queue_depth);
        let (event_tx, event_rx) = unbounded::<SchedulerEvent>();
        let shared = Arc::new(Shared::default());

        let worker = DecodeWorker {
            buffer_frames: config.buffer_frames,
            options,
            command_rx,
            buffer_tx,
            event_tx,
            active: None,
            parked_at_end: None,
        };

        let thread_handle = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || worker.run())
            .map_err(|e| PlaybackError::SchedulerUnavailable(format!("Failed to spawn decode worker: {}", e)))?;

        info!(
            thread = %config.thread_name,
            buffer_frames = config.buffer_frames,
            queue_depth = config.queue_depth,
            "decode scheduler started"
        );

        Ok(Self {
            command_tx,
            event_rx,
            sink: BufferSink {
                buffer_rx,
                shared: Arc::clone(&shared),
            },
            shared,
            thread_handle: Some(thread_handle),
        })
    }

    /// Handle for the output side
    pub fn sink(&self) -> BufferSink {
        self.sink.clone()
    }

    /// Take every event reported since the last call
    pub fn drain_events(&self) -> Vec<SchedulerEvent> {
        self.event_rx.try_iter().collect()
    }

    /// Wait up to `timeout` for the next event
    pub fn next_event(&self, timeout: Duration) -> Option<SchedulerEvent> {
        match self.event_rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    fn schedule(&mut self, session: &PlaybackSession, start_time: f64, begin_immediately: bool) {
        let start_time = start_time.max(0.0);
        let epoch = self.shared.next_epoch();
        self.shared.set_position(start_time);
        self.shared.set_paused(!begin_immediately);

        self.send(Command::Schedule {
            session: session.clone(),
            start_time,
            begin_immediately,
            epoch,
        });
    }

    fn send(&self, command: Command) {
        if self.command_tx.send(command).is_err() {
            error!("decode worker is gone, command dropped");
        }
    }
}

impl Scheduler for DecodeScheduler {
    fn play_track(&mut self, session: &PlaybackSession, start_position: f64, begin_immediately: bool) {
        debug!(session = %session.id(), start_position, begin_immediately, "play track");
        self.schedule(session, start_position, begin_immediately);
    }

    fn play_loop(&mut self, session: &PlaybackSession, start_time: f64, begin_immediately: bool) {
        debug!(session = %session.id(), start_time, loop_end = ?session.loop_end(), "play loop");
        self.schedule(session, start_time, begin_immediately);
    }

    fn end_loop(&mut self, session: &PlaybackSession, loop_end_time: f64) {
        debug!(session = %session.id(), loop_end_time, "end loop");
        self.send(Command::EndLoop {
            session: session.clone(),
        });
    }

    fn seek_to_time(&mut self, session: &PlaybackSession, time: f64, begin_immediately: bool) {
        debug!(session = %session.id(), time, "seek");
        self.schedule(session, time, begin_immediately);
    }

    fn pause(&mut self) {
        self.shared.set_paused(true);
    }

    fn resume(&mut self) {
        self.shared.set_paused(false);
        self.send(Command::Resume);
    }

    fn stop(&mut self) {
        self.shared.next_epoch();
        self.shared.set_position(0.0);
        self.shared.set_paused(false);
        self.send(Command::Stop);
    }

    fn seek_position(&self) -> f64 {
        self.shared.position()
    }
}

impl Drop for DecodeScheduler {
    fn drop(&mut self) {
        self.shared.next_epoch();
        let _ = self.command_tx.send(Command::Shutdown);

        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                error!("decode worker panicked");
            }
        }
    }
}

impl std::fmt::Debug for DecodeScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeScheduler")
            .field("epoch", &self.shared.epoch())
            .field("position", &self.shared.position())
            .field("paused", &self.shared.is_paused())
            .finish_non_exhaustive()
    }
}

// ===== Worker =====

/// What stopped a buffer from filling up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    None,
    LoopEnd,
    EndOfTrack,
}

/// The open file and decode position for the current session
struct ActivePlayback {
    session: PlaybackSession,
    epoch: u64,
    context: FormatContext,
    stream: AudioStream,
    codec: AudioCodec,
    /// Track time of the next sample to schedule
    position: f64,
    /// Tail of a frame that did not fit in the previous buffer
    pending: Option<Frame>,
    /// Samples scheduled since the last (re)start, to catch empty loops
    samples_since_restart: usize,
}

impl ActivePlayback {
    fn open(session: PlaybackSession, epoch: u64, options: &ReaderOptions) -> std::result::Result<Self, DecodeError> {
        let track = session.track();
        let context = FormatContext::open_with_packet_table(track.path(), options, track.packet_table())?;
        let stream = context.audio_stream().clone();
        let codec = AudioCodec::new(&stream)?;

        track.set_duration(context.duration());
        if let Some(table) = context.shared_packet_table() {
            track.set_packet_table(table);
        }

        Ok(Self {
            session,
            epoch,
            context,
            stream,
            codec,
            position: 0.0,
            pending: None,
            samples_since_restart: 0,
        })
    }

    fn reposition(&mut self, time: f64) -> std::result::Result<(), DecodeError> {
        self.context.seek(&self.stream, time)?;
        self.codec.flush();
        self.pending = None;
        self.position = time;
        self.samples_since_restart = 0;
        Ok(())
    }

    fn next_frame(&mut self) -> std::result::Result<Option<Frame>, DecodeError> {
        if let Some(frame) = self.pending.take() {
            return Ok(Some(frame));
        }

        loop {
            if let Some(frame) = self.codec.receive_frame() {
                return Ok(Some(frame));
            }

            match self.context.read_packet(&self.stream) {
                Ok(Some(packet)) => self.codec.send_packet(&packet)?,
                Ok(None) => {}
                Err(e) if e.is_end_of_stream() => return Ok(None),
                Err(e) => return Err(e),
            }
        }
    }

    /// Decode up to `capacity` samples per channel from the current position
    fn fill(&mut self, capacity: usize) -> std::result::Result<(Option<ScheduledBuffer>, Boundary), DecodeError> {
        let mut buffer = PlaybackBuffer::new(self.stream.channel_count(), self.stream.sample_rate(), capacity);
        let start_time = self.position;
        let loop_end = self.session.loop_end();
        let mut boundary = Boundary::None;

        while !buffer.is_full() {
            let Some(frame) = self.next_frame()? else {
                boundary = Boundary::EndOfTrack;
                break;
            };

            // Drop samples before the position (first frame after a seek)
            let skip = frame.samples_until(self.position);
            let frame = frame.keep_last_n_samples(frame.sample_count() - skip);
            if frame.is_empty() {
                continue;
            }

            // Split at the loop end; the part beyond it is only heard if the loop is ended
            let (frame, beyond_loop_end) = match loop_end {
                Some(end) => {
                    let kept = frame.keep_first_n_samples(frame.samples_until(end));
                    let half_sample = 0.5 / f64::from(kept.sample_rate().max(1));
                    let beyond = (kept.end_timestamp() >= end - half_sample)
                        .then(|| frame.keep_last_n_samples(frame.sample_count() - kept.sample_count()));
                    (kept, beyond)
                }
                None => (frame, None),
            };

            let fits = frame.keep_first_n_samples(buffer.remaining());
            let offset = buffer.frame_length();
            fits.copy_samples(&mut buffer, offset)?;
            let split = fits.sample_count() < frame.sample_count();
            if split {
                self.pending = Some(frame.keep_last_n_samples(frame.sample_count() - fits.sample_count()));
            }

            if !fits.is_empty() {
                self.position = fits.end_timestamp();
                self.samples_since_restart += fits.sample_count();
            }

            if let Some(beyond) = beyond_loop_end.filter(|_| !split) {
                self.pending = (!beyond.is_empty()).then_some(beyond);
                boundary = Boundary::LoopEnd;
                break;
            }
        }

        let scheduled = (!buffer.is_empty()).then(|| ScheduledBuffer {
            session_id: self.session.id(),
            start_time,
            buffer,
            epoch: self.epoch,
        });

        Ok((scheduled, boundary))
    }
}

struct DecodeWorker {
    buffer_frames: usize,
    options: ReaderOptions,
    command_rx: Receiver<Command>,
    buffer_tx: Sender<ScheduledBuffer>,
    event_tx: Sender<SchedulerEvent>,
    active: Option<ActivePlayback>,
    /// Session that was scheduled past its end while paused
    parked_at_end: Option<SessionId>,
}

impl DecodeWorker {
    fn run(mut self) {
        debug!("decode worker started");

        loop {
            // Commands first, so a seek never waits behind decoding
            loop {
                match self.command_rx.try_recv() {
                    Ok(command) => {
                        if !self.handle_command(command) {
                            debug!("decode worker shutting down");
                            return;
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => return,
                }
            }

            if self.active.is_none() {
                // Idle: block until there is something to do
                match self.command_rx.recv() {
                    Ok(command) => {
                        if !self.handle_command(command) {
                            debug!("decode worker shutting down");
                            return;
                        }
                    }
                    Err(_) => return,
                }
                continue;
            }

            if !self.step() {
                return;
            }
        }
    }

    /// Apply a command. Returns false when the worker should exit.
    fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Schedule {
                session,
                start_time,
                begin_immediately,
                epoch,
            } => {
                self.parked_at_end = None;
                self.schedule(session, start_time, begin_immediately, epoch);
            }
            Command::EndLoop { session } => match self.active.as_mut() {
                Some(active) => {
                    debug!(from = %active.session.id(), to = %session.id(), position = active.position, "loop ended");
                    active.session = session;
                }
                None => debug!(session = %session.id(), "end loop ignored: nothing playing"),
            },
            Command::Resume => {
                if let Some(session_id) = self.parked_at_end.take() {
                    debug!(session = %session_id, "resumed at end of track");
                    self.emit(SchedulerEvent::TrackCompleted { session_id });
                }
            }
            Command::Stop => {
                self.parked_at_end = None;
                if let Some(mut active) = self.active.take() {
                    active.context.destroy();
                    debug!(session = %active.session.id(), "stopped");
                }
            }
            Command::Shutdown => return false,
        }
        true
    }

    fn schedule(&mut self, session: PlaybackSession, start_time: f64, begin_immediately: bool, epoch: u64) {
        let session_id = session.id();

        // Same file: keep the open context and just reposition
        let reuse = self
            .active
            .as_ref()
            .is_some_and(|active| active.session.track() == session.track() && !active.context.is_destroyed());

        if !reuse {
            self.active = None;
            match ActivePlayback::open(session.clone(), epoch, &self.options) {
                Ok(active) => self.active = Some(active),
                Err(e) => {
                    warn!(session = %session_id, error = %e, "unable to open track");
                    self.emit(SchedulerEvent::PlaybackFailed {
                        session_id,
                        reason: e.to_string(),
                    });
                    return;
                }
            }
        }

        let Some(active) = self.active.as_mut() else {
            return;
        };
        active.session = session;
        active.epoch = epoch;

        let needs_seek = reuse || start_time > 0.0;
        let result = if needs_seek {
            active.reposition(start_time)
        } else {
            Ok(())
        };

        match result {
            Ok(()) => debug!(session = %session_id, start_time, reused = reuse, "scheduled"),
            Err(DecodeError::SeekOutOfRange { .. }) => {
                self.active = None;
                if begin_immediately {
                    debug!(session = %session_id, start_time, "start is past the end of the track");
                    self.emit(SchedulerEvent::TrackCompleted { session_id });
                } else {
                    // Paused at the end: completion waits for resume
                    debug!(session = %session_id, start_time, "parked at end of track");
                    self.parked_at_end = Some(session_id);
                }
            }
            Err(e) => {
                warn!(session = %session_id, start_time, error = %e, "unable to seek");
                self.active = None;
                self.emit(SchedulerEvent::PlaybackFailed {
                    session_id,
                    reason: e.to_string(),
                });
            }
        }
    }

    /// Decode and deliver one buffer. Returns false when the worker should exit.
    fn step(&mut self) -> bool {
        let Some(active) = self.active.as_mut() else {
            return true;
        };

        let session_id = active.session.id();
        let epoch = active.epoch;

        let (scheduled, boundary) = match active.fill(self.buffer_frames) {
            Ok(filled) => filled,
            Err(e) => {
                error!(session = %session_id, error = %e, "decode failed");
                self.active = None;
                self.emit(SchedulerEvent::PlaybackFailed {
                    session_id,
                    reason: e.to_string(),
                });
                return true;
            }
        };

        if let Some(buffer) = scheduled {
            if !self.deliver(buffer) {
                return false;
            }
        }

        // A command handled while waiting on the sink may have replaced playback
        if !self.active.as_ref().is_some_and(|active| active.epoch == epoch) {
            return true;
        }

        match boundary {
            Boundary::None => {}
            Boundary::LoopEnd | Boundary::EndOfTrack => self.reach_end(boundary),
        }

        true
    }

    fn reach_end(&mut self, boundary: Boundary) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        let session_id = active.session.id();

        let Some(playback_loop) = active.session.playback_loop().filter(|lp| lp.is_complete()) else {
            if boundary == Boundary::LoopEnd {
                // Loop ended while this buffer was waiting: play on
                return;
            }
            debug!(session = %session_id, "end of track");
            self.active = None;
            self.emit(SchedulerEvent::TrackCompleted { session_id });
            return;
        };

        if active.samples_since_restart == 0 {
            warn!(session = %session_id, ?boundary, "loop produced no audio");
            self.active = None;
            self.emit(SchedulerEvent::PlaybackFailed {
                session_id,
                reason: "loop region contains no audio".to_string(),
            });
            return;
        }

        let loop_start = playback_loop.start_time();
        match active.reposition(loop_start) {
            Ok(()) => {
                debug!(session = %session_id, loop_start, "loop restarted");
                self.emit(SchedulerEvent::LoopRestarted { session_id, loop_start });
            }
            Err(e) => {
                warn!(session = %session_id, loop_start, error = %e, "unable to restart loop");
                self.active = None;
                self.emit(SchedulerEvent::PlaybackFailed {
                    session_id,
                    reason: e.to_string(),
                });
            }
        }
    }

    /// Hand a buffer to the sink, handling commands while it is full
    ///
    /// Returns false when the worker should exit.
    fn deliver(&mut self, buffer: ScheduledBuffer) -> bool {
        let mut item = buffer;

        loop {
            match self.buffer_tx.try_send(item) {
                Ok(()) => return true,
                Err(TrySendError::Full(returned)) => {
                    item = returned;

                    match self.command_rx.recv_timeout(BACKPRESSURE_POLL) {
                        Ok(command) => {
                            if !self.handle_command(command) {
                                return false;
                            }
                            if !self.active.as_ref().is_some_and(|active| active.epoch == item.epoch) {
                                // Superseded while waiting: drop the stale buffer
                                return true;
                            }
                        }
                        Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => return false,
                    }
                }
                Err(TrySendError::Disconnected(_)) => {
                    debug!("sink gone, dropping playback");
                    self.active = None;
                    return true;
                }
            }
        }
    }

    fn emit(&self, event: SchedulerEvent) {
        if self.event_tx.send(event).is_err() {
            debug!("scheduler gone, event dropped");
        }
    }
}
