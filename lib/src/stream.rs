//! The streaming loop.
//!
//! A [`Streamer`] owns the output sink and, while streaming, a dedicated thread
//! that produces one frame per tick and writes it to the sink. The thread takes
//! the sink with it and gives it back when joined, so the sink is only ever
//! touched by one thread at a time.
//!
//! Write failures signaling that the sink is temporarily busy only skip the
//! current frame. Any other write failure ends the thread; the streamer then
//! reports itself as [`StreamState::Stopped`] and the error can be read back
//! with [`Streamer::last_error`].

use std::io;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use enumn::N;
use log::{debug, error, info, trace, warn};
use thiserror::Error;

use crate::frame::{FrameBuffer, FrameGeometry, Pattern, SourceMode};
use crate::framegen::{FrameGenerator, GenerateFrameError};
use crate::queue::{FrameQueue, DEFAULT_QUEUE_CAPACITY};
use crate::sink::{OutputSink, WriteFrameError};

/// Time between two frames, i.e. a nominal 30 frames per second.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// What to do on a tick where the session is fed from the frame queue but the
/// queue is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyQueuePolicy {
    /// Write nothing. The device keeps showing the last frame it received.
    #[default]
    Skip,
    /// Write the generated "waiting for external source" placeholder.
    Placeholder,
}

/// Configuration of a streaming session.
///
/// ```
/// # use std::time::Duration;
/// # use vcam::{EmptyQueuePolicy, FrameGeometry, StreamConfig};
/// let config = StreamConfig::new()
///     .geometry(1280, 720)
///     .frame_interval(Duration::from_millis(40))
///     .empty_queue_policy(EmptyQueuePolicy::Placeholder);
/// assert_eq!(config.geometry, FrameGeometry::new(1280, 720));
/// assert_eq!(config.queue_capacity, 10);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    pub geometry: FrameGeometry,
    pub frame_interval: Duration,
    pub queue_capacity: usize,
    pub empty_queue_policy: EmptyQueuePolicy,
}

impl Default for StreamConfig {
    fn default() -> Self {
        StreamConfig {
            geometry: FrameGeometry::default(),
            frame_interval: DEFAULT_FRAME_INTERVAL,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            empty_queue_policy: EmptyQueuePolicy::default(),
        }
    }
}

impl StreamConfig {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn geometry(self, width: u32, height: u32) -> Self {
        StreamConfig {
            geometry: FrameGeometry::new(width, height),
            ..self
        }
    }

    pub fn frame_interval(self, frame_interval: Duration) -> Self {
        StreamConfig {
            frame_interval,
            ..self
        }
    }

    pub fn queue_capacity(self, queue_capacity: usize) -> Self {
        StreamConfig {
            queue_capacity,
            ..self
        }
    }

    pub fn empty_queue_policy(self, empty_queue_policy: EmptyQueuePolicy) -> Self {
        StreamConfig {
            empty_queue_policy,
            ..self
        }
    }
}

/// Lifecycle of the streaming loop.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, N)]
pub enum StreamState {
    NotStarted = 0,
    Running = 1,
    Stopping = 2,
    Stopped = 3,
}

/// Errors that ended a streaming loop without it being asked to stop.
#[derive(Debug, Clone, Error)]
pub enum StreamError {
    #[error("fatal error while writing frame {frame}: {error}")]
    FatalWrite { frame: u64, error: Arc<io::Error> },
    #[error("error while generating frame: {0}")]
    Generate(#[from] GenerateFrameError),
    #[error("streaming thread panicked")]
    Panicked,
}

#[derive(Debug, Error)]
pub enum StartError {
    #[error("output device is not available")]
    DeviceUnavailable,
    #[error("cannot spawn streaming thread: {0}")]
    Spawn(io::Error),
}

/// Counters of a streaming session, reset when it starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Ticks elapsed since the start of the session.
    pub frame_count: u64,
    /// Frames fully written to the sink.
    pub frames_written: u64,
    /// Ticks where nothing was written, because the frame queue was empty or
    /// the sink was busy.
    pub ticks_skipped: u64,
    /// Writes where the sink took less than a whole frame.
    pub partial_writes: u64,
    /// External frames dropped because the queue was full.
    pub frames_evicted: u64,
}

/// State shared between a [`Streamer`] and its thread.
#[derive(Default)]
struct Shared {
    state: AtomicU8,
    frame_counter: AtomicU64,
    frames_written: AtomicU64,
    ticks_skipped: AtomicU64,
    partial_writes: AtomicU64,
    last_error: Mutex<Option<StreamError>>,
}

impl Shared {
    fn state(&self) -> StreamState {
        // Only valid values are ever stored.
        StreamState::n(self.state.load(Ordering::SeqCst)).unwrap_or(StreamState::Stopped)
    }

    fn set_state(&self, state: StreamState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    fn is_running(&self) -> bool {
        self.state() == StreamState::Running
    }

    fn set_last_error(&self, error: Option<StreamError>) {
        *self.last_error.lock().unwrap_or_else(|e| e.into_inner()) = error;
    }

    fn last_error(&self) -> Option<StreamError> {
        self.last_error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn reset_counters(&self) {
        self.frame_counter.store(0, Ordering::SeqCst);
        self.frames_written.store(0, Ordering::Relaxed);
        self.ticks_skipped.store(0, Ordering::Relaxed);
        self.partial_writes.store(0, Ordering::Relaxed);
    }
}

/// The streaming thread, returned to the [`Streamer`] once joined.
struct StreamThread<S: OutputSink> {
    sink: S,
    generator: FrameGenerator,
    source: SourceMode,
    empty_queue_policy: EmptyQueuePolicy,
    frame_interval: Duration,
    // Reused for every generated frame.
    frame: FrameBuffer,
    queue: Arc<FrameQueue>,
    shared: Arc<Shared>,
    start_time: Instant,
    exit_error: Option<StreamError>,
}

impl<S: OutputSink> StreamThread<S> {
    fn run(mut self) -> Self {
        debug!("Streaming thread started");

        while self.shared.is_running() {
            let tick_start = Instant::now();

            if let Err(e) = self.tick() {
                error!("Streaming stopped: {}", e);
                self.shared.set_last_error(Some(e.clone()));
                self.exit_error = Some(e);
                self.queue.set_accepting(false);
                self.shared.set_state(StreamState::Stopped);
                break;
            }

            self.wait_until(tick_start + self.frame_interval);
        }

        debug!("Streaming thread stopped");
        self
    }

    /// Sleep until `deadline`, or until the streamer asks us to stop.
    fn wait_until(&self, deadline: Instant) {
        loop {
            let now = Instant::now();
            if now >= deadline || !self.shared.is_running() {
                break;
            }
            thread::park_timeout(deadline - now);
        }
    }

    fn tick(&mut self) -> Result<(), StreamError> {
        let frame_index = self.shared.frame_counter.load(Ordering::SeqCst);
        let elapsed = self.start_time.elapsed();

        let popped;
        let frame = match self.source {
            SourceMode::Generator => {
                self.generator.fill(&mut self.frame, frame_index, elapsed)?;
                Some(self.frame.as_ref())
            }
            SourceMode::Queue => {
                popped = self.queue.pop_if_available();
                match (&popped, self.empty_queue_policy) {
                    (Some(frame), _) => Some(frame.as_ref()),
                    (None, EmptyQueuePolicy::Skip) => None,
                    (None, EmptyQueuePolicy::Placeholder) => {
                        self.generator.fill(&mut self.frame, frame_index, elapsed)?;
                        Some(self.frame.as_ref())
                    }
                }
            }
        };

        match frame {
            Some(frame) => Self::deliver(&mut self.sink, &self.shared, frame, frame_index)?,
            None => {
                trace!("No external frame available for frame {}", frame_index);
                self.shared.ticks_skipped.fetch_add(1, Ordering::Relaxed);
            }
        }

        self.shared.frame_counter.fetch_add(1, Ordering::SeqCst);

        Ok(())
    }

    fn deliver(
        sink: &mut S,
        shared: &Shared,
        frame: &[u8],
        frame_index: u64,
    ) -> Result<(), StreamError> {
        match sink.write_frame(frame) {
            Ok(written) if written == frame.len() => {
                shared.frames_written.fetch_add(1, Ordering::Relaxed);
            }
            Ok(written) => {
                warn!(
                    "Partial write of frame {}: {}/{} bytes",
                    frame_index,
                    written,
                    frame.len()
                );
                shared.partial_writes.fetch_add(1, Ordering::Relaxed);
            }
            Err(WriteFrameError::TryAgain) => {
                trace!("Sink busy, skipping frame {}", frame_index);
                shared.ticks_skipped.fetch_add(1, Ordering::Relaxed);
            }
            Err(WriteFrameError::Fatal(e)) => {
                return Err(StreamError::FatalWrite {
                    frame: frame_index,
                    error: Arc::new(e),
                })
            }
        }

        Ok(())
    }
}

/// Read-only view of a [`Streamer`].
///
/// Queries never wait for the streamer, even while it is busy stopping.
#[derive(Clone)]
pub struct StreamMonitor {
    shared: Arc<Shared>,
    queue: Arc<FrameQueue>,
}

impl StreamMonitor {
    pub fn state(&self) -> StreamState {
        self.shared.state()
    }

    /// Number of ticks since the session started.
    pub fn frame_count(&self) -> u64 {
        self.shared.frame_counter.load(Ordering::SeqCst)
    }

    /// The error that terminated the last session, if any.
    pub fn last_error(&self) -> Option<StreamError> {
        self.shared.last_error()
    }

    pub fn stats(&self) -> StreamStats {
        StreamStats {
            frame_count: self.frame_count(),
            frames_written: self.shared.frames_written.load(Ordering::Relaxed),
            ticks_skipped: self.shared.ticks_skipped.load(Ordering::Relaxed),
            partial_writes: self.shared.partial_writes.load(Ordering::Relaxed),
            frames_evicted: self.queue.evicted(),
        }
    }
}

/// Controls the streaming loop of one output sink.
pub struct Streamer<S: OutputSink> {
    config: StreamConfig,
    // Present while no thread is running, unless it has been lost or released.
    sink: Option<S>,
    handle: Option<JoinHandle<StreamThread<S>>>,
    monitor: StreamMonitor,
}

impl<S: OutputSink> Streamer<S> {
    pub fn new(sink: S, config: StreamConfig) -> Self {
        let shared = Shared::default();
        shared.set_state(StreamState::NotStarted);

        Streamer {
            monitor: StreamMonitor {
                shared: Arc::new(shared),
                queue: Arc::new(FrameQueue::new(config.geometry, config.queue_capacity)),
            },
            config,
            sink: Some(sink),
            handle: None,
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// The queue external frames must be pushed into.
    pub fn queue(&self) -> &Arc<FrameQueue> {
        &self.monitor.queue
    }

    /// A handle to query the state of this streamer from other threads.
    pub fn monitor(&self) -> &StreamMonitor {
        &self.monitor
    }

    pub fn state(&self) -> StreamState {
        self.monitor.state()
    }

    /// Whether a sink is available to start streaming with.
    pub fn has_sink(&self) -> bool {
        self.sink.is_some() || self.handle.is_some()
    }

    pub fn frame_count(&self) -> u64 {
        self.monitor.frame_count()
    }

    pub fn last_error(&self) -> Option<StreamError> {
        self.monitor.last_error()
    }

    pub fn stats(&self) -> StreamStats {
        self.monitor.stats()
    }

    /// Start streaming `pattern`. Does nothing if already streaming.
    pub fn start(&mut self, pattern: Pattern) -> Result<(), StartError> {
        if self.monitor.shared.is_running() {
            debug!("Streaming already active");
            return Ok(());
        }

        // The previous thread may have ended on its own. Its error has already
        // been recorded, we just want the sink back.
        if self.handle.is_some() {
            if let Err(e) = self.reap() {
                debug!("Previous stream had terminated with an error: {}", e);
            }
        }

        let sink = self.sink.take().ok_or(StartError::DeviceUnavailable)?;
        let source = pattern.source_mode();
        let geometry = self.config.geometry;

        info!(
            "Starting {} stream at {} ({} ms per frame)",
            pattern,
            geometry,
            self.config.frame_interval.as_millis()
        );

        self.monitor.shared.reset_counters();
        self.monitor.shared.set_last_error(None);
        self.monitor.queue.clear();
        self.monitor.queue.reset_stats();
        self.monitor.queue.set_accepting(source == SourceMode::Queue);
        self.monitor.shared.set_state(StreamState::Running);

        let stream_thread = StreamThread {
            sink,
            generator: FrameGenerator::new(geometry, pattern),
            source,
            empty_queue_policy: self.config.empty_queue_policy,
            frame_interval: self.config.frame_interval,
            frame: FrameBuffer::new(geometry),
            queue: Arc::clone(&self.monitor.queue),
            shared: Arc::clone(&self.monitor.shared),
            start_time: Instant::now(),
            exit_error: None,
        };

        match thread::Builder::new()
            .name("vcam streamer".into())
            .spawn(move || stream_thread.run())
        {
            Ok(handle) => {
                self.handle = Some(handle);
                Ok(())
            }
            Err(e) => {
                error!("Cannot spawn streaming thread: {}", e);
                self.monitor.queue.set_accepting(false);
                self.monitor.shared.set_state(StreamState::Stopped);
                Err(StartError::Spawn(e))
            }
        }
    }

    /// Stop streaming and wait for the streaming thread to exit.
    ///
    /// Once this returns, the sink and the frame queue are not touched anymore
    /// until the next call to [`Streamer::start`], and the queue is empty.
    /// If the thread had already ended because of an error, that error is
    /// returned. Stopping an idle streamer does nothing.
    pub fn stop(&mut self) -> Result<(), StreamError> {
        if self.monitor.shared.is_running() {
            info!("Stopping stream");
            self.monitor.shared.set_state(StreamState::Stopping);
        }
        self.monitor.queue.set_accepting(false);

        let res = match self.handle {
            Some(_) => self.reap(),
            None => Ok(()),
        };

        self.monitor.queue.clear();
        if self.state() != StreamState::NotStarted {
            self.monitor.shared.set_state(StreamState::Stopped);
        }

        res
    }

    /// Join the streaming thread and take the sink back.
    fn reap(&mut self) -> Result<(), StreamError> {
        let handle = match self.handle.take() {
            Some(handle) => handle,
            None => return Ok(()),
        };
        handle.thread().unpark();

        match handle.join() {
            Ok(stream_thread) => {
                // The frame generator is dropped here, only the sink survives.
                let StreamThread {
                    sink, exit_error, ..
                } = stream_thread;
                self.sink = Some(sink);
                exit_error.map_or(Ok(()), Err)
            }
            Err(_) => {
                error!("Streaming thread panicked, output device lost");
                self.monitor.shared.set_last_error(Some(StreamError::Panicked));
                self.monitor.shared.set_state(StreamState::Stopped);
                Err(StreamError::Panicked)
            }
        }
    }

    /// Stop streaming and give up the sink. Streaming cannot be started again
    /// afterwards.
    pub fn release(&mut self) -> Option<S> {
        if let Err(e) = self.stop() {
            warn!("Stream had terminated with an error: {}", e);
        }
        self.sink.take()
    }
}

impl<S: OutputSink> Drop for Streamer<S> {
    fn drop(&mut self) {
        if self.handle.is_some() {
            if let Err(e) = self.stop() {
                warn!("Stream had terminated with an error: {}", e);
            }
        }
    }
}
