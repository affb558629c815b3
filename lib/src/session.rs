//! The virtual camera session host applications drive.
//!
//! A [`VirtualCamera`] is created once per output device and can be shared
//! between threads: lifecycle calls may come from a UI thread while another
//! thread pushes frames decoded from a network stream.
//!
//! ```no_run
//! use vcam::{Pattern, StreamConfig, VirtualCamera};
//!
//! let camera = VirtualCamera::initialize("/dev/video42", StreamConfig::new())?;
//! camera.start(Pattern::ColorBars)?;
//! std::thread::sleep(std::time::Duration::from_secs(5));
//! camera.stop()?;
//! camera.shutdown();
//! # Ok::<(), anyhow::Error>(())
//! ```

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, info, warn};

use crate::frame::FrameGeometry;
use crate::queue::{FrameQueue, PushFrameError};
use crate::sink::{OpenSinkError, OutputSink, V4l2Sink};
use crate::stream::{
    StartError, StreamConfig, StreamError, StreamMonitor, StreamState, StreamStats, Streamer,
};
use crate::Pattern;

/// A virtual camera streaming frames to an output sink.
///
/// Lifecycle operations are serialized, so that concurrent `start` and `stop`
/// calls never interleave. Status queries and [`VirtualCamera::push_frame`]
/// never wait for them.
pub struct VirtualCamera<S: OutputSink = V4l2Sink> {
    streamer: Mutex<Streamer<S>>,
    monitor: StreamMonitor,
    queue: Arc<FrameQueue>,
    config: StreamConfig,
}

impl VirtualCamera<V4l2Sink> {
    /// Open and configure the V4L2 output node at `path`.
    ///
    /// No frame is written until [`VirtualCamera::start`] is called.
    pub fn initialize<P: AsRef<Path>>(
        path: P,
        config: StreamConfig,
    ) -> Result<Self, OpenSinkError> {
        let sink = V4l2Sink::open(path.as_ref(), config.geometry)?;
        Ok(Self::with_sink(sink, config))
    }
}

impl<S: OutputSink> VirtualCamera<S> {
    /// Create a camera writing to an already opened sink.
    pub fn with_sink(sink: S, config: StreamConfig) -> Self {
        let streamer = Streamer::new(sink, config.clone());
        debug!("Virtual camera ready, {} frames", config.geometry);

        VirtualCamera {
            monitor: streamer.monitor().clone(),
            queue: Arc::clone(streamer.queue()),
            streamer: Mutex::new(streamer),
            config,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Streamer<S>> {
        // The streamer stays consistent even if a lifecycle call panicked.
        self.streamer.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn geometry(&self) -> FrameGeometry {
        self.config.geometry
    }

    /// Start streaming frames of `pattern`.
    ///
    /// With [`Pattern::ExternalSource`], frames are taken from those passed to
    /// [`VirtualCamera::push_frame`]. Calling this while already streaming
    /// does nothing, even if `pattern` differs: stop the stream first to
    /// switch patterns.
    pub fn start(&self, pattern: Pattern) -> Result<(), StartError> {
        self.lock().start(pattern)
    }

    /// Stop streaming. When this returns, no more frames are written and
    /// queued frames have been discarded.
    ///
    /// If streaming had already ended because of an error, that error is
    /// returned. The camera is stopped either way and can be started again.
    pub fn stop(&self) -> Result<(), StreamError> {
        self.lock().stop()
    }

    /// Queue an externally produced frame.
    ///
    /// Only accepted while streaming [`Pattern::ExternalSource`], and only if
    /// `data` is exactly one RGB24 frame of the camera's geometry. If frames
    /// are pushed faster than they are streamed, the oldest ones are dropped.
    pub fn push_frame(&self, data: Vec<u8>) -> Result<(), PushFrameError> {
        self.queue.push(data)
    }

    /// Stop streaming and close the output device.
    ///
    /// The camera cannot be started again afterwards. Calling this more than
    /// once is harmless.
    pub fn shutdown(&self) {
        let mut streamer = self.lock();
        if streamer.has_sink() {
            info!("Shutting down virtual camera");
        }
        drop(streamer.release());
    }

    pub fn state(&self) -> StreamState {
        self.monitor.state()
    }

    /// Number of frame periods elapsed since streaming started.
    pub fn frame_count(&self) -> u64 {
        self.monitor.frame_count()
    }

    /// The error that ended the last streaming session, if it did not end
    /// because of [`VirtualCamera::stop`].
    pub fn last_error(&self) -> Option<StreamError> {
        self.monitor.last_error()
    }

    pub fn stats(&self) -> StreamStats {
        self.monitor.stats()
    }

    /// Number of external frames waiting to be streamed.
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }
}

impl<S: OutputSink> Drop for VirtualCamera<S> {
    fn drop(&mut self) {
        if self.state() == StreamState::Running {
            warn!("Virtual camera dropped while streaming");
        }
        self.shutdown();
    }
}
