//! Destinations frames are written to.
//!
//! [`OutputSink`] is all the streaming loop knows about where frames go.
//! [`V4l2Sink`] implements it for V4L2 OUTPUT nodes accepting `write()`, such
//! as the ones created by `v4l2loopback`.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};

use log::{debug, info};
use nix::fcntl::OFlag;
use thiserror::Error;

use crate::frame::{FrameGeometry, InvalidGeometry};
use crate::ioctl::{self, Capability};
use crate::{Field, Format, PixelFormat, QueueType};

#[derive(Debug, Error)]
pub enum WriteFrameError {
    /// The sink cannot take a frame right now. Not fatal, the frame is just
    /// not delivered.
    #[error("sink temporarily unavailable")]
    TryAgain,
    /// The sink is broken and streaming cannot continue.
    #[error("error while writing frame: {0}")]
    Fatal(io::Error),
}

impl From<io::Error> for WriteFrameError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => WriteFrameError::TryAgain,
            _ => WriteFrameError::Fatal(e),
        }
    }
}

/// A destination accepting one whole frame per write.
pub trait OutputSink: Send + 'static {
    /// Write one frame. Returns the number of bytes actually accepted.
    fn write_frame(&mut self, frame: &[u8]) -> Result<usize, WriteFrameError>;
}

impl<S: OutputSink + ?Sized> OutputSink for Box<S> {
    fn write_frame(&mut self, frame: &[u8]) -> Result<usize, WriteFrameError> {
        (**self).write_frame(frame)
    }
}

#[derive(Debug, Error)]
pub enum OpenSinkError {
    #[error(transparent)]
    InvalidGeometry(#[from] InvalidGeometry),
    #[error("cannot open {0}: {1}")]
    Open(PathBuf, io::Error),
    #[error("cannot query device capabilities: {0}")]
    QueryCap(#[from] ioctl::QueryCapError),
    #[error("{0} is not a video output device")]
    NotAnOutputDevice(PathBuf),
    #[error("cannot set output format: {0}")]
    SetFormat(#[from] ioctl::SFmtError),
    #[error("device adjusted format to {actual:?} instead of {requested:?}")]
    FormatRejected { requested: Format, actual: Format },
}

/// A V4L2 video output node configured for RGB24 frames of a fixed geometry.
///
/// The node is opened in non-blocking mode, so a write to a node that cannot
/// take a frame yet fails with [`WriteFrameError::TryAgain`] instead of
/// blocking the streaming loop. It is closed when the sink is dropped.
pub struct V4l2Sink {
    file: File,
    path: PathBuf,
    capability: Capability,
    format: Format,
}

impl V4l2Sink {
    /// Open the node at `path` and configure it for frames of `geometry`.
    ///
    /// Empty geometries, and those whose frames are too large to be described
    /// to V4L2, are rejected before the node is opened.
    pub fn open(path: &Path, geometry: FrameGeometry) -> Result<Self, OpenSinkError> {
        if !geometry.is_valid() {
            return Err(InvalidGeometry(geometry).into());
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags((OFlag::O_NONBLOCK | OFlag::O_CLOEXEC).bits())
            .open(path)
            .map_err(|e| OpenSinkError::Open(path.to_path_buf(), e))?;

        let capability: Capability = ioctl::querycap(&file)?;
        let (major, minor, patch) = capability.version_triplet();
        info!(
            "Opened {}: {} ({} {}.{}.{})",
            path.display(),
            capability.card,
            capability.driver,
            major,
            minor,
            patch
        );
        if !capability.is_writable_output() {
            return Err(OpenSinkError::NotAnOutputDevice(path.to_path_buf()));
        }

        let mut sink = V4l2Sink {
            file,
            path: path.to_path_buf(),
            capability,
            format: Default::default(),
        };
        sink.format = sink.configure(geometry)?;

        Ok(sink)
    }

    fn configure(&mut self, geometry: FrameGeometry) -> Result<Format, OpenSinkError> {
        if let Ok(current) = ioctl::g_fmt::<Format>(&self.file, QueueType::VideoOutput) {
            debug!("Previous output format of {}: {:?}", self.path.display(), current);
        }

        let requested = Format::try_from(geometry)?;
        let actual: Format = ioctl::s_fmt(&mut self.file, (QueueType::VideoOutput, &requested))?;

        // Drivers may round the resolution or fall back to another pixel
        // format, and may report `Any` as the field order of progressive
        // frames.
        if actual.width != requested.width
            || actual.height != requested.height
            || actual.pixelformat != PixelFormat::RGB24
            || !matches!(actual.field, Field::None | Field::Any)
        {
            return Err(OpenSinkError::FormatRejected { requested, actual });
        }

        debug!("Output format of {} set to {:?}", self.path.display(), actual);

        Ok(actual)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn capability(&self) -> &Capability {
        &self.capability
    }

    /// The format the device has been configured with.
    pub fn format(&self) -> &Format {
        &self.format
    }
}

impl AsRawFd for V4l2Sink {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

impl OutputSink for V4l2Sink {
    fn write_frame(&mut self, frame: &[u8]) -> Result<usize, WriteFrameError> {
        Ok(self.file.write(frame)?)
    }
}

impl Drop for V4l2Sink {
    fn drop(&mut self) {
        debug!("Closing {}", self.path.display());
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// What the mock sink should do on a given write.
    #[derive(Debug, Clone, Copy)]
    pub enum MockWrite {
        Accept,
        Short(usize),
        TryAgain,
        Fatal,
    }

    #[derive(Default)]
    pub struct MockState {
        /// Every frame successfully written, in order.
        pub frames: Vec<Vec<u8>>,
        /// Number of calls to `write_frame`, failed ones included.
        pub attempts: usize,
        /// Outcomes of the next writes. Writes are accepted once it is empty.
        pub script: VecDeque<MockWrite>,
    }

    /// A sink recording the frames it receives, which can be told to fail.
    #[derive(Clone, Default)]
    pub struct MockSink {
        pub state: Arc<Mutex<MockState>>,
    }

    impl MockSink {
        pub fn new() -> Self {
            Default::default()
        }

        pub fn with_script(script: impl IntoIterator<Item = MockWrite>) -> Self {
            let sink = Self::new();
            sink.state.lock().unwrap().script = script.into_iter().collect();
            sink
        }

        pub fn frames(&self) -> Vec<Vec<u8>> {
            self.state.lock().unwrap().frames.clone()
        }

        pub fn num_frames(&self) -> usize {
            self.state.lock().unwrap().frames.len()
        }

        pub fn attempts(&self) -> usize {
            self.state.lock().unwrap().attempts
        }
    }

    impl OutputSink for MockSink {
        fn write_frame(&mut self, frame: &[u8]) -> Result<usize, WriteFrameError> {
            let mut state = self.state.lock().unwrap();
            state.attempts += 1;

            match state.script.pop_front().unwrap_or(MockWrite::Accept) {
                MockWrite::Accept => {
                    state.frames.push(frame.to_vec());
                    Ok(frame.len())
                }
                MockWrite::Short(len) => {
                    state.frames.push(frame[..len].to_vec());
                    Ok(len)
                }
                MockWrite::TryAgain => {
                    Err(io::Error::from(io::ErrorKind::WouldBlock).into())
                }
                MockWrite::Fatal => Err(io::Error::from_raw_os_error(nix::libc::ENODEV).into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_error_classification() {
        assert!(matches!(
            WriteFrameError::from(io::Error::from(io::ErrorKind::WouldBlock)),
            WriteFrameError::TryAgain
        ));
        assert!(matches!(
            WriteFrameError::from(io::Error::from_raw_os_error(nix::libc::EAGAIN)),
            WriteFrameError::TryAgain
        ));
        assert!(matches!(
            WriteFrameError::from(io::Error::from(io::ErrorKind::Interrupted)),
            WriteFrameError::TryAgain
        ));
        assert!(matches!(
            WriteFrameError::from(io::Error::from_raw_os_error(nix::libc::ENODEV)),
            WriteFrameError::Fatal(_)
        ));
    }

    #[test]
    fn test_open_missing_device() {
        let path = Path::new("/nonexistent/video42");
        match V4l2Sink::open(path, FrameGeometry::default()) {
            Err(OpenSinkError::Open(p, _)) => assert_eq!(p, path),
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("opened a nonexistent device"),
        }
    }

    #[test]
    fn test_open_invalid_geometry() {
        // /dev/null can be opened, so only the geometry check can fail here.
        for geometry in [
            FrameGeometry::new(0, 480),
            FrameGeometry::new(640, 0),
            FrameGeometry::new(2_000_000_000, 1),
            FrameGeometry::new(u32::MAX, u32::MAX),
        ] {
            match V4l2Sink::open(Path::new("/dev/null"), geometry) {
                Err(OpenSinkError::InvalidGeometry(InvalidGeometry(g))) => {
                    assert_eq!(g, geometry)
                }
                Err(e) => panic!("unexpected error for {}: {}", geometry, e),
                Ok(_) => panic!("accepted geometry {}", geometry),
            }
        }
    }

    #[test]
    fn test_open_non_v4l2_file() {
        // /dev/null opens fine but does not understand V4L2 ioctls.
        match V4l2Sink::open(Path::new("/dev/null"), FrameGeometry::default()) {
            Err(OpenSinkError::QueryCap(_)) => (),
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("/dev/null is not a video device"),
        }
    }
}
