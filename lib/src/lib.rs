//! Virtual camera streaming over V4L2 OUTPUT devices.
//!
//! This crate produces RGB24 frames at a steady cadence and writes them to a
//! video OUTPUT node, typically one created by `v4l2loopback`, so that other
//! programs can open the node as if it were a camera. Frames either come from
//! a built-in pattern generator or are pushed by an external producer (e.g. a
//! network stream decoder) into a bounded queue.
//!
//! The crate is layered as follows:
//!
//! * The `ioctl` module provides thin, memory-safe wrappers over the few V4L2
//!   ioctls needed to configure an output node.
//! * The `sink` module defines the [`sink::OutputSink`] trait frames are
//!   delivered through, and its V4L2 implementation.
//! * The `framegen`, `queue` and `stream` modules implement frame synthesis,
//!   buffering of externally supplied frames and the periodic streaming loop.
//! * The `session` module ties everything together into the
//!   [`session::VirtualCamera`] object host applications drive.
#[doc(hidden)]
pub mod bindings;
pub mod frame;
pub mod framegen;
pub mod ioctl;
pub mod queue;
pub mod session;
pub mod sink;
pub mod stream;

use std::convert::TryFrom;
use std::fmt;
use std::fmt::{Debug, Display};

use enumn::N;
use thiserror::Error;

pub use frame::{FrameBuffer, FrameGeometry, InvalidGeometry, Pattern};
pub use session::VirtualCamera;
pub use stream::{EmptyQueuePolicy, StreamConfig, StreamState};

/// Types of queues this library can configure a format on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, N)]
#[repr(u32)]
pub enum QueueType {
    VideoCapture = bindings::v4l2_buf_type_V4L2_BUF_TYPE_VIDEO_CAPTURE,
    VideoOutput = bindings::v4l2_buf_type_V4L2_BUF_TYPE_VIDEO_OUTPUT,
}

impl Display for QueueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Debug::fmt(self, f)
    }
}

/// A Fourcc pixel format, used to pass formats to V4L2. It can be converted
/// back and forth from a 32-bit integer, or a 4-bytes string.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct PixelFormat(u32);

impl PixelFormat {
    /// Packed 24-bit RGB, the only format frames are produced in.
    pub const RGB24: PixelFormat = PixelFormat::from_fourcc(b"RGB3");

    pub const fn from_u32(v: u32) -> Self {
        Self(v)
    }

    pub const fn to_u32(self) -> u32 {
        self.0
    }

    pub const fn from_fourcc(n: &[u8; 4]) -> Self {
        Self(n[0] as u32 | (n[1] as u32) << 8 | (n[2] as u32) << 16 | (n[3] as u32) << 24)
    }

    pub const fn to_fourcc(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }
}

/// Converts a Fourcc in 32-bit integer format (like the ones passed in V4L2
/// structures) into the matching pixel format.
///
/// # Examples
///
/// ```
/// # use vcam::PixelFormat;
/// // Fourcc representation of RGB3.
/// let rgb3 = u32::from_le(0x33424752);
/// let f = PixelFormat::from(rgb3);
/// assert_eq!(f, PixelFormat::RGB24);
/// assert_eq!(u32::from(f), rgb3);
/// ```
impl From<u32> for PixelFormat {
    fn from(i: u32) -> Self {
        Self::from_u32(i)
    }
}

impl From<PixelFormat> for u32 {
    fn from(format: PixelFormat) -> Self {
        format.to_u32()
    }
}

/// Simple way to convert a string litteral (e.g. b"RGB3") into a pixel
/// format that can be passed to V4L2.
///
/// # Examples
///
/// ```
/// # use vcam::PixelFormat;
/// let f = PixelFormat::from(b"RGB3");
/// assert_eq!(&<[u8; 4]>::from(f), b"RGB3");
/// ```
impl From<&[u8; 4]> for PixelFormat {
    fn from(n: &[u8; 4]) -> Self {
        Self::from_fourcc(n)
    }
}

impl From<PixelFormat> for [u8; 4] {
    fn from(format: PixelFormat) -> Self {
        format.to_fourcc()
    }
}

/// Produces a debug string for this PixelFormat, including its hexadecimal
/// and string representation.
///
/// # Examples
///
/// ```
/// # use vcam::PixelFormat;
/// assert_eq!(format!("{:?}", PixelFormat::RGB24), "0x33424752 (RGB3)");
/// ```
impl fmt::Debug for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_fmt(format_args!("0x{:08x} ({})", self.0, self))
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let fourcc = self
            .0
            .to_le_bytes()
            .iter()
            .map(|&x| x as char)
            .collect::<String>();
        f.write_str(fourcc.as_str())
    }
}

/// Equivalent of `enum v4l2_field`, limited to the values we negotiate.
#[repr(u32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, N)]
pub enum Field {
    #[default]
    Any = bindings::v4l2_field_V4L2_FIELD_ANY,
    /// Progressive frames.
    None = bindings::v4l2_field_V4L2_FIELD_NONE,
}

/// Single-planar V4L2 format, as exchanged with `VIDIOC_G_FMT` and
/// `VIDIOC_S_FMT` on a non-multiplanar queue.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct Format {
    /// Width of the image in pixels.
    pub width: u32,
    /// Height of the image in pixels.
    pub height: u32,
    /// Format each pixel is encoded in.
    pub pixelformat: PixelFormat,
    /// Field order. Output frames are always progressive.
    pub field: Field,
    /// Bytes per line of data. Zero lets the driver pick.
    pub bytesperline: u32,
    /// Size of a whole frame in bytes. Zero lets the driver pick.
    pub sizeimage: u32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatConversionError {
    #[error("invalid buffer type {0}")]
    InvalidBufferType(u32),
    #[error("invalid field value {0}")]
    InvalidField(u32),
}

impl TryFrom<bindings::v4l2_format> for Format {
    type Error = FormatConversionError;

    fn try_from(fmt: bindings::v4l2_format) -> std::result::Result<Self, Self::Error> {
        match fmt.type_ {
            bindings::v4l2_buf_type_V4L2_BUF_TYPE_VIDEO_CAPTURE
            | bindings::v4l2_buf_type_V4L2_BUF_TYPE_VIDEO_OUTPUT => {
                // Safe because single-planar buffer types use the `pix` member.
                let pix = unsafe { &fmt.fmt.pix };
                Ok(Format {
                    width: pix.width,
                    height: pix.height,
                    pixelformat: PixelFormat::from(pix.pixelformat),
                    field: Field::n(pix.field).ok_or(Self::Error::InvalidField(pix.field))?,
                    bytesperline: pix.bytesperline,
                    sizeimage: pix.sizeimage,
                })
            }
            t => Err(Self::Error::InvalidBufferType(t)),
        }
    }
}

/// Builds the RGB24, progressive format matching a frame geometry.
///
/// Fails if the size of a line or of a frame does not fit the 32-bit fields of
/// a V4L2 format.
///
/// # Examples
///
/// ```
/// # use std::convert::TryFrom;
/// # use vcam::{Format, FrameGeometry, PixelFormat, Field};
/// let f = Format::try_from(FrameGeometry::new(640, 480)).unwrap();
/// assert_eq!(f.pixelformat, PixelFormat::RGB24);
/// assert_eq!(f.field, Field::None);
/// assert_eq!(f.bytesperline, 640 * 3);
/// assert_eq!(f.sizeimage, 640 * 480 * 3);
///
/// assert!(Format::try_from(FrameGeometry::new(2_000_000_000, 1)).is_err());
/// ```
impl TryFrom<FrameGeometry> for Format {
    type Error = InvalidGeometry;

    fn try_from(geometry: FrameGeometry) -> Result<Self, Self::Error> {
        let invalid = || InvalidGeometry(geometry);
        let bytesperline = geometry
            .width
            .checked_mul(frame::BYTES_PER_PIXEL as u32)
            .ok_or_else(invalid)?;
        let sizeimage = geometry
            .checked_frame_size()
            .and_then(|size| u32::try_from(size).ok())
            .ok_or_else(invalid)?;

        Ok(Format {
            width: geometry.width,
            height: geometry.height,
            pixelformat: PixelFormat::RGB24,
            field: Field::None,
            bytesperline,
            sizeimage,
        })
    }
}
