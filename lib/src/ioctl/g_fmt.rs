//! Safe wrapper for the `VIDIOC_(G|S)_FMT` ioctls.
use nix::errno::Errno;
use std::convert::{From, TryFrom, TryInto};
use std::mem;
use std::os::unix::io::AsRawFd;
use thiserror::Error;

use crate::bindings;
use crate::bindings::v4l2_format;
use crate::Format;
use crate::QueueType;

impl From<(QueueType, &Format)> for v4l2_format {
    fn from((queue, format): (QueueType, &Format)) -> Self {
        v4l2_format {
            type_: queue as u32,
            fmt: bindings::v4l2_format__bindgen_ty_1 {
                pix: bindings::v4l2_pix_format {
                    width: format.width,
                    height: format.height,
                    pixelformat: format.pixelformat.into(),
                    field: format.field as u32,
                    bytesperline: format.bytesperline,
                    sizeimage: format.sizeimage,
                    colorspace: bindings::v4l2_colorspace_V4L2_COLORSPACE_SRGB,
                    ..Default::default()
                },
            },
        }
    }
}

#[doc(hidden)]
mod ioctl {
    use crate::bindings::v4l2_format;
    nix::ioctl_readwrite!(vidioc_g_fmt, b'V', 4, v4l2_format);
    nix::ioctl_readwrite!(vidioc_s_fmt, b'V', 5, v4l2_format);
}

#[derive(Debug, Error)]
pub enum GFmtError {
    #[error("error while converting from V4L2 format")]
    FromV4L2FormatConversionError,
    #[error("invalid buffer type requested")]
    InvalidBufferType,
    #[error("unexpected ioctl error: {0}")]
    IoctlError(nix::Error),
}

impl From<GFmtError> for Errno {
    fn from(err: GFmtError) -> Self {
        match err {
            GFmtError::FromV4L2FormatConversionError => Errno::EINVAL,
            GFmtError::InvalidBufferType => Errno::EINVAL,
            GFmtError::IoctlError(e) => e,
        }
    }
}

/// Safe wrapper around the `VIDIOC_G_FMT` ioctl.
pub fn g_fmt<O: TryFrom<v4l2_format>>(fd: &impl AsRawFd, queue: QueueType) -> Result<O, GFmtError> {
    let mut fmt = v4l2_format {
        type_: queue as u32,
        ..unsafe { mem::zeroed() }
    };

    match unsafe { ioctl::vidioc_g_fmt(fd.as_raw_fd(), &mut fmt) } {
        Ok(_) => Ok(fmt
            .try_into()
            .map_err(|_| GFmtError::FromV4L2FormatConversionError)?),
        Err(Errno::EINVAL) => Err(GFmtError::InvalidBufferType),
        Err(e) => Err(GFmtError::IoctlError(e)),
    }
}

#[derive(Debug, Error)]
pub enum SFmtError {
    #[error("error while converting from V4L2 format")]
    FromV4L2FormatConversionError,
    #[error("error while converting to V4L2 format")]
    ToV4L2FormatConversionError,
    #[error("invalid buffer type requested")]
    InvalidBufferType,
    #[error("device currently busy")]
    DeviceBusy,
    #[error("ioctl error: {0}")]
    IoctlError(nix::Error),
}

impl From<SFmtError> for Errno {
    fn from(err: SFmtError) -> Self {
        match err {
            SFmtError::FromV4L2FormatConversionError => Errno::EINVAL,
            SFmtError::ToV4L2FormatConversionError => Errno::EINVAL,
            SFmtError::InvalidBufferType => Errno::EINVAL,
            SFmtError::DeviceBusy => Errno::EBUSY,
            SFmtError::IoctlError(e) => e,
        }
    }
}

/// Safe wrapper around the `VIDIOC_S_FMT` ioctl.
///
/// The driver is free to adjust the requested format, so callers should check
/// the returned value against what they asked for.
pub fn s_fmt<I: TryInto<v4l2_format>, O: TryFrom<v4l2_format>>(
    fd: &mut impl AsRawFd,
    format: I,
) -> Result<O, SFmtError> {
    let mut fmt: v4l2_format = format
        .try_into()
        .map_err(|_| SFmtError::ToV4L2FormatConversionError)?;

    match unsafe { ioctl::vidioc_s_fmt(fd.as_raw_fd(), &mut fmt) } {
        Ok(_) => Ok(fmt
            .try_into()
            .map_err(|_| SFmtError::FromV4L2FormatConversionError)?),
        Err(Errno::EINVAL) => Err(SFmtError::InvalidBufferType),
        Err(Errno::EBUSY) => Err(SFmtError::DeviceBusy),
        Err(e) => Err(SFmtError::IoctlError(e)),
    }
}
