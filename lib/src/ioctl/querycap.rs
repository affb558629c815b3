//! Safe wrapper for the `VIDIOC_QUERYCAP` ioctl.
use super::string_from_cstr;
use crate::bindings;
use crate::bindings::v4l2_capability;
use bitflags::bitflags;
use nix::errno::Errno;
use std::fmt;
use std::mem;
use std::os::unix::io::AsRawFd;
use thiserror::Error;

bitflags! {
    /// Flags returned by the `VIDIOC_QUERYCAP` ioctl into the `capabilities`
    /// or `device_capabilities` field of `v4l2_capability`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Capabilities: u32 {
        const VIDEO_CAPTURE = bindings::V4L2_CAP_VIDEO_CAPTURE;
        const VIDEO_OUTPUT = bindings::V4L2_CAP_VIDEO_OUTPUT;
        const VIDEO_OVERLAY = bindings::V4L2_CAP_VIDEO_OVERLAY;
        const VIDEO_OUTPUT_OVERLAY = bindings::V4L2_CAP_VIDEO_OUTPUT_OVERLAY;

        const VIDEO_CAPTURE_MPLANE = bindings::V4L2_CAP_VIDEO_CAPTURE_MPLANE;
        const VIDEO_OUTPUT_MPLANE = bindings::V4L2_CAP_VIDEO_OUTPUT_MPLANE;
        const VIDEO_M2M_MPLANE = bindings::V4L2_CAP_VIDEO_M2M_MPLANE;
        const VIDEO_M2M = bindings::V4L2_CAP_VIDEO_M2M;

        const EXT_PIX_FORMAT = bindings::V4L2_CAP_EXT_PIX_FORMAT;

        const READWRITE = bindings::V4L2_CAP_READWRITE;
        const STREAMING = bindings::V4L2_CAP_STREAMING;

        const DEVICE_CAPS = bindings::V4L2_CAP_DEVICE_CAPS;
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Safe variant of the `v4l2_capability` struct, to be used with `querycap`.
#[derive(Debug)]
pub struct Capability {
    pub driver: String,
    pub card: String,
    pub bus_info: String,
    pub version: u32,
    pub capabilities: Capabilities,
    pub device_caps: Option<Capabilities>,
}

impl Capability {
    /// Returns the capabilities that apply to the currently opened V4L2 node.
    pub fn device_caps(&self) -> Capabilities {
        self.device_caps
            .unwrap_or_else(|| self.capabilities.difference(Capabilities::DEVICE_CAPS))
    }

    /// Returns the driver version as a `(major, minor, patch)` triplet.
    pub fn version_triplet(&self) -> (u8, u8, u8) {
        (
            (self.version >> 16) as u8,
            (self.version >> 8) as u8,
            self.version as u8,
        )
    }

    /// Whether frames can be written into this node with `write()`.
    pub fn is_writable_output(&self) -> bool {
        self.device_caps().contains(Capabilities::VIDEO_OUTPUT)
    }
}

impl From<v4l2_capability> for Capability {
    fn from(qcap: v4l2_capability) -> Self {
        Capability {
            driver: string_from_cstr(&qcap.driver).unwrap_or_else(|_| "".into()),
            card: string_from_cstr(&qcap.card).unwrap_or_else(|_| "".into()),
            bus_info: string_from_cstr(&qcap.bus_info).unwrap_or_else(|_| "".into()),
            version: qcap.version,
            capabilities: Capabilities::from_bits_truncate(qcap.capabilities),
            device_caps: if qcap.capabilities & bindings::V4L2_CAP_DEVICE_CAPS != 0 {
                Some(Capabilities::from_bits_truncate(qcap.device_caps))
            } else {
                None
            },
        }
    }
}

#[doc(hidden)]
mod ioctl {
    use crate::bindings::v4l2_capability;
    nix::ioctl_read!(vidioc_querycap, b'V', 0, v4l2_capability);
}

#[derive(Debug, Error)]
pub enum QueryCapError {
    #[error("ioctl error: {0}")]
    IoctlError(Errno),
}

impl From<QueryCapError> for Errno {
    fn from(err: QueryCapError) -> Self {
        match err {
            QueryCapError::IoctlError(e) => e,
        }
    }
}

/// Safe wrapper around the `VIDIOC_QUERYCAP` ioctl.
pub fn querycap<T: From<v4l2_capability>>(fd: &impl AsRawFd) -> Result<T, QueryCapError> {
    let mut qcap: v4l2_capability = unsafe { mem::zeroed() };

    match unsafe { ioctl::vidioc_querycap(fd.as_raw_fd(), &mut qcap) } {
        Ok(_) => Ok(T::from(qcap)),
        Err(e) => Err(QueryCapError::IoctlError(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback_capability(capabilities: u32, device_caps: u32) -> v4l2_capability {
        let mut qcap = v4l2_capability {
            version: 0x0006_0102,
            capabilities,
            device_caps,
            ..Default::default()
        };
        qcap.driver[..13].copy_from_slice(b"v4l2 loopback");
        qcap.card[..14].copy_from_slice(b"Virtual Camera");
        qcap
    }

    #[test]
    fn test_capability_from_v4l2() {
        let cap = Capability::from(loopback_capability(
            bindings::V4L2_CAP_VIDEO_OUTPUT
                | bindings::V4L2_CAP_VIDEO_CAPTURE
                | bindings::V4L2_CAP_DEVICE_CAPS,
            bindings::V4L2_CAP_VIDEO_OUTPUT | bindings::V4L2_CAP_READWRITE,
        ));

        assert_eq!(cap.driver, "v4l2 loopback");
        assert_eq!(cap.card, "Virtual Camera");
        assert_eq!(cap.version_triplet(), (6, 1, 2));
        assert_eq!(
            cap.device_caps(),
            Capabilities::VIDEO_OUTPUT | Capabilities::READWRITE
        );
        assert!(cap.is_writable_output());
    }

    #[test]
    fn test_capability_without_device_caps() {
        // Without the DEVICE_CAPS flag, the global capabilities apply to the node.
        let cap = Capability::from(loopback_capability(bindings::V4L2_CAP_VIDEO_CAPTURE, 0));

        assert_eq!(cap.device_caps, None);
        assert_eq!(cap.device_caps(), Capabilities::VIDEO_CAPTURE);
        assert!(!cap.is_writable_output());
    }
}
