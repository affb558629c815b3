//! This module provides safer versions of the V4L2 ioctls needed to set up an
//! output node, through simple functions working on anything that implements
//! `AsRawFd`.
//!
//! V4L2 ioctls are usually called with a single structure as argument, which serves to store both
//! the input and output of the ioctl. To lift any ambiguity as to which parts of the structure
//! userspace is supposed to fill, each ioctl proxy function takes the relevant input as parameters
//! and returns a type built from the structure filled by the driver, using `From` or `TryFrom`.
//!
//! For instance, [`s_fmt()`] takes the requested format as a `(QueueType, &Format)` pair and
//! returns whatever the driver actually settled on, converted into the type desired by the
//! caller:
//!
//! ```text
//! pub fn s_fmt<I: TryInto<v4l2_format>, O: TryFrom<v4l2_format>>(
//!     fd: &mut impl AsRawFd,
//!     format: I,
//! ) -> Result<O, SFmtError>;
//! ```
//!
//! Each ioctl also has its own error type, which can be converted back to its original error code
//! using its `Into<Errno>` implementation.

mod g_fmt;
mod querycap;

pub use g_fmt::*;
pub use querycap::*;

use std::ffi::CStr;
use std::ffi::FromBytesWithNulError;

/// Utility function for sub-modules.
/// Constructs an owned String instance from a slice containing a nul-terminated
/// C string, after checking that the passed slice indeed contains a nul
/// character.
fn string_from_cstr(c_str: &[u8]) -> Result<String, FromBytesWithNulError> {
    // Make sure that our string contains a nul character.
    let slice = match c_str.iter().position(|x| *x == b'\0') {
        // Pass the full slice, `from_bytes_with_nul` will return an error.
        None => c_str,
        Some(pos) => &c_str[..pos + 1],
    };

    Ok(CStr::from_bytes_with_nul(slice)?
        .to_string_lossy()
        .into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::errno::Errno;

    #[test]
    fn test_string_from_cstr() {
        assert_eq!(string_from_cstr(b"v4l2 loopback\0\0\0").unwrap(), "v4l2 loopback");
        assert_eq!(string_from_cstr(b"\0").unwrap(), "");
        assert!(string_from_cstr(b"no terminator").is_err());
    }

    #[test]
    fn test_error_to_errno() {
        assert_eq!(Errno::from(SFmtError::DeviceBusy), Errno::EBUSY);
        assert_eq!(Errno::from(GFmtError::InvalidBufferType), Errno::EINVAL);
    }
}
