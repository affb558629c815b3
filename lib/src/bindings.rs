#![allow(dead_code)]
#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
#![allow(clippy::all)]

//! Subset of `linux/videodev2.h` needed to configure and feed a video OUTPUT
//! node. Layouts follow what bindgen produces for the kernel UAPI header, so
//! the ioctl request codes computed from `size_of` match the kernel's.

use std::os::raw::c_ulong;

pub type __u8 = u8;
pub type __u32 = u32;

pub const V4L2_CAP_VIDEO_CAPTURE: u32 = 0x00000001;
pub const V4L2_CAP_VIDEO_OUTPUT: u32 = 0x00000002;
pub const V4L2_CAP_VIDEO_OVERLAY: u32 = 0x00000004;
pub const V4L2_CAP_VIDEO_OUTPUT_OVERLAY: u32 = 0x00000200;
pub const V4L2_CAP_VIDEO_CAPTURE_MPLANE: u32 = 0x00001000;
pub const V4L2_CAP_VIDEO_OUTPUT_MPLANE: u32 = 0x00002000;
pub const V4L2_CAP_VIDEO_M2M_MPLANE: u32 = 0x00004000;
pub const V4L2_CAP_VIDEO_M2M: u32 = 0x00008000;
pub const V4L2_CAP_EXT_PIX_FORMAT: u32 = 0x00200000;
pub const V4L2_CAP_READWRITE: u32 = 0x01000000;
pub const V4L2_CAP_STREAMING: u32 = 0x04000000;
pub const V4L2_CAP_DEVICE_CAPS: u32 = 0x80000000;

pub type v4l2_buf_type = ::std::os::raw::c_uint;
pub const v4l2_buf_type_V4L2_BUF_TYPE_VIDEO_CAPTURE: v4l2_buf_type = 1;
pub const v4l2_buf_type_V4L2_BUF_TYPE_VIDEO_OUTPUT: v4l2_buf_type = 2;

pub type v4l2_field = ::std::os::raw::c_uint;
pub const v4l2_field_V4L2_FIELD_ANY: v4l2_field = 0;
pub const v4l2_field_V4L2_FIELD_NONE: v4l2_field = 1;

pub type v4l2_colorspace = ::std::os::raw::c_uint;
pub const v4l2_colorspace_V4L2_COLORSPACE_DEFAULT: v4l2_colorspace = 0;
pub const v4l2_colorspace_V4L2_COLORSPACE_SRGB: v4l2_colorspace = 8;

#[repr(C)]
#[derive(Debug, Default, Copy, Clone)]
pub struct v4l2_capability {
    pub driver: [__u8; 16usize],
    pub card: [__u8; 32usize],
    pub bus_info: [__u8; 32usize],
    pub version: __u32,
    pub capabilities: __u32,
    pub device_caps: __u32,
    pub reserved: [__u32; 3usize],
}

#[repr(C)]
#[derive(Debug, Default, Copy, Clone)]
pub struct v4l2_pix_format {
    pub width: __u32,
    pub height: __u32,
    pub pixelformat: __u32,
    pub field: __u32,
    pub bytesperline: __u32,
    pub sizeimage: __u32,
    pub colorspace: __u32,
    pub priv_: __u32,
    pub flags: __u32,
    /// Anonymous `ycbcr_enc`/`hsv_enc` union, both members are `__u32`.
    pub ycbcr_enc: __u32,
    pub quantization: __u32,
    pub xfer_func: __u32,
}

/// The kernel union also carries `v4l2_window` (which holds pointers) and the
/// multi-planar, VBI and SDR formats. They are never used here but their
/// presence fixes the size and alignment of the union, which `raw_data` and
/// `_align` reproduce.
#[repr(C)]
#[derive(Copy, Clone)]
pub union v4l2_format__bindgen_ty_1 {
    pub pix: v4l2_pix_format,
    pub raw_data: [__u8; 200usize],
    pub _align: [c_ulong; 0usize],
}

#[repr(C)]
#[derive(Copy, Clone)]
pub struct v4l2_format {
    pub type_: __u32,
    pub fmt: v4l2_format__bindgen_ty_1,
}

#[test]
fn bindgen_test_layout_v4l2_capability() {
    assert_eq!(::std::mem::size_of::<v4l2_capability>(), 104usize);
    assert_eq!(::std::mem::align_of::<v4l2_capability>(), 4usize);
}

#[test]
fn bindgen_test_layout_v4l2_pix_format() {
    assert_eq!(::std::mem::size_of::<v4l2_pix_format>(), 48usize);
}

#[cfg(target_pointer_width = "64")]
#[test]
fn bindgen_test_layout_v4l2_format() {
    assert_eq!(::std::mem::size_of::<v4l2_format>(), 208usize);
    assert_eq!(::std::mem::align_of::<v4l2_format>(), 8usize);
}

#[cfg(target_pointer_width = "32")]
#[test]
fn bindgen_test_layout_v4l2_format() {
    assert_eq!(::std::mem::size_of::<v4l2_format>(), 204usize);
    assert_eq!(::std::mem::align_of::<v4l2_format>(), 4usize);
}
