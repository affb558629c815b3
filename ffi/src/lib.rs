//! C FFI of the vcam crate.
//!
//! This crate provides a C API allowing host applications (e.g. the native
//! part of an Android app) to drive a virtual camera without linking against
//! Rust code directly.

pub mod session;

static INIT: std::sync::Once = std::sync::Once::new();

/// Initialize the vcam library. This only sets up the proper hooks for
/// logging, so although it is not a hard requirement to call this function,
/// failure to do so will result in no logs being printed.
#[no_mangle]
pub extern "C" fn vcam_init() {
    INIT.call_once(|| {
        #[cfg(feature = "env_logger")]
        env_logger::builder().format_timestamp(None).init();

        #[cfg(feature = "android")]
        android_logger::init_once(
            android_logger::Config::default().with_min_level(log::Level::Trace),
        );
    });
}
