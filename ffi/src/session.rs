//! Module for creating and controlling virtual camera sessions.
//!
//! Sessions are created using [`vcam_session_new`] and remain valid until
//! being given to [`vcam_session_destroy`]. All the other functions of this
//! module can be called from any thread, including concurrently.
#![allow(non_camel_case_types)]

use std::{
    ffi::CStr,
    os::raw::{c_char, c_uint},
    path::Path,
    slice,
};

use anyhow::Context;
use log::{debug, error, info, warn};
use vcam::sink::{OutputSink, V4l2Sink};
use vcam::{Pattern, StreamConfig, StreamState, VirtualCamera};

/// A virtual camera session bound to one output device.
pub struct vcam_session {
    camera: VirtualCamera<Box<dyn OutputSink>>,
}

impl vcam_session {
    fn with_sink(sink: Box<dyn OutputSink>, config: StreamConfig) -> Self {
        vcam_session {
            camera: VirtualCamera::with_sink(sink, config),
        }
    }
}

/// State of the streaming loop of a session.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum vcam_stream_state {
    VCAM_STREAM_NOT_STARTED,
    VCAM_STREAM_RUNNING,
    VCAM_STREAM_STOPPING,
    VCAM_STREAM_STOPPED,
}

impl From<StreamState> for vcam_stream_state {
    fn from(state: StreamState) -> Self {
        match state {
            StreamState::NotStarted => vcam_stream_state::VCAM_STREAM_NOT_STARTED,
            StreamState::Running => vcam_stream_state::VCAM_STREAM_RUNNING,
            StreamState::Stopping => vcam_stream_state::VCAM_STREAM_STOPPING,
            StreamState::Stopped => vcam_stream_state::VCAM_STREAM_STOPPED,
        }
    }
}

fn vcam_session_new_safe(path: &Path, width: u32, height: u32) -> anyhow::Result<vcam_session> {
    let config = StreamConfig::new().geometry(width, height);
    let sink = V4l2Sink::open(path, config.geometry)
        .with_context(|| format!("cannot initialize {}", path.display()))?;

    Ok(vcam_session::with_sink(Box::new(sink), config))
}

/// Open the V4L2 output device at `path` and configure it for RGB24 frames of
/// `width`x`height` pixels.
///
/// No frame is written until [`vcam_session_start`] is called. Returns NULL if
/// the device cannot be opened or configured.
///
/// # Safety
///
/// `path` must be a valid, zero-terminated C string containing the path to
/// the device, or NULL.
#[no_mangle]
pub unsafe extern "C" fn vcam_session_new(
    path: *const c_char,
    width: c_uint,
    height: c_uint,
) -> *mut vcam_session {
    if path.is_null() {
        error!("NULL device path");
        return std::ptr::null_mut();
    }

    let path = match CStr::from_ptr(path).to_str() {
        Ok(path) => Path::new(path),
        Err(e) => {
            error!("Device path is not valid UTF-8: {}", e);
            return std::ptr::null_mut();
        }
    };

    match vcam_session_new_safe(path, width, height) {
        Ok(session) => {
            let session = Box::into_raw(Box::new(session));
            info!("Session {:p}: created for {}", session, path.display());
            session
        }
        Err(e) => {
            error!("{:#}", e);
            std::ptr::null_mut()
        }
    }
}

/// Stop streaming, close the device and destroy the session.
///
/// This function takes ownership of `session`, which must not be used after
/// this call.
///
/// # Safety
///
/// `session` must be a valid pointer to a session returned by
/// [`vcam_session_new`], or NULL.
#[no_mangle]
pub unsafe extern "C" fn vcam_session_destroy(session: *mut vcam_session) {
    info!("Session {:p}: destroying", session);

    if session.is_null() {
        warn!("Trying to destroy a NULL session");
        return;
    }

    let session = Box::from_raw(session);
    session.camera.shutdown();
}

/// Start streaming frames of `pattern` to the device.
///
/// `pattern` is one of:
///
/// * 0: scrolling test pattern,
/// * 1: color bars,
/// * 2: still image placeholder,
/// * 3: video placeholder,
/// * 4: external source, i.e. frames passed to [`vcam_session_push_frame`].
///
/// Starting an already streaming session does nothing and succeeds. Returns
/// false if `pattern` is invalid or the device has been closed.
///
/// # Safety
///
/// `session` must be a valid pointer to a session returned by
/// [`vcam_session_new`].
#[no_mangle]
pub unsafe extern "C" fn vcam_session_start(
    session: *const vcam_session,
    pattern: c_uint,
) -> bool {
    assert!(!session.is_null());
    let session = &*session;

    let pattern = match Pattern::n(pattern) {
        Some(pattern) => pattern,
        None => {
            error!("Session {:p}: invalid pattern {}", session, pattern);
            return false;
        }
    };

    match session.camera.start(pattern) {
        Ok(()) => true,
        Err(e) => {
            error!("Session {:p}: cannot start streaming: {}", session, e);
            false
        }
    }
}

/// Stop streaming. No frame is written to the device after this returns.
///
/// Returns false if streaming had already been interrupted by a device error.
/// The session can be started again either way.
///
/// # Safety
///
/// `session` must be a valid pointer to a session returned by
/// [`vcam_session_new`].
#[no_mangle]
pub unsafe extern "C" fn vcam_session_stop(session: *const vcam_session) -> bool {
    assert!(!session.is_null());
    let session = &*session;

    match session.camera.stop() {
        Ok(()) => true,
        Err(e) => {
            warn!("Session {:p}: {}", session, e);
            false
        }
    }
}

/// Queue one RGB24 frame for streaming.
///
/// The `len` bytes pointed to by `data` are copied, so the buffer can be
/// reused as soon as this returns. Returns false if the session is not
/// streaming with the external source pattern, or if `len` does not match the
/// frame size of the session.
///
/// # Safety
///
/// `session` must be a valid pointer to a session returned by
/// [`vcam_session_new`]. `data` must point to at least `len` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn vcam_session_push_frame(
    session: *const vcam_session,
    data: *const u8,
    len: usize,
) -> bool {
    assert!(!session.is_null());
    let session = &*session;

    if data.is_null() {
        error!("Session {:p}: NULL frame data", session);
        return false;
    }
    let frame = slice::from_raw_parts(data, len).to_vec();

    match session.camera.push_frame(frame) {
        Ok(()) => true,
        Err(e) => {
            debug!("Session {:p}: frame rejected: {}", session, e);
            false
        }
    }
}

/// Returns the current state of the streaming loop of `session`.
///
/// # Safety
///
/// `session` must be a valid pointer to a session returned by
/// [`vcam_session_new`].
#[no_mangle]
pub unsafe extern "C" fn vcam_session_state(session: *const vcam_session) -> vcam_stream_state {
    assert!(!session.is_null());
    (*session).camera.state().into()
}

/// Returns the number of frame periods elapsed since streaming last started.
///
/// # Safety
///
/// `session` must be a valid pointer to a session returned by
/// [`vcam_session_new`].
#[no_mangle]
pub unsafe extern "C" fn vcam_session_frame_count(session: *const vcam_session) -> u64 {
    assert!(!session.is_null());
    (*session).camera.frame_count()
}
