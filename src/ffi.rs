//! FFI bindings for Synheart Gaze
//!
//! This module provides C-compatible functions for calling Gaze from other languages.
//! All functions use C strings (null-terminated) and return allocated memory that
//! must be freed by the caller using `gaze_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::alerts::{AlertThresholds, ThresholdOverrides};
use crate::error::ComputeError;
use crate::eye_metrics::compute_eye_metrics;
use crate::landmarks::FaceLandmarks;
use crate::pipeline::MonitorProcessor;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Return the string result or record the error and return NULL
fn into_cstr_or_null(result: Result<String, ComputeError>) -> *mut c_char {
    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Compute eye metrics for one landmark array.
///
/// # Safety
/// - `landmarks_json` must be a valid null-terminated C string holding a JSON
///   array of `{x, y, z}` objects.
/// - Returns a newly allocated string that must be freed with `gaze_free_string`.
/// - Returns NULL on error; call `gaze_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn gaze_compute_eye_metrics(landmarks_json: *const c_char) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(landmarks_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid landmarks string pointer");
            return ptr::null_mut();
        }
    };

    let landmarks: FaceLandmarks = match serde_json::from_str(&json_str) {
        Ok(landmarks) => landmarks,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    into_cstr_or_null(
        serde_json::to_string(&compute_eye_metrics(&landmarks)).map_err(ComputeError::from),
    )
}

/// Get the default alert thresholds as JSON.
///
/// # Safety
/// - Returns a newly allocated string that must be freed with `gaze_free_string`.
#[no_mangle]
pub unsafe extern "C" fn gaze_default_thresholds() -> *mut c_char {
    clear_last_error();
    into_cstr_or_null(
        serde_json::to_string(&AlertThresholds::default()).map_err(ComputeError::from),
    )
}

// ============================================================================
// Stateful Processor API
// ============================================================================

/// Opaque handle to a MonitorProcessor
pub struct GazeProcessorHandle {
    processor: MonitorProcessor,
}

/// Create a new MonitorProcessor.
///
/// # Safety
/// - `thresholds_json` is either NULL (defaults) or a valid null-terminated C
///   string holding a JSON object of threshold overrides.
/// - Returns a pointer to a newly allocated processor.
/// - Must be freed with `gaze_processor_free`.
/// - Returns NULL on error; call `gaze_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn gaze_processor_new(
    thresholds_json: *const c_char,
) -> *mut GazeProcessorHandle {
    clear_last_error();

    let processor = if thresholds_json.is_null() {
        Ok(MonitorProcessor::new())
    } else {
        match cstr_to_string(thresholds_json) {
            Some(json) => ThresholdOverrides::from_json(&json)
                .and_then(|overrides| MonitorProcessor::with_thresholds(&overrides)),
            None => {
                set_last_error("Invalid thresholds string pointer");
                return ptr::null_mut();
            }
        }
    };

    match processor {
        Ok(processor) => Box::into_raw(Box::new(GazeProcessorHandle { processor })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a MonitorProcessor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `gaze_processor_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn gaze_processor_free(processor: *mut GazeProcessorHandle) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

/// Process one JSON frame and return the JSON frame report.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `gaze_processor_new`.
/// - `frame_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `gaze_free_string`.
/// - Returns NULL on error; call `gaze_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn gaze_processor_process_frame(
    processor: *mut GazeProcessorHandle,
    frame_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &mut *processor;

    let json_str = match cstr_to_string(frame_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid frame string pointer");
            return ptr::null_mut();
        }
    };

    into_cstr_or_null(handle.processor.process_json(&json_str))
}

/// Reset the processor for a new session.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `gaze_processor_new`.
/// - Returns 0 on success, -1 on a NULL processor.
#[no_mangle]
pub unsafe extern "C" fn gaze_processor_reset(processor: *mut GazeProcessorHandle) -> i32 {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return -1;
    }

    (*processor).processor.reset();
    0
}

/// Save session state to JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `gaze_processor_new`.
/// - Returns a newly allocated string that must be freed with `gaze_free_string`.
/// - Returns NULL on error; call `gaze_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn gaze_processor_save_state(
    processor: *mut GazeProcessorHandle,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &*processor;
    into_cstr_or_null(handle.processor.save_state())
}

/// Load session state from JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `gaze_processor_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns 0 on success, non-zero on error.
/// - On error, call `gaze_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn gaze_processor_load_state(
    processor: *mut GazeProcessorHandle,
    json: *const c_char,
) -> i32 {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return -1;
    }

    let handle = &mut *processor;

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return -1;
        }
    };

    match handle.processor.load_state(&json_str) {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Gaze functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Gaze function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn gaze_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Gaze function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn gaze_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the Gaze library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn gaze_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
