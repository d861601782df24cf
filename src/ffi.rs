//! FFI bindings for Synheart Interact
//!
//! This module provides C-compatible functions for driving a tracker from a
//! host binding. All functions use C strings (null-terminated) and return
//! allocated memory that must be freed by the caller using
//! `interact_free_string`.
//!
//! A tracker handle is single-threaded: every call for one handle must come
//! from the same thread.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use chrono::{DateTime, Utc};

use crate::clock::{Clock, ManualClock};
use crate::config::{ConfigPatch, TrackerConfig};
use crate::error::TrackerError;
use crate::pipeline::InteractionTracker;
use crate::signal::TimedSignal;
use crate::sink::MemorySink;
use crate::types::Payload;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
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

fn json_or_error<T: serde::Serialize>(value: &T) -> *mut c_char {
    match serde_json::to_string(value) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Tracker API
// ============================================================================

/// Opaque handle to an InteractionTracker
pub struct InteractTrackerHandle {
    tracker: InteractionTracker<MemorySink, ManualClock>,
    sink: MemorySink,
    clock: ManualClock,
}

impl InteractTrackerHandle {
    fn new(config: TrackerConfig) -> Result<Self, TrackerError> {
        let clock = ManualClock::new(Utc::now());
        let sink = MemorySink::new();
        let tracker = InteractionTracker::new(config, sink.clone(), clock.clone())?;
        Ok(Self {
            tracker,
            sink,
            clock,
        })
    }

    /// Move the shared clock forward; never backwards
    fn move_clock(&self, at: DateTime<Utc>) {
        if at > self.clock.now() {
            self.clock.set(at);
        }
    }

    fn handle_json(&mut self, json: &str) -> Result<String, TrackerError> {
        let timed = TimedSignal::from_json(json)?;
        self.move_clock(timed.at.unwrap_or_else(Utc::now));
        self.tracker.handle_timed(timed);
        self.drain_json()
    }

    fn drain_json(&self) -> Result<String, TrackerError> {
        let records = self.sink.drain();
        serde_json::to_string(&records).map_err(|e| TrackerError::EncodingError(e.to_string()))
    }
}

/// Create a tracker. `config_json` may be NULL for defaults, or a (partial)
/// configuration object with camelCase keys.
///
/// # Safety
/// - `config_json` must be NULL or a valid null-terminated C string.
/// - Returns a pointer that must be freed with `interact_tracker_free`.
/// - Returns NULL on error; call `interact_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn interact_tracker_new(
    config_json: *const c_char,
) -> *mut InteractTrackerHandle {
    clear_last_error();

    let config = if config_json.is_null() {
        TrackerConfig::default()
    } else {
        let json = match cstr_to_string(config_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        };
        match TrackerConfig::from_json(&json) {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    match InteractTrackerHandle::new(config) {
        Ok(handle) => Box::into_raw(Box::new(handle)),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a tracker.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `interact_tracker_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn interact_tracker_free(tracker: *mut InteractTrackerHandle) {
    if !tracker.is_null() {
        drop(Box::from_raw(tracker));
    }
}

/// Feed one signal (JSON object, optional `at`) and return a JSON array of
/// the records it produced, including any timers that fell due.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `interact_tracker_new`.
/// - `signal_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `interact_free_string`.
/// - Returns NULL on error; call `interact_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn interact_tracker_handle(
    tracker: *mut InteractTrackerHandle,
    signal_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return ptr::null_mut();
    }

    let handle = &mut *tracker;

    let json = match cstr_to_string(signal_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid signal string pointer");
            return ptr::null_mut();
        }
    };

    match handle.handle_json(&json) {
        Ok(records) => string_to_cstr(&records),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Fire timers due at `at` (RFC 3339), or at the current time if `at` is
/// NULL. Returns a JSON array of the records produced.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `interact_tracker_new`.
/// - `at` must be NULL or a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `interact_free_string`.
/// - Returns NULL on error; call `interact_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn interact_tracker_advance(
    tracker: *mut InteractTrackerHandle,
    at: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return ptr::null_mut();
    }

    let handle = &mut *tracker;

    let when = if at.is_null() {
        Utc::now()
    } else {
        let raw = match cstr_to_string(at) {
            Some(s) => s,
            None => {
                set_last_error("Invalid timestamp string pointer");
                return ptr::null_mut();
            }
        };
        match DateTime::parse_from_rfc3339(&raw) {
            Ok(dt) => dt.with_timezone(&Utc),
            Err(e) => {
                set_last_error(&format!("Invalid timestamp: {}", e));
                return ptr::null_mut();
            }
        }
    };

    handle.move_clock(when);
    handle.tracker.advance();

    match handle.drain_json() {
        Ok(records) => string_to_cstr(&records),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Current session metrics as JSON.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `interact_tracker_new`.
/// - Returns a newly allocated string that must be freed with `interact_free_string`.
/// - Returns NULL on error; call `interact_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn interact_tracker_stats(tracker: *const InteractTrackerHandle) -> *mut c_char {
    clear_last_error();

    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return ptr::null_mut();
    }

    let handle = &*tracker;
    json_or_error(&handle.tracker.stats())
}

/// Log a custom event. `subject` and `extra_json` may be NULL. Returns a
/// JSON array of the records produced.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `interact_tracker_new`.
/// - `name` must be a valid null-terminated C string.
/// - `subject` and `extra_json` must be NULL or valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `interact_free_string`.
/// - Returns NULL on error; call `interact_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn interact_tracker_log_custom(
    tracker: *mut InteractTrackerHandle,
    name: *const c_char,
    subject: *const c_char,
    extra_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return ptr::null_mut();
    }

    let handle = &mut *tracker;

    let name_str = match cstr_to_string(name) {
        Some(s) => s,
        None => {
            set_last_error("Invalid name string pointer");
            return ptr::null_mut();
        }
    };

    let subject_str = cstr_to_string(subject).unwrap_or_default();

    let extra = match cstr_to_string(extra_json) {
        Some(json) => match serde_json::from_str::<Payload>(&json) {
            Ok(map) => map,
            Err(e) => {
                set_last_error(&format!("Invalid extra payload: {}", e));
                return ptr::null_mut();
            }
        },
        None => Payload::new(),
    };

    handle.move_clock(Utc::now());
    if let Err(e) = handle.tracker.log_custom_event(&name_str, &subject_str, extra) {
        set_last_error(&e.to_string());
        return ptr::null_mut();
    }

    match handle.drain_json() {
        Ok(records) => string_to_cstr(&records),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Effective configuration as JSON.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `interact_tracker_new`.
/// - Returns a newly allocated string that must be freed with `interact_free_string`.
/// - Returns NULL on error; call `interact_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn interact_tracker_get_config(
    tracker: *const InteractTrackerHandle,
) -> *mut c_char {
    clear_last_error();

    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return ptr::null_mut();
    }

    let handle = &*tracker;
    json_or_error(handle.tracker.config())
}

/// Merge a partial configuration.
///
/// # Safety
/// - `tracker` must be a valid pointer returned by `interact_tracker_new`.
/// - `patch_json` must be a valid null-terminated C string.
/// - Returns 0 on success, non-zero on error.
/// - On error, call `interact_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn interact_tracker_update_config(
    tracker: *mut InteractTrackerHandle,
    patch_json: *const c_char,
) -> i32 {
    clear_last_error();

    if tracker.is_null() {
        set_last_error("Null tracker pointer");
        return -1;
    }

    let handle = &mut *tracker;

    let json = match cstr_to_string(patch_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid config string pointer");
            return -1;
        }
    };

    let patch: ConfigPatch = match serde_json::from_str(&json) {
        Ok(patch) => patch,
        Err(e) => {
            set_last_error(&format!("Invalid config patch: {}", e));
            return -1;
        }
    };

    match handle.tracker.update_config(&patch) {
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

/// Free a string returned by Interact functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by an Interact function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn interact_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next Interact function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn interact_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}
