/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use crate::runtime::{self, FetchRequest};
use std::ffi::{c_char, c_int, CStr, CString};
use std::ptr;

fn set_err(out_err: *mut *mut c_char, msg: String) {
    if out_err.is_null() {
        return;
    }
    let c = CString::new(msg).unwrap_or_else(|_| CString::new("ffi error").unwrap());
    unsafe {
        *out_err = c.into_raw();
    }
}

fn into_c_string(s: String) -> *mut c_char {
    CString::new(s)
        .map(CString::into_raw)
        .unwrap_or(ptr::null_mut())
}

#[no_mangle]
pub extern "C" fn anilist_purge_fetch_start(
    request_json: *const c_char,
    out_handle: *mut u64,
    out_err: *mut *mut c_char,
) -> c_int {
    if request_json.is_null() || out_handle.is_null() {
        set_err(out_err, "null argument".to_string());
        return 1;
    }
    let req_str = unsafe { CStr::from_ptr(request_json) }
        .to_string_lossy()
        .to_string();
    let req: FetchRequest = match serde_json::from_str(&req_str) {
        Ok(v) => v,
        Err(e) => {
            set_err(out_err, format!("invalid request json: {e}"));
            return 2;
        }
    };
    match runtime::start(req) {
        Ok(handle) => {
            unsafe {
                *out_handle = handle;
            }
            0
        }
        Err(e) => {
            set_err(out_err, format!("{e:#}"));
            3
        }
    }
}

#[no_mangle]
pub extern "C" fn anilist_purge_fetch_cancel(handle: u64, out_err: *mut *mut c_char) -> c_int {
    match runtime::cancel(handle) {
        Ok(()) => 0,
        Err(e) => {
            set_err(out_err, format!("{e:#}"));
            1
        }
    }
}

/// Returns the status line (caller frees), or null for an unknown handle.
#[no_mangle]
pub extern "C" fn anilist_purge_fetch_status(handle: u64) -> *mut c_char {
    match runtime::status(handle) {
        Ok(s) => into_c_string(s),
        Err(_) => ptr::null_mut(),
    }
}

/// Writes the JSON result to `out_result` once finished; leaves it null while running.
#[no_mangle]
pub extern "C" fn anilist_purge_fetch_poll(
    handle: u64,
    out_result: *mut *mut c_char,
    out_err: *mut *mut c_char,
) -> c_int {
    if out_result.is_null() {
        set_err(out_err, "null argument".to_string());
        return 1;
    }
    unsafe {
        *out_result = ptr::null_mut();
    }
    match runtime::poll(handle) {
        Ok(None) => 0,
        Ok(Some(res)) => match serde_json::to_string(&res) {
            Ok(json) => {
                unsafe {
                    *out_result = into_c_string(json);
                }
                0
            }
            Err(e) => {
                set_err(out_err, format!("encode result: {e}"));
                2
            }
        },
        Err(e) => {
            set_err(out_err, format!("{e:#}"));
            3
        }
    }
}

#[no_mangle]
pub extern "C" fn anilist_purge_free_cstring(ptr: *mut c_char) {
    if ptr.is_null() {
        return;
    }
    unsafe {
        drop(CString::from_raw(ptr));
    }
}
