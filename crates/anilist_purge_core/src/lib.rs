/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use std::ffi::{c_char, CString};

pub mod cache;
pub mod config;
mod ffi;
pub mod fetcher;
pub mod filter;
pub mod graphql;
pub mod kind;
pub mod model;
pub mod rate_limit;
pub mod runtime;
pub mod session;
pub mod settings;
pub mod ui_events;

#[no_mangle]
pub extern "C" fn anilist_purge_version() -> *mut c_char {
    CString::new(env!("CARGO_PKG_VERSION"))
        .expect("version is valid CString")
        .into_raw()
}
