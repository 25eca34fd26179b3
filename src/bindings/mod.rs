//! C ABI exported by the native surface library.
//!
//! These mirror the library's `wvbridge.h`. Handles are pointer-sized integers;
//! every status-returning function yields `wvbridge_result_kSuccess` on success.

#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]

use std::ffi::{c_char, c_int, c_void};

pub type wvbridge_handle = usize;

pub type wvbridge_result = c_int;

pub const wvbridge_result_kSuccess: wvbridge_result = 0;

pub type wvbridge_progress_callback =
    Option<unsafe extern "C" fn(user_data: *mut c_void, progress: f32)>;

/// Returns `true` to let the navigation proceed.
pub type wvbridge_navigation_callback =
    Option<unsafe extern "C" fn(user_data: *mut c_void, url: *const c_char) -> bool>;

pub type wvbridge_create_fn = unsafe extern "C" fn() -> wvbridge_handle;

pub type wvbridge_resize_fn = unsafe extern "C" fn(
    handle: wvbridge_handle,
    width: c_int,
    height: c_int,
    screen_x: c_int,
    screen_y: c_int,
) -> wvbridge_result;

pub type wvbridge_navigate_fn =
    unsafe extern "C" fn(handle: wvbridge_handle, url: *const c_char) -> wvbridge_result;

pub type wvbridge_destroy_fn = unsafe extern "C" fn(handle: wvbridge_handle) -> wvbridge_result;

pub type wvbridge_set_progress_callback_fn = unsafe extern "C" fn(
    handle: wvbridge_handle,
    callback: wvbridge_progress_callback,
    user_data: *mut c_void,
) -> wvbridge_result;

pub type wvbridge_set_navigation_callback_fn = unsafe extern "C" fn(
    handle: wvbridge_handle,
    callback: wvbridge_navigation_callback,
    user_data: *mut c_void,
) -> wvbridge_result;
