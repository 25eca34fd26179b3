use std::collections::HashMap;
use std::ffi::{CStr, CString, c_char, c_void};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use log::{debug, error, warn};
use parking_lot::{Mutex, RwLock};

use super::{Handle, NativeSurfaceService, NavigationCallback, ProgressCallback, SurfaceDll};
use crate::bindings as b;
use crate::error::{SurfaceError, panic_message};
use crate::surface_view::geometry::Geometry;

/// Rust closures registered for one native handle. The native side receives a
/// borrowed pointer to this as `user_data`.
#[derive(Default)]
struct CallbackSlots {
    progress: RwLock<Option<ProgressCallback>>,
    navigation: RwLock<Option<NavigationCallback>>,
}

/// Callback slots per native handle.
#[derive(Default)]
struct CallbackRegistry {
    slots: Mutex<HashMap<usize, Arc<CallbackSlots>>>,
}

impl CallbackRegistry {
    fn slots_for(&self, raw: usize) -> Arc<CallbackSlots> {
        self.slots.lock().entry(raw).or_default().clone()
    }

    /// Drops the registry's hold on `raw`'s slots. When the native destroy
    /// failed the library may still call back, so the slots are leaked instead.
    fn release(&self, raw: usize, destroyed: bool) {
        let Some(slots) = self.slots.lock().remove(&raw) else {
            return;
        };
        if !destroyed {
            warn!(
                "[SurfaceDll] Keeping callbacks of {:#x} alive after a failed destroy.",
                raw
            );
            let _ = Box::leak(Box::new(slots));
        }
    }
}

/// [`NativeSurfaceService`] backed by the dynamically loaded `wvbridge` library.
pub struct DynamicSurfaceService {
    dll: Arc<SurfaceDll>,
    // Slots stay alive until `destroy` succeeds; the library promises no callbacks after that.
    callbacks: CallbackRegistry,
}

impl DynamicSurfaceService {
    pub fn new(dll: Arc<SurfaceDll>) -> Self {
        Self {
            dll,
            callbacks: CallbackRegistry::default(),
        }
    }
}

fn check(operation: &'static str, result: b::wvbridge_result) -> Result<(), SurfaceError> {
    if result == b::wvbridge_result_kSuccess {
        Ok(())
    } else {
        Err(SurfaceError::ForeignCallFailed {
            operation,
            detail: format!("native status {}", result),
        })
    }
}

unsafe extern "C" fn progress_trampoline(user_data: *mut c_void, progress: f32) {
    if user_data.is_null() {
        error!("[SurfaceDll] progress callback invoked with null user_data.");
        return;
    }
    let slots = unsafe { &*(user_data as *const CallbackSlots) };

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        if let Some(callback) = slots.progress.read().as_ref() {
            callback(progress);
        }
    }));
    if let Err(payload) = outcome {
        error!(
            "[SurfaceDll] progress callback panicked: {}",
            panic_message(payload.as_ref())
        );
    }
}

unsafe extern "C" fn navigation_trampoline(user_data: *mut c_void, url: *const c_char) -> bool {
    if user_data.is_null() {
        error!("[SurfaceDll] navigation callback invoked with null user_data.");
        return false;
    }
    if url.is_null() {
        error!("[SurfaceDll] navigation callback invoked with a null url.");
        return false;
    }
    let slots = unsafe { &*(user_data as *const CallbackSlots) };
    let url = unsafe { CStr::from_ptr(url) }.to_string_lossy();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        match slots.navigation.read().as_ref() {
            Some(callback) => callback(&url),
            None => true,
        }
    }));
    match outcome {
        Ok(permit) => permit,
        Err(payload) => {
            error!(
                "[SurfaceDll] navigation callback panicked for '{}': {}",
                url,
                panic_message(payload.as_ref())
            );
            false
        }
    }
}

impl NativeSurfaceService for DynamicSurfaceService {
    fn create(&self) -> Result<Handle, SurfaceError> {
        let raw = unsafe { (self.dll.wvbridge_create)() };
        let handle = Handle::from_raw(raw).ok_or(SurfaceError::CreateReturnedNull)?;
        debug!("[SurfaceDll] wvbridge_create -> {:#x}", raw);
        Ok(handle)
    }

    fn resize(&self, handle: Handle, geometry: Geometry) -> Result<(), SurfaceError> {
        let result = unsafe {
            (self.dll.wvbridge_resize)(
                handle.as_raw(),
                geometry.width,
                geometry.height,
                geometry.screen_x,
                geometry.screen_y,
            )
        };
        check("resize", result)
    }

    fn navigate(&self, handle: Handle, url: &str) -> Result<(), SurfaceError> {
        let c_url = CString::new(url).map_err(|e| SurfaceError::ForeignCallFailed {
            operation: "navigate",
            detail: format!("url contains an interior NUL: {}", e),
        })?;
        let result = unsafe { (self.dll.wvbridge_navigate)(handle.as_raw(), c_url.as_ptr()) };
        check("navigate", result)
    }

    fn destroy(&self, handle: Handle) -> Result<(), SurfaceError> {
        let result = unsafe { (self.dll.wvbridge_destroy)(handle.as_raw()) };
        let outcome = check("destroy", result);
        self.callbacks.release(handle.as_raw(), outcome.is_ok());
        outcome
    }

    fn set_progress_callback(
        &self,
        handle: Handle,
        callback: ProgressCallback,
    ) -> Result<(), SurfaceError> {
        let slots = self.callbacks.slots_for(handle.as_raw());
        *slots.progress.write() = Some(callback);
        let result = unsafe {
            (self.dll.wvbridge_set_progress_callback)(
                handle.as_raw(),
                Some(progress_trampoline),
                Arc::as_ptr(&slots) as *mut c_void,
            )
        };
        check("set_progress_callback", result)
    }

    fn set_navigation_callback(
        &self,
        handle: Handle,
        callback: NavigationCallback,
    ) -> Result<(), SurfaceError> {
        let slots = self.callbacks.slots_for(handle.as_raw());
        *slots.navigation.write() = Some(callback);
        let result = unsafe {
            (self.dll.wvbridge_set_navigation_callback)(
                handle.as_raw(),
                Some(navigation_trampoline),
                Arc::as_ptr(&slots) as *mut c_void,
            )
        };
        check("set_navigation_callback", result)
    }
}
