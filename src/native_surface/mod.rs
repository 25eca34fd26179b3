//! The foreign-function boundary to the native rendering service.
//!
//! Everything behind [`NativeSurfaceService`] is outside this crate's control:
//! calls may block, and callbacks may arrive on any thread, at any time up to
//! the matching `destroy`.

use std::num::NonZeroUsize;

use crate::error::SurfaceError;
use crate::surface_view::geometry::Geometry;

pub mod dynamic_service;
pub mod dynamic_surface_dll_loader;

pub use dynamic_service::DynamicSurfaceService;
pub use dynamic_surface_dll_loader::SurfaceDll;

/// A live native surface.
///
/// The sentinel value `0` has no `Handle` representation, so a foreign call can
/// never be issued against "no surface".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(NonZeroUsize);

impl Handle {
    /// Wraps a raw value returned by the native library; `None` for the sentinel.
    pub fn from_raw(raw: usize) -> Option<Self> {
        NonZeroUsize::new(raw).map(Handle)
    }

    pub fn as_raw(self) -> usize {
        self.0.get()
    }
}

/// Native progress callback. Invoked on arbitrary native threads.
pub type ProgressCallback = Box<dyn Fn(f32) + Send + Sync + 'static>;

/// Native navigation callback; `true` permits the navigation. Invoked on
/// arbitrary native threads and must answer synchronously.
pub type NavigationCallback = Box<dyn Fn(&str) -> bool + Send + Sync + 'static>;

/// Operations exposed by the native surface.
pub trait NativeSurfaceService: Send + Sync {
    /// Creates a surface. Implementations map the sentinel to
    /// [`SurfaceError::CreateReturnedNull`].
    fn create(&self) -> Result<Handle, SurfaceError>;

    fn resize(&self, handle: Handle, geometry: Geometry) -> Result<(), SurfaceError>;

    fn navigate(&self, handle: Handle, url: &str) -> Result<(), SurfaceError>;

    /// Must be called at most once per handle.
    fn destroy(&self, handle: Handle) -> Result<(), SurfaceError>;

    fn set_progress_callback(
        &self,
        handle: Handle,
        callback: ProgressCallback,
    ) -> Result<(), SurfaceError>;

    fn set_navigation_callback(
        &self,
        handle: Handle,
        callback: NavigationCallback,
    ) -> Result<(), SurfaceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_has_no_handle() {
        assert_eq!(Handle::from_raw(0), None);
        assert_eq!(Handle::from_raw(42).map(Handle::as_raw), Some(42));
    }
}
