use log::{debug, trace};

use crate::error::SurfaceError;
use crate::native_surface::{Handle, NativeSurfaceService};

/// Size and absolute screen position of the host component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Geometry {
    pub width: i32,
    pub height: i32,
    pub screen_x: i32,
    pub screen_y: i32,
}

impl Geometry {
    pub fn new(width: i32, height: i32, screen_x: i32, screen_y: i32) -> Self {
        Self {
            width,
            height,
            screen_x,
            screen_y,
        }
    }
}

/// Replays host geometry to the native surface.
pub struct GeometrySynchronizer {
    last_sent: Option<Geometry>,
    suppress_redundant: bool,
}

impl GeometrySynchronizer {
    pub fn new(suppress_redundant: bool) -> Self {
        Self {
            last_sent: None,
            suppress_redundant,
        }
    }

    pub fn last_sent(&self) -> Option<Geometry> {
        self.last_sent
    }

    /// Sends `geometry` unless it equals the last geometry sent and `force` is unset.
    /// Returns whether a foreign `resize` was issued. A failed call leaves the
    /// recorded geometry untouched.
    pub fn synchronize(
        &mut self,
        service: &dyn NativeSurfaceService,
        handle: Handle,
        geometry: Geometry,
        force: bool,
    ) -> Result<bool, SurfaceError> {
        if !force && self.suppress_redundant && self.last_sent == Some(geometry) {
            trace!("[Geometry] Unchanged {:?}, skipping resize.", geometry);
            return Ok(false);
        }

        debug!(
            "[Geometry] resize {:#x}: width={}, height={}, x={}, y={}",
            handle.as_raw(),
            geometry.width,
            geometry.height,
            geometry.screen_x,
            geometry.screen_y
        );
        service.resize(handle, geometry)?;
        self.last_sent = Some(geometry);
        Ok(true)
    }

    /// Forgets the last geometry; the next epoch starts from nothing.
    pub fn reset(&mut self) {
        self.last_sent = None;
    }
}
