//! The host toolkit side of the bridge.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::surface_view::geometry::Geometry;

/// Notifications the host toolkit forwards to an embedded view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    /// The component became part of a displayable hierarchy.
    AttachedToHierarchy,
    /// The component was removed from its displayable ancestor chain.
    DetachedFromHierarchy,
    Resized,
    Moved,
}

/// The host component the native surface is laid over.
pub trait HostComponent: Send + Sync {
    /// Current size and absolute on-screen position.
    fn geometry(&self) -> Geometry;

    /// Asks the host to re-layout and repaint the component.
    fn request_repaint(&self) {}
}

impl<F> HostComponent for F
where
    F: Fn() -> Geometry + Send + Sync,
{
    fn geometry(&self) -> Geometry {
        self()
    }
}

/// A [`HostComponent`] whose geometry is pushed in by the host, for toolkits
/// that report placement through events rather than queries.
#[derive(Debug, Default)]
pub struct TrackedGeometry {
    current: Mutex<Geometry>,
    repaints: AtomicUsize,
}

impl TrackedGeometry {
    pub fn new(initial: Geometry) -> Self {
        Self {
            current: Mutex::new(initial),
            repaints: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, geometry: Geometry) {
        *self.current.lock() = geometry;
    }

    /// Number of repaint requests received so far.
    pub fn repaint_requests(&self) -> usize {
        self.repaints.load(Ordering::SeqCst)
    }
}

impl HostComponent for TrackedGeometry {
    fn geometry(&self) -> Geometry {
        *self.current.lock()
    }

    fn request_repaint(&self) {
        self.repaints.fetch_add(1, Ordering::SeqCst);
    }
}
