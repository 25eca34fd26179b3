use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, AtomicUsize, Ordering};

use log::{debug, error, info, warn};

use crate::constants::SENTINEL_HANDLE;
use crate::error::SurfaceError;
use crate::native_surface::{Handle, NativeSurfaceService};

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Detached = 0,
    Attaching = 1,
    Attached = 2,
    /// Terminal for the current epoch. A later attach starts a new epoch.
    Closed = 3,
}

impl LifecycleState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => LifecycleState::Attaching,
            2 => LifecycleState::Attached,
            3 => LifecycleState::Closed,
            _ => LifecycleState::Detached,
        }
    }
}

/// Identifies one attach-to-close lifespan of a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Epoch(pub u64);

/// Lock-free snapshot of the lifecycle for readers on any thread.
///
/// Only the UI thread writes it. Readers off the UI thread may observe the
/// three fields from different instants; checks that gate mutation run on
/// the UI thread where the snapshot is always coherent.
#[derive(Debug)]
pub struct PublishedHandle {
    raw: AtomicUsize,
    state: AtomicU8,
    epoch: AtomicU64,
}

impl PublishedHandle {
    fn new() -> Self {
        Self {
            raw: AtomicUsize::new(SENTINEL_HANDLE),
            state: AtomicU8::new(LifecycleState::Detached as u8),
            epoch: AtomicU64::new(0),
        }
    }

    fn publish(&self, state: LifecycleState, handle: Option<Handle>, epoch: Epoch) {
        self.epoch.store(epoch.0, Ordering::SeqCst);
        self.raw
            .store(handle.map_or(SENTINEL_HANDLE, Handle::as_raw), Ordering::SeqCst);
        self.state.store(state as u8, Ordering::SeqCst);
    }

    /// The live handle, or `None` once closed.
    pub fn handle(&self) -> Option<Handle> {
        Handle::from_raw(self.raw.load(Ordering::SeqCst))
    }

    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn epoch(&self) -> Epoch {
        Epoch(self.epoch.load(Ordering::SeqCst))
    }

    /// The handle, provided the surface is currently attached.
    pub fn attached_handle(&self) -> Option<Handle> {
        if self.state() == LifecycleState::Attached {
            self.handle()
        } else {
            None
        }
    }

    /// Whether work tagged with `epoch` may still act on the surface.
    pub fn is_live(&self, epoch: Epoch) -> bool {
        self.state() == LifecycleState::Attached && self.epoch() == epoch
    }
}

/// Sole owner of the native handle and its state machine.
///
/// Every method is meant to run on the UI thread, which is what serializes
/// `create` against `destroy`.
pub struct HandleLifecycleManager {
    state: LifecycleState,
    handle: Option<Handle>,
    epoch: Epoch,
    published: Arc<PublishedHandle>,
}

impl HandleLifecycleManager {
    pub fn new() -> Self {
        Self {
            state: LifecycleState::Detached,
            handle: None,
            epoch: Epoch::default(),
            published: Arc::new(PublishedHandle::new()),
        }
    }

    pub fn published(&self) -> Arc<PublishedHandle> {
        self.published.clone()
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn handle(&self) -> Option<Handle> {
        self.handle
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    fn transition(&mut self, state: LifecycleState, handle: Option<Handle>) {
        debug!(
            "[Lifecycle] {:?} -> {:?} (epoch {})",
            self.state, state, self.epoch.0
        );
        self.state = state;
        self.handle = handle;
        self.published.publish(state, handle, self.epoch);
    }

    /// Starts a new epoch: creates the native surface and lets `install`
    /// register the per-epoch native callbacks before the handle is published.
    ///
    /// On failure the epoch is rolled back to `Detached`; a handle that was
    /// already created is destroyed exactly once.
    pub fn attach<F>(
        &mut self,
        service: &dyn NativeSurfaceService,
        install: F,
    ) -> Result<Handle, SurfaceError>
    where
        F: FnOnce(Handle, Epoch) -> Result<(), SurfaceError>,
    {
        match self.state {
            LifecycleState::Attaching | LifecycleState::Attached => {
                return Err(SurfaceError::InvalidState {
                    operation: "attach",
                    state: self.state,
                });
            }
            LifecycleState::Detached | LifecycleState::Closed => {}
        }

        self.epoch = Epoch(self.epoch.0 + 1);
        self.transition(LifecycleState::Attaching, None);

        let handle = match service.create() {
            Ok(handle) => handle,
            Err(e) => {
                error!("[Lifecycle] create failed for epoch {}: {}", self.epoch.0, e);
                self.transition(LifecycleState::Detached, None);
                return Err(e);
            }
        };

        if let Err(e) = install(handle, self.epoch) {
            error!(
                "[Lifecycle] Installing callbacks on {:#x} failed: {}",
                handle.as_raw(),
                e
            );
            if let Err(destroy_err) = service.destroy(handle) {
                warn!(
                    "[Lifecycle] destroy after failed attach also failed: {}",
                    destroy_err
                );
            }
            self.transition(LifecycleState::Detached, None);
            return Err(e);
        }

        self.transition(LifecycleState::Attached, Some(handle));
        info!(
            "[Lifecycle] Attached handle {:#x} (epoch {})",
            handle.as_raw(),
            self.epoch.0
        );
        Ok(handle)
    }

    /// Ends the current epoch. Returns `Ok(true)` when a handle was destroyed,
    /// `Ok(false)` when there was nothing to close.
    ///
    /// The handle is unpublished before `destroy` runs and is never handed to
    /// the native side again, even if `destroy` reports a failure.
    pub fn close(&mut self, service: &dyn NativeSurfaceService) -> Result<bool, SurfaceError> {
        let handle = match (self.state, self.handle) {
            (LifecycleState::Attached, Some(handle)) => handle,
            (state, _) => {
                debug!("[Lifecycle] close ignored while {:?}", state);
                return Ok(false);
            }
        };

        self.transition(LifecycleState::Closed, None);
        service.destroy(handle)?;
        info!(
            "[Lifecycle] Destroyed handle {:#x} (epoch {})",
            handle.as_raw(),
            self.epoch.0
        );
        Ok(true)
    }
}

impl Default for HandleLifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}
