use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use log::{error, warn};

use crate::error::{SurfaceError, panic_message};

/// Observer of page-load progress in `[0, 1]`.
pub type ProgressListenerRef = Arc<dyn Fn(f32) + Send + Sync + 'static>;

fn same_listener(a: &ProgressListenerRef, b: &ProgressListenerRef) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Set of progress observers, deduplicated by `Arc` identity.
#[derive(Clone, Default)]
pub struct ProgressEventBroadcaster {
    listeners: Vec<ProgressListenerRef>,
}

impl ProgressEventBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the listener was already subscribed.
    pub fn subscribe(&mut self, listener: ProgressListenerRef) -> bool {
        if self.listeners.iter().any(|l| same_listener(l, &listener)) {
            return false;
        }
        self.listeners.push(listener);
        true
    }

    pub fn unsubscribe(&mut self, listener: &ProgressListenerRef) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| !same_listener(l, listener));
        self.listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Notifies every listener once. A panicking listener does not stop the
    /// others; each panic comes back as a [`SurfaceError::ListenerPanicked`].
    pub fn broadcast(&self, progress: f32) -> Vec<SurfaceError> {
        if !progress.is_finite() {
            warn!("[Progress] Dropping non-finite progress value {}", progress);
            return Vec::new();
        }
        let progress = progress.clamp(0.0, 1.0);

        let mut failures = Vec::new();
        for listener in &self.listeners {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| listener(progress))) {
                let detail = panic_message(payload.as_ref());
                error!("[Progress] Listener panicked at {:.2}: {}", progress, detail);
                failures.push(SurfaceError::ListenerPanicked {
                    listener: "progress listener",
                    detail,
                });
            }
        }
        failures
    }
}
