//! Funnels work from arbitrary threads onto the single UI thread.
//!
//! The submission queue is the only structure touched concurrently. State that
//! lives behind a [`UiConfined`] cell is only reached from tasks running on the
//! bound UI thread, so it never sees contention.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use log::{error, trace, warn};
use parking_lot::Mutex;

use crate::error::{SurfaceError, panic_message};

pub mod runner;
pub mod task_queue;

pub use runner::UiThreadRunner;
pub use task_queue::{TaskQueueState, UiTask};

/// Handle for posting work to the UI thread. Cheap to clone and `Send + Sync`.
#[derive(Clone)]
pub struct UiDispatcher {
    state: Arc<TaskQueueState>,
}

impl UiDispatcher {
    pub fn new() -> Self {
        Self {
            state: Arc::new(TaskQueueState::new()),
        }
    }

    /// Declares the calling thread to be the UI thread. Binding is permanent;
    /// binding again from the same thread is a no-op.
    pub fn bind_to_current_thread(&self) -> Result<(), SurfaceError> {
        let current = std::thread::current().id();
        let bound = *self.state.ui_thread.get_or_init(|| current);
        if bound == current {
            Ok(())
        } else {
            Err(SurfaceError::NotOnUiThread)
        }
    }

    pub fn is_ui_thread(&self) -> bool {
        self.state.ui_thread.get() == Some(&std::thread::current().id())
    }

    /// Schedules `task` to run once on the UI thread. Tasks posted from one
    /// thread run in submission order.
    pub fn post<F>(&self, task: F) -> Result<(), SurfaceError>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.state.push(Box::new(task)) {
            Ok(())
        } else {
            warn!("[Dispatcher] Task rejected: dispatcher is shut down.");
            Err(SurfaceError::DispatcherShutDown)
        }
    }

    /// Runs `task` on the UI thread and waits for its result. Runs inline when
    /// already on the UI thread so a UI-thread caller can never deadlock on itself.
    pub fn post_and_wait<R, F>(&self, timeout: Duration, task: F) -> Result<R, SurfaceError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_ui_thread() {
            return Ok(task());
        }

        let (tx, rx) = mpsc::sync_channel(1);
        self.post(move || {
            let _ = tx.send(task());
        })?;

        rx.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => SurfaceError::DispatchTimedOut { waited: timeout },
            RecvTimeoutError::Disconnected => SurfaceError::TaskDropped,
        })
    }

    /// Runs queued tasks on the calling (UI) thread until the queue is empty,
    /// including tasks posted by the tasks themselves. Returns how many ran.
    ///
    /// For hosts that drive the dispatcher from their own event loop. The first
    /// call binds the calling thread if nothing is bound yet.
    pub fn run_pending(&self) -> Result<usize, SurfaceError> {
        self.bind_to_current_thread()?;
        let mut ran = 0;
        loop {
            let batch = self.state.take_batch();
            if batch.is_empty() {
                return Ok(ran);
            }
            for task in batch {
                run_task(task);
                ran += 1;
            }
        }
    }

    /// Blocks the calling thread, running tasks as they arrive, until
    /// [`shut_down`](Self::shut_down) is called.
    pub fn run_until_shut_down(&self) -> Result<(), SurfaceError> {
        self.bind_to_current_thread()?;
        loop {
            let batch = self.state.wait_batch();
            if batch.is_empty() {
                trace!("[Dispatcher] Run loop exiting.");
                return Ok(());
            }
            for task in batch {
                run_task(task);
            }
        }
    }

    /// Rejects further posts and drops queued tasks without running them.
    pub fn shut_down(&self) {
        let dropped = self.state.shut_down();
        if dropped > 0 {
            warn!("[Dispatcher] Shut down with {} queued task(s) dropped.", dropped);
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.state.is_shut_down()
    }

    pub fn pending_tasks(&self) -> usize {
        self.state.len()
    }
}

impl Default for UiDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn run_task(task: UiTask) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
        error!(
            "[Dispatcher] UI task panicked: {}",
            panic_message(payload.as_ref())
        );
    }
}

/// State owned by the UI thread.
///
/// The lock only exists to satisfy `Sync`; every access happens from a UI task.
/// Access is scoped to a closure so no borrow outlives the task step that needs it.
pub struct UiConfined<T> {
    inner: Mutex<T>,
}

impl<T> UiConfined<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn run_pending_drains_nested_posts() {
        let dispatcher = UiDispatcher::new();
        let count = Arc::new(AtomicUsize::new(0));

        let inner_dispatcher = dispatcher.clone();
        let inner_count = count.clone();
        dispatcher
            .post(move || {
                inner_count.fetch_add(1, Ordering::SeqCst);
                let c = inner_count.clone();
                inner_dispatcher
                    .post(move || {
                        c.fetch_add(1, Ordering::SeqCst);
                    })
                    .unwrap();
            })
            .unwrap();

        assert_eq!(dispatcher.run_pending().unwrap(), 2);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn panicking_task_does_not_stop_the_queue() {
        let dispatcher = UiDispatcher::new();
        let ran = Arc::new(AtomicUsize::new(0));
        dispatcher.post(|| panic!("boom")).unwrap();
        let r = ran.clone();
        dispatcher
            .post(move || {
                r.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        assert_eq!(dispatcher.run_pending().unwrap(), 2);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn post_and_wait_runs_inline_on_ui_thread() {
        let dispatcher = UiDispatcher::new();
        dispatcher.bind_to_current_thread().unwrap();
        let answer = dispatcher
            .post_and_wait(Duration::from_millis(10), || 42)
            .unwrap();
        assert_eq!(answer, 42);
        assert_eq!(dispatcher.pending_tasks(), 0);
    }

    #[test]
    fn post_and_wait_from_other_thread_is_answered_by_ui_thread() {
        let dispatcher = UiDispatcher::new();
        dispatcher.bind_to_current_thread().unwrap();

        let remote = dispatcher.clone();
        let worker = std::thread::spawn(move || {
            remote.post_and_wait(Duration::from_secs(5), || std::thread::current().id())
        });

        let ui_id = std::thread::current().id();
        while !worker.is_finished() {
            dispatcher.run_pending().unwrap();
            std::thread::yield_now();
        }
        assert_eq!(worker.join().unwrap().unwrap(), ui_id);
    }

    #[test]
    fn post_and_wait_times_out_without_a_ui_thread() {
        let dispatcher = UiDispatcher::new();
        let err = dispatcher
            .post_and_wait(Duration::from_millis(20), || ())
            .unwrap_err();
        assert_eq!(
            err,
            SurfaceError::DispatchTimedOut {
                waited: Duration::from_millis(20)
            }
        );
    }

    #[test]
    fn second_thread_cannot_bind() {
        let dispatcher = UiDispatcher::new();
        dispatcher.bind_to_current_thread().unwrap();
        let other = dispatcher.clone();
        let result = std::thread::spawn(move || other.bind_to_current_thread())
            .join()
            .unwrap();
        assert_eq!(result, Err(SurfaceError::NotOnUiThread));
    }

    #[test]
    fn posts_after_shut_down_are_rejected() {
        let dispatcher = UiDispatcher::new();
        dispatcher.shut_down();
        assert_eq!(dispatcher.post(|| {}), Err(SurfaceError::DispatcherShutDown));
    }
}
