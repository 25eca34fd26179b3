use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::ThreadId;

use once_cell::sync::OnceCell;
use parking_lot::{Condvar, Mutex};

/// A unit of work destined for the UI thread.
pub type UiTask = Box<dyn FnOnce() + Send + 'static>;

/// Shared submission queue. Any thread may push; only the bound UI thread pops.
pub struct TaskQueueState {
    pub(crate) queue: Mutex<VecDeque<UiTask>>,
    pub(crate) condvar: Condvar,
    pub(crate) ui_thread: OnceCell<ThreadId>,
    pub(crate) shut_down: AtomicBool,
}

impl TaskQueueState {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            condvar: Condvar::new(),
            ui_thread: OnceCell::new(),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Appends a task. Returns `false` once the queue has been shut down.
    pub fn push(&self, task: UiTask) -> bool {
        let mut queue = self.queue.lock();
        if self.is_shut_down() {
            return false;
        }
        queue.push_back(task);
        self.condvar.notify_one();
        true
    }

    /// Takes everything queued so far, leaving the queue empty.
    pub fn take_batch(&self) -> VecDeque<UiTask> {
        std::mem::take(&mut *self.queue.lock())
    }

    /// Blocks until tasks are available or the queue is shut down.
    /// An empty batch means shutdown.
    pub fn wait_batch(&self) -> VecDeque<UiTask> {
        let mut queue = self.queue.lock();
        while queue.is_empty() && !self.is_shut_down() {
            self.condvar.wait(&mut queue);
        }
        if self.is_shut_down() {
            return VecDeque::new();
        }
        std::mem::take(&mut *queue)
    }

    /// Stops accepting tasks and drops whatever is still queued.
    pub fn shut_down(&self) -> usize {
        let dropped = {
            let mut queue = self.queue.lock();
            self.shut_down.store(true, Ordering::SeqCst);
            std::mem::take(&mut *queue)
        };
        self.condvar.notify_all();
        dropped.len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }
}

impl Default for TaskQueueState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn batches_preserve_submission_order() {
        let state = TaskQueueState::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let order = order.clone();
            assert!(state.push(Box::new(move || order.lock().push(i))));
        }
        for task in state.take_batch() {
            task();
        }
        assert_eq!(*order.lock(), vec![0, 1, 2]);
        assert_eq!(state.len(), 0);
    }

    #[test]
    fn shut_down_rejects_and_drops() {
        let state = TaskQueueState::new();
        assert!(state.push(Box::new(|| {})));
        assert_eq!(state.shut_down(), 1);
        assert!(!state.push(Box::new(|| {})));
        assert!(state.wait_batch().is_empty());
    }
}
