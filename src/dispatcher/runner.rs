use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use log::{error, info};

use super::UiDispatcher;
use crate::constants::UI_THREAD_NAME;

/// A dedicated thread acting as the UI execution context, for hosts that do
/// not pump the dispatcher from their own event loop.
pub struct UiThreadRunner {
    dispatcher: UiDispatcher,
    join: Option<JoinHandle<()>>,
}

impl UiThreadRunner {
    /// Spawns a runner on a thread named `wvbridge-ui`.
    pub fn spawn_default() -> Result<Self> {
        Self::spawn(UI_THREAD_NAME)
    }

    pub fn spawn(name: &str) -> Result<Self> {
        let dispatcher = UiDispatcher::new();
        let loop_dispatcher = dispatcher.clone();

        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                info!("[UiRunner] UI thread started.");
                if let Err(e) = loop_dispatcher.run_until_shut_down() {
                    error!("[UiRunner] Run loop could not start: {}", e);
                }
                info!("[UiRunner] UI thread exiting.");
            })
            .with_context(|| format!("Failed to spawn UI thread '{}'", name))?;

        Ok(Self {
            dispatcher,
            join: Some(join),
        })
    }

    pub fn dispatcher(&self) -> UiDispatcher {
        self.dispatcher.clone()
    }

    /// Stops the run loop and waits for the thread to exit. Tasks still queued are dropped.
    pub fn shut_down(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.dispatcher.shut_down();
        if let Some(join) = self.join.take() {
            if join.thread().id() == thread::current().id() {
                return;
            }
            if join.join().is_err() {
                error!("[UiRunner] UI thread panicked while shutting down.");
            }
        }
    }
}

impl Drop for UiThreadRunner {
    fn drop(&mut self) {
        self.stop();
    }
}
