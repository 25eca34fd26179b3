use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::time::Duration;

use log::{debug, error, info, trace, warn};

use super::geometry::{Geometry, GeometrySynchronizer};
use super::lifecycle::{Epoch, HandleLifecycleManager, LifecycleState, PublishedHandle};
use super::navigation::{NavigationHandlerRef, NavigationInterceptorChain};
use super::progress::{ProgressEventBroadcaster, ProgressListenerRef};
use crate::config::BridgeConfig;
use crate::constants::DEFAULT_NAVIGATION_PRIORITY;
use crate::dispatcher::{UiConfined, UiDispatcher};
use crate::error::{SurfaceError, panic_message};
use crate::host::{HostComponent, HostEvent};
use crate::native_surface::{Handle, NativeSurfaceService};

/// Receives every error the view recovers from locally.
pub type ErrorHandlerRef = Arc<dyn Fn(&SurfaceError) + Send + Sync + 'static>;

/// A native surface embedded in a host component.
///
/// Every public method may be called from any thread: the work is posted to
/// the UI dispatcher and performed there, in submission order per calling
/// thread. [`close`](Self::close) on the UI thread is the exception and runs
/// immediately. Clones share the same surface.
#[derive(Clone)]
pub struct EmbeddableSurfaceView {
    shared: Arc<SurfaceViewShared>,
}

struct SurfaceViewShared {
    dispatcher: UiDispatcher,
    service: Arc<dyn NativeSurfaceService>,
    host: Arc<dyn HostComponent>,
    published: Arc<PublishedHandle>,

    lifecycle: UiConfined<HandleLifecycleManager>,
    geometry: UiConfined<GeometrySynchronizer>,
    progress: UiConfined<ProgressEventBroadcaster>,
    navigation: UiConfined<NavigationInterceptorChain>,
    pending_loads: UiConfined<VecDeque<String>>,
    error_handler: UiConfined<Option<ErrorHandlerRef>>,

    navigation_reply_timeout: Duration,
    max_pending_loads: usize,
}

impl EmbeddableSurfaceView {
    pub fn new(
        dispatcher: UiDispatcher,
        service: Arc<dyn NativeSurfaceService>,
        host: Arc<dyn HostComponent>,
        config: &BridgeConfig,
    ) -> Self {
        let lifecycle = HandleLifecycleManager::new();
        let published = lifecycle.published();
        Self {
            shared: Arc::new(SurfaceViewShared {
                dispatcher,
                service,
                host,
                published,
                lifecycle: UiConfined::new(lifecycle),
                geometry: UiConfined::new(GeometrySynchronizer::new(
                    config.suppress_redundant_resize,
                )),
                progress: UiConfined::new(ProgressEventBroadcaster::new()),
                navigation: UiConfined::new(NavigationInterceptorChain::new()),
                pending_loads: UiConfined::new(VecDeque::new()),
                error_handler: UiConfined::new(None),
                navigation_reply_timeout: config.navigation_reply_timeout(),
                max_pending_loads: config.max_pending_loads.max(1),
            }),
        }
    }

    fn post<F>(&self, task: F) -> Result<(), SurfaceError>
    where
        F: FnOnce(&Arc<SurfaceViewShared>) + Send + 'static,
    {
        let shared = self.shared.clone();
        self.shared.dispatcher.post(move || task(&shared))
    }

    /// Routes a host toolkit notification. Detaching from the hierarchy closes the surface.
    pub fn handle_host_event(&self, event: HostEvent) -> Result<(), SurfaceError> {
        trace!("[SurfaceView] host event {:?}", event);
        match event {
            HostEvent::AttachedToHierarchy => self.attach(),
            HostEvent::DetachedFromHierarchy => self.close(),
            HostEvent::Resized | HostEvent::Moved => {
                let geometry = self.shared.host.geometry();
                self.post(move |shared| shared.sync_geometry(geometry, false))
            }
        }
    }

    /// Creates the native surface for a new epoch. Ignored while one is live.
    pub fn attach(&self) -> Result<(), SurfaceError> {
        self.post(|shared| shared.attach_on_ui())
    }

    /// Destroys the native surface. Idempotent and safe from any thread.
    ///
    /// On the UI thread the surface is closed before this returns, so tasks
    /// already queued for the old handle find it gone. Elsewhere it is posted.
    pub fn close(&self) -> Result<(), SurfaceError> {
        if self.shared.dispatcher.is_ui_thread() {
            self.shared.close_on_ui();
            return Ok(());
        }
        self.post(|shared| shared.close_on_ui())
    }

    /// Navigates to `url`, or queues it until the surface is attached.
    pub fn load_url(&self, url: impl Into<String>) -> Result<(), SurfaceError> {
        let url = url.into();
        self.post(move |shared| shared.load_url_on_ui(url))
    }

    pub fn add_progress_listener(&self, listener: ProgressListenerRef) -> Result<(), SurfaceError> {
        self.post(move |shared| {
            shared.progress.with(|p| p.subscribe(listener));
        })
    }

    pub fn remove_progress_listener(
        &self,
        listener: &ProgressListenerRef,
    ) -> Result<(), SurfaceError> {
        let listener = listener.clone();
        self.post(move |shared| {
            shared.progress.with(|p| p.unsubscribe(&listener));
        })
    }

    /// Registers a handler at the default priority (0).
    pub fn add_navigation_handler(&self, handler: NavigationHandlerRef) -> Result<(), SurfaceError> {
        self.add_navigation_handler_with_priority(DEFAULT_NAVIGATION_PRIORITY, handler)
    }

    /// Lower priorities are consulted first.
    pub fn add_navigation_handler_with_priority(
        &self,
        priority: i32,
        handler: NavigationHandlerRef,
    ) -> Result<(), SurfaceError> {
        self.post(move |shared| {
            shared.navigation.with(|n| n.register(priority, handler));
        })
    }

    pub fn remove_navigation_handler(
        &self,
        handler: &NavigationHandlerRef,
    ) -> Result<(), SurfaceError> {
        self.remove_navigation_handler_with_priority(DEFAULT_NAVIGATION_PRIORITY, handler)
    }

    pub fn remove_navigation_handler_with_priority(
        &self,
        priority: i32,
        handler: &NavigationHandlerRef,
    ) -> Result<(), SurfaceError> {
        let handler = handler.clone();
        self.post(move |shared| {
            shared.navigation.with(|n| n.unregister(priority, &handler));
        })
    }

    pub fn set_error_handler(&self, handler: Option<ErrorHandlerRef>) -> Result<(), SurfaceError> {
        self.post(move |shared| {
            shared.error_handler.with(|slot| *slot = handler);
        })
    }

    /// Last published lifecycle state.
    pub fn lifecycle_state(&self) -> LifecycleState {
        self.shared.published.state()
    }

    /// The live handle; `None` before attach and after close.
    pub fn handle(&self) -> Option<Handle> {
        self.shared.published.handle()
    }

    pub fn epoch(&self) -> Epoch {
        self.shared.published.epoch()
    }

    pub fn dispatcher(&self) -> &UiDispatcher {
        &self.shared.dispatcher
    }
}

impl SurfaceViewShared {
    fn report(&self, err: SurfaceError) {
        error!("[SurfaceView] {}", err);
        let Some(handler) = self.error_handler.with(|slot| slot.clone()) else {
            return;
        };
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handler(&err))) {
            error!(
                "[SurfaceView] Error handler panicked: {}",
                panic_message(payload.as_ref())
            );
        }
    }

    fn attach_on_ui(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let result = self.lifecycle.with(|lifecycle| {
            lifecycle.attach(self.service.as_ref(), |handle, epoch| {
                self.install_callbacks(&weak, handle, epoch)
            })
        });

        match result {
            Ok(handle) => {
                info!("[SurfaceView] Surface {:#x} attached.", handle.as_raw());
                self.sync_geometry(self.host.geometry(), true);
                self.host.request_repaint();
                self.replay_pending_loads(handle);
            }
            Err(SurfaceError::InvalidState { state, .. }) => {
                debug!("[SurfaceView] attach ignored while {:?}", state);
            }
            Err(e) => self.report(e),
        }
    }

    /// Registers the single native progress and navigation callbacks of `epoch`.
    /// Both only produce messages for the UI thread; they never touch state directly.
    fn install_callbacks(
        &self,
        weak: &Weak<SurfaceViewShared>,
        handle: Handle,
        epoch: Epoch,
    ) -> Result<(), SurfaceError> {
        let dispatcher = self.dispatcher.clone();
        let progress_target = weak.clone();
        self.service.set_progress_callback(
            handle,
            Box::new(move |progress: f32| {
                let target = progress_target.clone();
                let posted = dispatcher.post(move || {
                    if let Some(shared) = target.upgrade() {
                        shared.broadcast_progress(epoch, progress);
                    }
                });
                if posted.is_err() {
                    trace!("[SurfaceView] progress {} dropped: dispatcher gone", progress);
                }
            }),
        )?;

        let dispatcher = self.dispatcher.clone();
        let navigation_target = weak.clone();
        let timeout = self.navigation_reply_timeout;
        self.service.set_navigation_callback(
            handle,
            Box::new(move |url: &str| {
                let target = navigation_target.clone();
                let owned_url = url.to_string();
                let verdict = dispatcher.post_and_wait(timeout, move || {
                    target
                        .upgrade()
                        .is_some_and(|shared| shared.evaluate_navigation(epoch, &owned_url))
                });
                match verdict {
                    Ok(permitted) => permitted,
                    Err(e) => {
                        warn!("[SurfaceView] Denying navigation to '{}': {}", url, e);
                        false
                    }
                }
            }),
        )?;

        Ok(())
    }

    fn broadcast_progress(&self, epoch: Epoch, progress: f32) {
        if !self.published.is_live(epoch) {
            trace!("[SurfaceView] stale progress {} from epoch {}", progress, epoch.0);
            return;
        }
        let listeners = self.progress.with(|p| p.clone());
        for failure in listeners.broadcast(progress) {
            self.report(failure);
        }
    }

    fn evaluate_navigation(&self, epoch: Epoch, url: &str) -> bool {
        if !self.published.is_live(epoch) {
            debug!("[SurfaceView] stale navigation '{}' from epoch {}", url, epoch.0);
            return false;
        }
        let chain = self.navigation.with(|n| n.clone());
        let verdict = chain.evaluate_verbose(url);
        for failure in verdict.failures {
            self.report(failure);
        }
        verdict.permitted
    }

    /// Sends `geometry`, as read when the host reported it. Ignored unless attached.
    fn sync_geometry(&self, geometry: Geometry, force: bool) {
        let Some(handle) = self.published.attached_handle() else {
            debug!(
                "[Geometry] Ignoring geometry change while {:?}",
                self.published.state()
            );
            return;
        };
        let result = self
            .geometry
            .with(|g| g.synchronize(self.service.as_ref(), handle, geometry, force));
        if let Err(e) = result {
            self.report(e);
        }
    }

    fn load_url_on_ui(&self, url: String) {
        match self.published.attached_handle() {
            Some(handle) => self.navigate(handle, &url),
            None => {
                let state = self.published.state();
                let dropped = self.pending_loads.with(|queue| {
                    queue.push_back(url.clone());
                    if queue.len() > self.max_pending_loads {
                        queue.pop_front()
                    } else {
                        None
                    }
                });
                debug!("[SurfaceView] Queued '{}' until attached (currently {:?})", url, state);
                if let Some(old) = dropped {
                    warn!("[SurfaceView] Pending load queue full, dropped '{}'", old);
                }
            }
        }
    }

    fn navigate(&self, handle: Handle, url: &str) {
        debug!("[SurfaceView] navigate {:#x} -> {}", handle.as_raw(), url);
        if let Err(e) = self.service.navigate(handle, url) {
            self.report(e);
        }
    }

    fn replay_pending_loads(&self, handle: Handle) {
        let pending = self.pending_loads.with(std::mem::take);
        for url in pending {
            self.navigate(handle, &url);
        }
    }

    fn close_on_ui(&self) {
        let result = self
            .lifecycle
            .with(|lifecycle| lifecycle.close(self.service.as_ref()));
        self.geometry.with(GeometrySynchronizer::reset);

        match result {
            Ok(true) => info!("[SurfaceView] Surface closed."),
            Ok(false) => {
                let discarded = self.pending_loads.with(|queue| {
                    let n = queue.len();
                    queue.clear();
                    n
                });
                if discarded > 0 {
                    debug!("[SurfaceView] close discarded {} pending load(s)", discarded);
                }
            }
            Err(e) => self.report(e),
        }
    }
}
