#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use wvbridge::native_surface::{NavigationCallback, ProgressCallback};
use wvbridge::surface_view::ErrorHandlerRef;
use wvbridge::{
    BridgeConfig, EmbeddableSurfaceView, Geometry, Handle, NativeSurfaceService, SurfaceError,
    TrackedGeometry, UiDispatcher,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create(usize),
    Resize(usize, Geometry),
    Navigate(usize, String),
    Destroy(usize),
    SetProgressCallback(usize),
    SetNavigationCallback(usize),
}

/// In-process stand-in for the native library. Records every call and flags
/// any use of a handle that was never created or already destroyed.
#[derive(Default)]
pub struct RecordingSurfaceService {
    next: AtomicUsize,
    pub fail_create: AtomicBool,
    pub fail_resize: AtomicBool,
    calls: Mutex<Vec<Call>>,
    live: Mutex<HashSet<usize>>,
    violations: Mutex<Vec<String>>,
    progress: Mutex<HashMap<usize, Arc<dyn Fn(f32) + Send + Sync>>>,
    navigation: Mutex<HashMap<usize, Arc<dyn Fn(&str) -> bool + Send + Sync>>>,
}

impl RecordingSurfaceService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next: AtomicUsize::new(0x1000),
            ..Default::default()
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }

    pub fn violations(&self) -> Vec<String> {
        self.violations.lock().clone()
    }

    pub fn created(&self) -> Vec<usize> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                Call::Create(h) => Some(*h),
                _ => None,
            })
            .collect()
    }

    pub fn destroyed(&self) -> Vec<usize> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                Call::Destroy(h) => Some(*h),
                _ => None,
            })
            .collect()
    }

    pub fn resizes(&self) -> Vec<Geometry> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                Call::Resize(_, g) => Some(*g),
                _ => None,
            })
            .collect()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                Call::Navigate(_, url) => Some(url.clone()),
                _ => None,
            })
            .collect()
    }

    /// Simulates the native side reporting progress, from whichever thread calls this.
    /// Callbacks stay reachable after destroy so late deliveries can be simulated.
    pub fn fire_progress(&self, raw: usize, progress: f32) {
        let callback = self.progress.lock().get(&raw).cloned();
        if let Some(callback) = callback {
            callback(progress);
        }
    }

    /// Simulates the native side asking whether it may navigate.
    pub fn fire_navigation(&self, raw: usize, url: &str) -> Option<bool> {
        let callback = self.navigation.lock().get(&raw).cloned();
        callback.map(|callback| callback(url))
    }

    fn use_handle(&self, operation: &str, handle: Handle) {
        if !self.live.lock().contains(&handle.as_raw()) {
            self.violations.lock().push(format!(
                "{} on dead handle {:#x}",
                operation,
                handle.as_raw()
            ));
        }
    }
}

impl NativeSurfaceService for RecordingSurfaceService {
    fn create(&self) -> Result<Handle, SurfaceError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(SurfaceError::CreateReturnedNull);
        }
        let raw = self.next.fetch_add(1, Ordering::SeqCst);
        self.live.lock().insert(raw);
        self.calls.lock().push(Call::Create(raw));
        Ok(Handle::from_raw(raw).unwrap())
    }

    fn resize(&self, handle: Handle, geometry: Geometry) -> Result<(), SurfaceError> {
        self.use_handle("resize", handle);
        if self.fail_resize.load(Ordering::SeqCst) {
            return Err(SurfaceError::ForeignCallFailed {
                operation: "resize",
                detail: "native status 5".into(),
            });
        }
        self.calls.lock().push(Call::Resize(handle.as_raw(), geometry));
        Ok(())
    }

    fn navigate(&self, handle: Handle, url: &str) -> Result<(), SurfaceError> {
        self.use_handle("navigate", handle);
        self.calls
            .lock()
            .push(Call::Navigate(handle.as_raw(), url.to_string()));
        Ok(())
    }

    fn destroy(&self, handle: Handle) -> Result<(), SurfaceError> {
        if !self.live.lock().remove(&handle.as_raw()) {
            self.violations.lock().push(format!(
                "destroy of unknown or destroyed handle {:#x}",
                handle.as_raw()
            ));
        }
        self.calls.lock().push(Call::Destroy(handle.as_raw()));
        Ok(())
    }

    fn set_progress_callback(
        &self,
        handle: Handle,
        callback: ProgressCallback,
    ) -> Result<(), SurfaceError> {
        self.use_handle("set_progress_callback", handle);
        self.progress.lock().insert(handle.as_raw(), Arc::from(callback));
        self.calls
            .lock()
            .push(Call::SetProgressCallback(handle.as_raw()));
        Ok(())
    }

    fn set_navigation_callback(
        &self,
        handle: Handle,
        callback: NavigationCallback,
    ) -> Result<(), SurfaceError> {
        self.use_handle("set_navigation_callback", handle);
        self.navigation.lock().insert(handle.as_raw(), Arc::from(callback));
        self.calls
            .lock()
            .push(Call::SetNavigationCallback(handle.as_raw()));
        Ok(())
    }
}

/// A view wired to a recording service and a dispatcher pumped by the test thread.
pub struct Harness {
    pub dispatcher: UiDispatcher,
    pub service: Arc<RecordingSurfaceService>,
    pub host: Arc<TrackedGeometry>,
    pub view: EmbeddableSurfaceView,
    pub errors: Arc<Mutex<Vec<SurfaceError>>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(&BridgeConfig::default())
    }

    pub fn with_config(config: &BridgeConfig) -> Self {
        let dispatcher = UiDispatcher::new();
        dispatcher.bind_to_current_thread().unwrap();

        let service = RecordingSurfaceService::new();
        let host = Arc::new(TrackedGeometry::new(Geometry::new(800, 600, 100, 50)));
        let view = EmbeddableSurfaceView::new(
            dispatcher.clone(),
            service.clone(),
            host.clone(),
            config,
        );

        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = errors.clone();
        let handler: ErrorHandlerRef = Arc::new(move |e: &SurfaceError| sink.lock().push(e.clone()));
        view.set_error_handler(Some(handler)).unwrap();

        let harness = Self {
            dispatcher,
            service,
            host,
            view,
            errors,
        };
        harness.pump();
        harness
    }

    /// Runs everything queued on the UI thread (the test thread).
    pub fn pump(&self) -> usize {
        self.dispatcher.run_pending().unwrap()
    }

    pub fn attached(&self) -> Handle {
        self.view.attach().unwrap();
        self.pump();
        self.view.handle().expect("view should be attached")
    }

    pub fn errors(&self) -> Vec<SurfaceError> {
        self.errors.lock().clone()
    }

    /// Runs `work` on another thread while pumping the UI queue, so blocking
    /// callbacks on that thread can be answered.
    pub fn pump_while<T, F>(&self, work: F) -> T
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let worker = std::thread::spawn(work);
        while !worker.is_finished() {
            self.pump();
            std::thread::yield_now();
        }
        self.pump();
        worker.join().unwrap()
    }
}
