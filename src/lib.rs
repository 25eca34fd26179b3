//! Embeds a natively rendered surface (such as a web view) inside a host UI
//! toolkit's component tree.
//!
//! - Owns the opaque native handle and its attach/close lifecycle
//! - Funnels native callbacks, which arrive on arbitrary threads, onto the
//!   host's single UI thread
//! - Keeps the native surface's size and position in step with the host component
//! - Broadcasts load progress and runs navigation requests through a
//!   priority-ordered veto chain

pub mod api;
pub mod bindings;
pub mod config;
pub mod constants;
pub mod dispatcher;
pub mod error;
pub mod host;
pub mod native_surface;
pub mod surface_view;

use std::sync::Once;

use env_logger::{Builder, Env};

pub use api::open_surface_view;
pub use config::BridgeConfig;
pub use dispatcher::{UiDispatcher, UiThreadRunner};
pub use error::SurfaceError;
pub use host::{HostComponent, HostEvent, TrackedGeometry};
pub use native_surface::{Handle, NativeSurfaceService};
pub use surface_view::{
    EmbeddableSurfaceView, Geometry, LifecycleState, NavigationDecision, NavigationHandler,
};

// A host may open several views, or reopen one, in the same process; the
// global logger can only be installed once.
static LOGGER_INIT: Once = Once::new();

/// Installs `env_logger` once per process. `WVBRIDGE_LOG` takes precedence over `filter`.
pub fn init_logging(filter: &str) {
    LOGGER_INIT.call_once(|| {
        let env = Env::default()
            .filter_or(constants::ENV_LOG_FILTER, filter)
            .write_style("WVBRIDGE_LOG_STYLE");
        // Fails only when the host installed its own logger, which then wins.
        let _ = Builder::from_env(env).try_init();
    });
}
