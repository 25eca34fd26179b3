use std::sync::Arc;

use anyhow::{Context, Result};
use log::info;

use crate::config::BridgeConfig;
use crate::dispatcher::UiDispatcher;
use crate::host::HostComponent;
use crate::init_logging;
use crate::native_surface::{DynamicSurfaceService, SurfaceDll};
use crate::surface_view::EmbeddableSurfaceView;

/// Loads the native surface library described by `config` and returns a view
/// bound to `dispatcher`.
///
/// The view stays `Detached` until the host reports
/// [`HostEvent::AttachedToHierarchy`](crate::host::HostEvent::AttachedToHierarchy)
/// or [`attach`](EmbeddableSurfaceView::attach) is called.
///
/// # Arguments
/// * `config`: Library location, log filter and view tuning.
/// * `dispatcher`: The host's UI execution context.
/// * `host`: The component the surface is laid over.
pub fn open_surface_view(
    config: &BridgeConfig,
    dispatcher: UiDispatcher,
    host: Arc<dyn HostComponent>,
) -> Result<EmbeddableSurfaceView> {
    init_logging(&config.log_filter);

    let dll = SurfaceDll::get_for(config.library_dir.as_deref(), &config.library_name)
        .context("Native surface library is unavailable")?;
    info!("[BridgeAPI] Using native surface library {}", dll.path.display());

    let service = Arc::new(DynamicSurfaceService::new(dll));
    Ok(EmbeddableSurfaceView::new(dispatcher, service, host, config))
}
