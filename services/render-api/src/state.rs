//! Application state and shared resources.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use map_render::{FetchConfig, RenderOrchestrator};
use metrics_exporter_prometheus::PrometheusHandle;
use renderer::{EngineFactory, MosaicEngineFactory};
use tokio::sync::Semaphore;
use tracing::info;

use crate::metrics;
use crate::overlay::OverlayStore;

/// Server settings, resolved from flags and environment by the binary.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Directory of `<name>.mbtiles` archives
    pub tile_path: Option<PathBuf>,
    /// Directory of `.geojson` / `.gpx` overlay files
    pub overlay_path: Option<PathBuf>,
    /// Hosted map API token used when a request brings none
    pub token: Option<String>,
    pub max_concurrent_renders: usize,
    pub fetch: FetchConfig,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            tile_path: None,
            overlay_path: None,
            token: None,
            max_concurrent_renders: num_cpus::get(),
            fetch: FetchConfig::default(),
        }
    }
}

/// Shared application state.
pub struct AppState {
    pub orchestrator: RenderOrchestrator,
    pub overlays: OverlayStore,
    pub tile_path: Option<PathBuf>,
    pub token: Option<String>,
    /// Bounds the number of renders running at once
    pub render_permits: Semaphore,
    pub renders_in_flight: AtomicUsize,
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    /// State rendering with the built-in engine.
    pub fn new(options: ServerOptions, prometheus: Option<PrometheusHandle>) -> Result<Self> {
        Self::with_factory(options, Arc::new(MosaicEngineFactory), prometheus)
    }

    pub fn with_factory(
        options: ServerOptions,
        factory: Arc<dyn EngineFactory>,
        prometheus: Option<PrometheusHandle>,
    ) -> Result<Self> {
        if let Some(tile_path) = &options.tile_path {
            if !tile_path.is_dir() {
                bail!(
                    "Path to mbtiles files does not exist: {}",
                    tile_path.display()
                );
            }
            info!(path = %tile_path.display(), "Using local mbtiles");
        }

        let overlays = match &options.overlay_path {
            Some(path) => OverlayStore::load_dir(path)?,
            None => OverlayStore::default(),
        };

        let orchestrator = RenderOrchestrator::new(factory, options.fetch.clone())
            .context("failed to create render orchestrator")?;

        Ok(Self {
            orchestrator,
            overlays,
            tile_path: options.tile_path,
            token: options.token.filter(|t| !t.is_empty()),
            render_permits: Semaphore::new(options.max_concurrent_renders.max(1)),
            renders_in_flight: AtomicUsize::new(0),
            prometheus,
        })
    }

    /// Count a render as in flight until the returned guard is dropped.
    pub fn begin_render(&self) -> InFlightRender<'_> {
        let count = self.renders_in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        metrics::set_renders_in_flight(count);
        InFlightRender { counter: &self.renders_in_flight }
    }
}

/// Decrements the in-flight render count on drop, including when the request
/// future is cancelled mid-render.
pub struct InFlightRender<'a> {
    counter: &'a AtomicUsize,
}

impl Drop for InFlightRender<'_> {
    fn drop(&mut self) {
        let count = self.counter.fetch_sub(1, Ordering::Relaxed) - 1;
        metrics::set_renders_in_flight(count);
    }
}
