//! The render pipeline: validate, frame, load, draw, encode.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Instant;

use map_common::{RenderResult, Viewport};
use renderer::{EngineFactory, EngineOptions, EngineRenderOptions, RenderEngine};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::FetchConfig;
use crate::fetch::RemoteFetcher;
use crate::icons::load_images;
use crate::local_refs::check_local_archives;
use crate::resolver::ResourceResolver;
use crate::validation::{validate, RenderOptions, ValidatedRequest};

/// Releases the engine when the render call ends, however it ends.
struct EngineGuard(Box<dyn RenderEngine>);

impl Deref for EngineGuard {
    type Target = dyn RenderEngine;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl DerefMut for EngineGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0.as_mut()
    }
}

impl Drop for EngineGuard {
    fn drop(&mut self) {
        self.0.release();
    }
}

/// Runs render calls against engines from a factory.
///
/// Holds no per-render state; any number of renders may run concurrently.
#[derive(Clone)]
pub struct RenderOrchestrator {
    factory: Arc<dyn EngineFactory>,
    fetcher: RemoteFetcher,
}

impl RenderOrchestrator {
    pub fn new(factory: Arc<dyn EngineFactory>, config: FetchConfig) -> RenderResult<Self> {
        Ok(Self {
            factory,
            fetcher: RemoteFetcher::new(config)?,
        })
    }

    pub fn fetcher(&self) -> &RemoteFetcher {
        &self.fetcher
    }

    /// Render `style` to a PNG of `width * ratio` by `height * ratio` pixels.
    #[instrument(skip_all, fields(request_id = %Uuid::new_v4(), width = width, height = height))]
    pub async fn render(
        &self,
        style: Value,
        width: u32,
        height: u32,
        options: &RenderOptions,
    ) -> RenderResult<Vec<u8>> {
        let start = Instant::now();

        let request = validate(style, width, height, options)?;
        let viewport = request.viewport();
        if request.needs_viewport() {
            debug!(zoom = viewport.zoom, lng = viewport.center.lng, lat = viewport.center.lat, "Derived viewport from bounds");
        }

        check_local_archives(&request.style, request.tile_path.as_deref())?;

        let resolver = Arc::new(ResourceResolver::new(
            self.fetcher.clone(),
            request.tile_path.clone(),
            request.token.clone(),
            request.ratio,
        ));

        let result = self.draw(&request, viewport, resolver.clone()).await;
        resolver.close().await;

        match &result {
            Ok(png) => info!(
                zoom = viewport.zoom,
                lng = viewport.center.lng,
                lat = viewport.center.lat,
                ratio = request.ratio,
                bytes = png.len(),
                duration_ms = start.elapsed().as_millis() as u64,
                "Rendered map"
            ),
            Err(e) => warn!(
                error = %e,
                duration_ms = start.elapsed().as_millis() as u64,
                "Render failed"
            ),
        }
        result
    }

    async fn draw(
        &self,
        request: &ValidatedRequest,
        viewport: Viewport,
        resolver: Arc<ResourceResolver>,
    ) -> RenderResult<Vec<u8>> {
        let mut engine = EngineGuard(self.factory.create(EngineOptions {
            source: resolver,
            ratio: request.ratio,
        })?);

        engine.load(&request.style).await?;
        load_images(&mut *engine, &request.images, &self.fetcher).await?;

        let raw = engine
            .render(EngineRenderOptions {
                zoom: viewport.zoom,
                center: viewport.center,
                width: request.width,
                height: request.height,
                bearing: request.bearing,
                pitch: request.pitch,
            })
            .await?;
        drop(engine);

        let (width, height) = renderer::physical_size(request.width, request.height, request.ratio)?;
        renderer::encode(raw.data, width, height)
    }
}
