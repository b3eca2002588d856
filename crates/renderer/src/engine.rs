//! Contract between the render orchestrator and a map render engine.
//!
//! The engine is opaque: it loads a style document, asks a [`ResourceSource`]
//! for everything the style references, and produces a premultiplied RGBA
//! buffer. One engine instance serves exactly one render call.

use std::sync::Arc;

use async_trait::async_trait;
use map_common::{LngLat, RenderError, RenderResult, ResourceRequest, ResourceResponse};

/// Supplies resources (TileJSON, tiles, glyphs, sprites, images) to an engine.
///
/// Implementations must tolerate many concurrent calls for one render.
#[async_trait]
pub trait ResourceSource: Send + Sync {
    async fn request(&self, request: ResourceRequest) -> RenderResult<ResourceResponse>;
}

/// Options an engine is created with.
#[derive(Clone)]
pub struct EngineOptions {
    /// Where the engine fetches everything it needs
    pub source: Arc<dyn ResourceSource>,
    /// Device pixel ratio; output is `width * ratio` by `height * ratio`
    pub ratio: u32,
}

impl std::fmt::Debug for EngineOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineOptions")
            .field("ratio", &self.ratio)
            .finish_non_exhaustive()
    }
}

/// Physical pixel size of a `width` x `height` image at `ratio`.
pub fn physical_size(width: u32, height: u32, ratio: u32) -> RenderResult<(u32, u32)> {
    match (width.checked_mul(ratio), height.checked_mul(ratio)) {
        (Some(w), Some(h)) => Ok((w, h)),
        _ => Err(RenderError::RenderEngine(format!(
            "image size {width}x{height} at ratio {ratio} is too large"
        ))),
    }
}

/// A custom image made available to style layers under an id.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleImage {
    /// Straight (non-premultiplied) RGBA pixels
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f64,
    /// Signed distance field icon (recolourable)
    pub sdf: bool,
}

/// Camera for a single render.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineRenderOptions {
    pub zoom: f64,
    pub center: LngLat,
    /// Logical width in pixels, before the pixel ratio is applied
    pub width: u32,
    /// Logical height in pixels, before the pixel ratio is applied
    pub height: u32,
    pub bearing: f64,
    pub pitch: f64,
}

/// Raw engine output: premultiplied RGBA, 4 bytes per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl RawImage {
    /// Fully transparent image of the given physical size.
    pub fn transparent(width: u32, height: u32) -> Self {
        Self {
            data: vec![0; width as usize * height as usize * 4],
            width,
            height,
        }
    }
}

/// A render engine bound to one render call.
#[async_trait]
pub trait RenderEngine: Send {
    /// Parse the style and fetch what it references up front (sources, sprite).
    async fn load(&mut self, style: &serde_json::Value) -> RenderResult<()>;

    /// Register a custom image referenced by style layers.
    fn add_image(&mut self, id: &str, image: StyleImage) -> RenderResult<()>;

    /// Draw the loaded style for the given camera.
    async fn render(&mut self, options: EngineRenderOptions) -> RenderResult<RawImage>;

    /// Free engine resources. Must be safe to call more than once.
    fn release(&mut self);
}

/// Creates one engine per render call.
pub trait EngineFactory: Send + Sync {
    fn create(&self, options: EngineOptions) -> RenderResult<Box<dyn RenderEngine>>;
}
