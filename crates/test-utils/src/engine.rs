//! A render engine that records its calls.
//!
//! During `load` it issues a scripted list of resource requests through the
//! resolver it was created with, so tests can drive resolution end to end
//! without a real engine.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use map_common::{RenderError, RenderResult, ResourceRequest};
use renderer::{
    EngineFactory, EngineOptions, EngineRenderOptions, RawImage, RenderEngine, ResourceSource,
    StyleImage,
};

/// Everything the engines created by one factory were asked to do.
#[derive(Debug, Default, Clone)]
pub struct EngineLog {
    pub created: usize,
    pub loads: usize,
    pub images: Vec<(String, u32, u32, f64, bool)>,
    pub renders: Vec<EngineRenderOptions>,
    pub released: usize,
    /// Data length (or `None` for empty) for every scripted request
    pub responses: Vec<Option<usize>>,
}

#[derive(Clone, Default)]
pub struct RecordingEngineFactory {
    log: Arc<Mutex<EngineLog>>,
    requests: Vec<ResourceRequest>,
    fail_render: bool,
}

impl RecordingEngineFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests each engine issues while loading a style.
    pub fn with_requests(mut self, requests: Vec<ResourceRequest>) -> Self {
        self.requests = requests;
        self
    }

    /// Make every `render` call fail.
    pub fn failing_render(mut self) -> Self {
        self.fail_render = true;
        self
    }

    pub fn log(&self) -> EngineLog {
        self.log.lock().expect("engine log lock").clone()
    }
}

impl EngineFactory for RecordingEngineFactory {
    fn create(&self, options: EngineOptions) -> RenderResult<Box<dyn RenderEngine>> {
        self.log.lock().expect("engine log lock").created += 1;
        Ok(Box::new(RecordingEngine {
            source: options.source,
            ratio: options.ratio,
            log: self.log.clone(),
            requests: self.requests.clone(),
            fail_render: self.fail_render,
        }))
    }
}

struct RecordingEngine {
    source: Arc<dyn ResourceSource>,
    ratio: u32,
    log: Arc<Mutex<EngineLog>>,
    requests: Vec<ResourceRequest>,
    fail_render: bool,
}

#[async_trait]
impl RenderEngine for RecordingEngine {
    async fn load(&mut self, _style: &serde_json::Value) -> RenderResult<()> {
        self.log.lock().expect("engine log lock").loads += 1;
        for request in self.requests.clone() {
            let response = self.source.request(request).await?;
            let len = response.data().map(|d| d.len());
            self.log.lock().expect("engine log lock").responses.push(len);
        }
        Ok(())
    }

    fn add_image(&mut self, id: &str, image: StyleImage) -> RenderResult<()> {
        self.log.lock().expect("engine log lock").images.push((
            id.to_string(),
            image.width,
            image.height,
            image.pixel_ratio,
            image.sdf,
        ));
        Ok(())
    }

    async fn render(&mut self, options: EngineRenderOptions) -> RenderResult<RawImage> {
        self.log.lock().expect("engine log lock").renders.push(options);
        if self.fail_render {
            return Err(RenderError::RenderEngine("scripted render failure".to_string()));
        }
        Ok(RawImage::transparent(
            options.width * self.ratio,
            options.height * self.ratio,
        ))
    }

    fn release(&mut self) {
        self.log.lock().expect("engine log lock").released += 1;
    }
}
