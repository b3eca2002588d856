//! Static map rendering.
//!
//! Turns a style document plus camera parameters into a PNG:
//!
//! - `validation`: parameter rules, applied in a fixed order
//! - `resolver`: serves engine resource requests from remote hosts, hosted
//!   `mapbox://` APIs and local `mbtiles://` archives
//! - `icons`: custom images registered before drawing
//! - `orchestrator`: one render call end to end

use std::sync::Arc;

use renderer::MosaicEngineFactory;
use serde_json::Value;

pub mod config;
pub mod fetch;
pub mod icons;
pub mod local_refs;
pub mod mapbox;
pub mod orchestrator;
pub mod resolver;
pub mod validation;

pub use config::FetchConfig;
pub use fetch::RemoteFetcher;
pub use map_common::{RenderError, RenderResult};
pub use orchestrator::RenderOrchestrator;
pub use resolver::ResourceResolver;
pub use validation::{validate, ImageSpec, RenderOptions, ValidatedRequest};

/// Render `style` with the built-in engine and environment configuration.
pub async fn render(
    style: Value,
    width: u32,
    height: u32,
    options: &RenderOptions,
) -> RenderResult<Vec<u8>> {
    let orchestrator = RenderOrchestrator::new(
        Arc::new(MosaicEngineFactory),
        FetchConfig::from_env(),
    )?;
    orchestrator.render(style, width, height, options).await
}
