//! Loading custom icon images into an engine before rendering.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use futures::future::try_join_all;
use map_common::{RenderError, RenderResult};
use renderer::decode::DecodedImage;
use renderer::{RenderEngine, StyleImage};
use tracing::{debug, instrument};

use crate::fetch::RemoteFetcher;
use crate::validation::ImageSpec;

const BASE64_MARKER: &str = "base64,";

/// Fetch and decode every image, then register them all with the engine.
///
/// All images load concurrently. The first failure aborts the batch and
/// nothing is registered.
#[instrument(skip_all, fields(count = images.len()))]
pub async fn load_images(
    engine: &mut dyn RenderEngine,
    images: &HashMap<String, ImageSpec>,
    fetcher: &RemoteFetcher,
) -> RenderResult<()> {
    if images.is_empty() {
        return Ok(());
    }

    let loaded = try_join_all(
        images
            .iter()
            .map(|(id, spec)| load_image(id, spec, fetcher)),
    )
    .await?;

    for (id, image) in loaded {
        debug!(id = %id, width = image.width, height = image.height, "Adding icon image");
        engine.add_image(&id, image)?;
    }
    Ok(())
}

async fn load_image(
    id: &str,
    spec: &ImageSpec,
    fetcher: &RemoteFetcher,
) -> RenderResult<(String, StyleImage)> {
    let url = spec
        .url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .ok_or_else(|| RenderError::InvalidImageUrl { id: id.to_string() })?;

    let icon_error = |reason: String| RenderError::IconLoad {
        id: id.to_string(),
        reason,
    };

    let bytes = if url.starts_with("data:") {
        decode_data_uri(url).map_err(icon_error)?
    } else if url.starts_with("http://") || url.starts_with("https://") {
        fetcher
            .fetch(url)
            .await
            .map_err(|e| icon_error(e.to_string()))?
            .into_data()
            .ok_or_else(|| icon_error(format!("no content at {url}")))?
            .to_vec()
    } else {
        return Err(RenderError::InvalidImageUrl { id: id.to_string() });
    };

    let decoded = DecodedImage::decode(&bytes).map_err(|e| icon_error(e.to_string()))?;

    Ok((
        id.to_string(),
        StyleImage {
            rgba: decoded.rgba,
            width: decoded.width,
            height: decoded.height,
            pixel_ratio: spec.pixel_ratio,
            sdf: spec.sdf,
        },
    ))
}

/// Payload of a base64 `data:` URI.
fn decode_data_uri(url: &str) -> Result<Vec<u8>, String> {
    let (_, payload) = url
        .split_once(BASE64_MARKER)
        .ok_or_else(|| "data URI is not base64 encoded".to_string())?;
    STANDARD
        .decode(payload.trim())
        .map_err(|e| format!("invalid base64 payload: {e}"))
}
