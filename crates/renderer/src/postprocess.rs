//! Engine output to PNG.
//!
//! The engine produces premultiplied RGBA; PNG stores straight alpha, so the
//! colour channels are divided back out before encoding.

use map_common::{RenderError, RenderResult};
use tracing::debug;

use crate::png;

/// Convert premultiplied RGBA to straight RGBA in place.
///
/// Fully transparent pixels become `0,0,0,0`. Otherwise each colour channel is
/// `channel / (alpha / 255)` truncated toward zero and saturated at 255.
pub fn unpremultiply(pixels: &mut [u8]) {
    for px in pixels.chunks_exact_mut(4) {
        let alpha = px[3];
        if alpha == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        if alpha == 255 {
            continue;
        }
        let scale = alpha as f64 / 255.0;
        for channel in &mut px[..3] {
            *channel = (*channel as f64 / scale).min(255.0) as u8;
        }
    }
}

/// Un-premultiply a raw engine buffer and encode it as PNG.
///
/// `width` and `height` are physical pixels (logical size times ratio).
pub fn encode(mut raw: Vec<u8>, width: u32, height: u32) -> RenderResult<Vec<u8>> {
    let expected = width as usize * height as usize * 4;
    if raw.len() != expected {
        return Err(RenderError::PngEncoding(format!(
            "raw buffer is {} bytes, expected {} for {}x{}",
            raw.len(),
            expected,
            width,
            height
        )));
    }

    unpremultiply(&mut raw);
    let png = png::encode_auto(&raw, width, height)
        .map_err(|e| RenderError::PngEncoding(e.to_string()))?;

    debug!(width, height, bytes = png.len(), "Encoded PNG");
    Ok(png)
}
