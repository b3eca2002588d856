//! Image data generators for tests.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{ImageOutputFormat, Rgba, RgbaImage};

/// Encode a single-colour PNG.
pub fn solid_png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let image = RgbaImage::from_pixel(width, height, Rgba(rgba));
    encode_png(&image)
}

/// Encode a PNG with a horizontal red and vertical green gradient.
pub fn gradient_png(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_fn(width, height, |x, y| {
        let r = (x * 255 / width.max(1)) as u8;
        let g = (y * 255 / height.max(1)) as u8;
        Rgba([r, g, 128, 255])
    });
    encode_png(&image)
}

fn encode_png(image: &RgbaImage) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageOutputFormat::Png)
        .expect("PNG encoding of an in-memory image");
    out.into_inner()
}

/// A 1x1 PNG as a `data:` URI.
pub fn png_data_uri(rgba: [u8; 4]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(solid_png(1, 1, rgba)))
}

/// Premultiplied RGBA buffer covering every alpha value.
pub fn premultiplied_buffer(width: u32, height: u32) -> Vec<u8> {
    let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
    for y in 0..height {
        for x in 0..width {
            let a = ((x + y * width) % 256) as u32;
            let r = (x * 255 / width.max(1)) * a / 255;
            let g = (y * 255 / height.max(1)) * a / 255;
            pixels.extend_from_slice(&[r as u8, g as u8, (a / 2) as u8, a as u8]);
        }
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_uri_decodes_to_png() {
        let uri = png_data_uri([1, 2, 3, 255]);
        let payload = uri.strip_prefix("data:image/png;base64,").unwrap();
        let bytes = STANDARD.decode(payload).unwrap();
        let image = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(image.get_pixel(0, 0).0, [1, 2, 3, 255]);
    }

    #[test]
    fn test_premultiplied_buffer_is_premultiplied() {
        let buffer = premultiplied_buffer(16, 16);
        assert_eq!(buffer.len(), 16 * 16 * 4);
        assert!(buffer
            .chunks_exact(4)
            .all(|px| px[0] <= px[3] && px[1] <= px[3] && px[2] <= px[3]));
    }
}
