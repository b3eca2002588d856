//! Decoding of raster tiles and icon images.

use image::GenericImageView;

/// An image decoded into straight RGBA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl DecodedImage {
    /// Decode PNG, JPEG, WebP or GIF bytes, guessing the format from the data.
    ///
    /// Non-RGBA images are converted to RGBA.
    pub fn decode(bytes: &[u8]) -> Result<Self, image::ImageError> {
        let decoded = image::load_from_memory(bytes)?;
        let (width, height) = decoded.dimensions();

        Ok(Self {
            rgba: decoded.to_rgba8().into_raw(),
            width,
            height,
        })
    }

    /// Straight RGBA of the pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [self.rgba[i], self.rgba[i + 1], self.rgba[i + 2], self.rgba[i + 3]]
    }
}
