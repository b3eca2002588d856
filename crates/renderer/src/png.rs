//! PNG encoding for RGBA image data.
//!
//! Two output modes:
//! - **Indexed PNG (color type 3)** when the image has at most 256 distinct
//!   colours. Map renders with flat fills usually qualify and come out much
//!   smaller.
//! - **RGBA PNG (color type 6)** for everything else.
//!
//! [`encode_auto`] picks the mode; [`encode_rgba`] always writes RGBA.

use std::collections::HashMap;
use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use thiserror::Error;

/// Maximum colors for indexed PNG (PNG8)
const MAX_PALETTE_SIZE: usize = 256;

const SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

const COLOR_TYPE_INDEXED: u8 = 3;
const COLOR_TYPE_RGBA: u8 = 6;

#[derive(Debug, Error)]
pub enum PngError {
    #[error("pixel buffer is {actual} bytes, expected {expected} for {width}x{height}")]
    BufferSize {
        expected: usize,
        actual: usize,
        width: u32,
        height: u32,
    },

    #[error("image dimensions must be non-zero: {width}x{height}")]
    EmptyImage { width: u32, height: u32 },

    #[error("IDAT compression failed: {0}")]
    Compression(#[from] std::io::Error),
}

/// Colour table plus one palette index per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    pub colors: Vec<[u8; 4]>,
    pub indices: Vec<u8>,
}

impl Palette {
    /// Build a palette from RGBA pixels, or `None` if there are more than 256 colours.
    pub fn extract(pixels: &[u8]) -> Option<Self> {
        let mut lookup: HashMap<[u8; 4], u8> = HashMap::with_capacity(MAX_PALETTE_SIZE);
        let mut colors = Vec::with_capacity(MAX_PALETTE_SIZE);
        let mut indices = Vec::with_capacity(pixels.len() / 4);

        for px in pixels.chunks_exact(4) {
            let color = [px[0], px[1], px[2], px[3]];
            let index = match lookup.get(&color) {
                Some(&i) => i,
                None => {
                    if colors.len() == MAX_PALETTE_SIZE {
                        return None;
                    }
                    let i = colors.len() as u8;
                    colors.push(color);
                    lookup.insert(color, i);
                    i
                }
            };
            indices.push(index);
        }

        Some(Self { colors, indices })
    }

    fn has_transparency(&self) -> bool {
        self.colors.iter().any(|c| c[3] < 255)
    }
}

/// Encode RGBA pixels, choosing indexed output when the colour count allows it.
pub fn encode_auto(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>, PngError> {
    check_buffer(pixels, width, height)?;

    match Palette::extract(pixels) {
        Some(palette) => write_indexed(&palette, width, height),
        None => write_rgba(pixels, width, height),
    }
}

/// Encode RGBA pixels as a color type 6 PNG.
pub fn encode_rgba(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>, PngError> {
    check_buffer(pixels, width, height)?;
    write_rgba(pixels, width, height)
}

fn check_buffer(pixels: &[u8], width: u32, height: u32) -> Result<(), PngError> {
    if width == 0 || height == 0 {
        return Err(PngError::EmptyImage { width, height });
    }
    let expected = width as usize * height as usize * 4;
    if pixels.len() != expected {
        return Err(PngError::BufferSize {
            expected,
            actual: pixels.len(),
            width,
            height,
        });
    }
    Ok(())
}

fn write_indexed(palette: &Palette, width: u32, height: u32) -> Result<Vec<u8>, PngError> {
    let mut png = Vec::with_capacity(palette.indices.len() / 2 + 1024);
    png.extend_from_slice(&SIGNATURE);
    write_chunk(&mut png, b"IHDR", &header(width, height, COLOR_TYPE_INDEXED));

    let plte: Vec<u8> = palette.colors.iter().flat_map(|c| [c[0], c[1], c[2]]).collect();
    write_chunk(&mut png, b"PLTE", &plte);

    if palette.has_transparency() {
        let trns: Vec<u8> = palette.colors.iter().map(|c| c[3]).collect();
        write_chunk(&mut png, b"tRNS", &trns);
    }

    let idat = deflate_scanlines(&palette.indices, width as usize, height as usize)?;
    write_chunk(&mut png, b"IDAT", &idat);
    write_chunk(&mut png, b"IEND", &[]);

    Ok(png)
}

fn write_rgba(pixels: &[u8], width: u32, height: u32) -> Result<Vec<u8>, PngError> {
    let mut png = Vec::with_capacity(pixels.len() / 2 + 1024);
    png.extend_from_slice(&SIGNATURE);
    write_chunk(&mut png, b"IHDR", &header(width, height, COLOR_TYPE_RGBA));

    let idat = deflate_scanlines(pixels, width as usize * 4, height as usize)?;
    write_chunk(&mut png, b"IDAT", &idat);
    write_chunk(&mut png, b"IEND", &[]);

    Ok(png)
}

fn header(width: u32, height: u32, color_type: u8) -> [u8; 13] {
    let mut ihdr = [0u8; 13];
    ihdr[0..4].copy_from_slice(&width.to_be_bytes());
    ihdr[4..8].copy_from_slice(&height.to_be_bytes());
    ihdr[8] = 8; // bit depth
    ihdr[9] = color_type;
    // compression, filter and interlace methods all 0
    ihdr
}

/// Prefix every row with filter type 0 and zlib-compress the result.
fn deflate_scanlines(data: &[u8], row_bytes: usize, rows: usize) -> Result<Vec<u8>, PngError> {
    let mut raw = Vec::with_capacity(rows * (row_bytes + 1));
    for row in data.chunks_exact(row_bytes).take(rows) {
        raw.push(0);
        raw.extend_from_slice(row);
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(&raw)?;
    Ok(encoder.finish()?)
}

fn write_chunk(png: &mut Vec<u8>, kind: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(kind);
    png.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(kind);
    hasher.update(data);
    png.extend_from_slice(&hasher.finalize().to_be_bytes());
}
