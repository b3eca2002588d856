//! Stand-in render engine.
//!
//! `MosaicEngine` walks a style the way a full engine would as far as resource
//! traffic goes (TileJSON, sprite, glyphs, tiles and image sources are all
//! requested through the [`ResourceSource`]), but only draws the background
//! colour and raster tiles. Vector tiles are fetched and discarded.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use map_common::{
    RenderError, RenderResult, ResourceKind, ResourceRequest, ResourceResponse, TileCoord,
};
use projection::SphericalMercator;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::decode::DecodedImage;
use crate::engine::{
    physical_size, EngineFactory, EngineOptions, EngineRenderOptions, RawImage, RenderEngine,
    ResourceSource, StyleImage,
};
use crate::style::{LayerDefinition, StyleDocument, DEFAULT_TILE_SIZE};

/// Logical size of the world at zoom 0.
const WORLD_TILE_SIZE: f64 = 512.0;

/// Glyph range requested for text layers.
const GLYPH_RANGE: &str = "0-255";

/// Factory for [`MosaicEngine`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MosaicEngineFactory;

impl EngineFactory for MosaicEngineFactory {
    fn create(&self, options: EngineOptions) -> RenderResult<Box<dyn RenderEngine>> {
        Ok(Box::new(MosaicEngine::new(options)))
    }
}

#[derive(Debug, Deserialize)]
struct TileJson {
    #[serde(default)]
    tiles: Vec<String>,
    minzoom: Option<u32>,
    maxzoom: Option<u32>,
}

/// Resolved tile endpoints of one style source.
#[derive(Debug, Clone)]
struct TileSet {
    raster: bool,
    templates: Vec<String>,
    minzoom: u32,
    maxzoom: u32,
    tile_size: u32,
}

impl TileSet {
    fn url_for(&self, coord: TileCoord) -> Option<String> {
        if self.templates.is_empty() {
            return None;
        }
        // Spread requests over subdomain templates the same way for every tile
        let template = &self.templates[(coord.x + coord.y) as usize % self.templates.len()];
        Some(coord.fill_template(template))
    }

    /// Tile zoom used for a map zoom, taking the tile size into account.
    fn tile_zoom(&self, zoom: f64) -> u32 {
        let scale = (WORLD_TILE_SIZE / self.tile_size as f64).log2();
        let z = (zoom + scale).floor().max(0.0) as u32;
        z.clamp(self.minzoom, self.maxzoom.max(self.minzoom))
    }
}

/// A tile placed in logical world pixels at the render zoom.
#[derive(Debug, Clone, Copy)]
struct PlacedTile {
    coord: TileCoord,
    /// Left edge relative to the viewport, logical pixels
    left: f64,
    /// Top edge relative to the viewport, logical pixels
    top: f64,
    /// Edge length, logical pixels
    size: f64,
}

pub struct MosaicEngine {
    source: Arc<dyn ResourceSource>,
    ratio: u32,
    style: Option<StyleDocument>,
    tilesets: HashMap<String, TileSet>,
    images: HashMap<String, StyleImage>,
    released: bool,
}

impl MosaicEngine {
    pub fn new(options: EngineOptions) -> Self {
        Self {
            source: options.source,
            ratio: options.ratio.max(1),
            style: None,
            tilesets: HashMap::new(),
            images: HashMap::new(),
            released: false,
        }
    }

    fn ensure_active(&self) -> RenderResult<()> {
        if self.released {
            return Err(RenderError::RenderEngine("engine has been released".to_string()));
        }
        Ok(())
    }

    async fn fetch(&self, url: String, kind: ResourceKind) -> RenderResult<ResourceResponse> {
        self.source.request(ResourceRequest::new(url, kind)).await
    }

    async fn load_sprite(&self, sprite: &str) -> RenderResult<()> {
        let suffix = if self.ratio > 1 { "@2x" } else { "" };
        let (json, image) = futures::try_join!(
            self.fetch(format!("{sprite}{suffix}.json"), ResourceKind::SpriteJson),
            self.fetch(format!("{sprite}{suffix}.png"), ResourceKind::SpriteImage),
        )?;
        debug!(
            sprite,
            has_json = !json.is_empty(),
            has_image = !image.is_empty(),
            "Loaded sprite"
        );
        Ok(())
    }

    async fn load_source(
        &self,
        name: &str,
        def: &crate::style::SourceDefinition,
    ) -> RenderResult<Option<TileSet>> {
        let raster = match def.source_type.as_str() {
            "raster" | "raster-dem" => true,
            "vector" => false,
            "geojson" => {
                if let Some(Value::String(url)) = &def.data {
                    self.fetch(url.clone(), ResourceKind::Source).await?;
                }
                return Ok(None);
            }
            "image" => {
                if let Some(url) = &def.url {
                    self.fetch(url.clone(), ResourceKind::ImageSource).await?;
                }
                return Ok(None);
            }
            _ => return Ok(None),
        };

        let mut tileset = TileSet {
            raster,
            templates: def.tiles.clone().unwrap_or_default(),
            minzoom: def.minzoom.unwrap_or(0),
            maxzoom: def.maxzoom.unwrap_or(22),
            tile_size: def.tile_size.unwrap_or(DEFAULT_TILE_SIZE).max(1),
        };

        if let Some(url) = &def.url {
            let response = self.fetch(url.clone(), ResourceKind::Source).await?;
            let data = response.into_data().ok_or_else(|| {
                RenderError::RenderEngine(format!("source {name} returned no TileJSON"))
            })?;
            let tilejson: TileJson = serde_json::from_slice(&data)?;
            tileset.templates = tilejson.tiles;
            if let Some(min) = tilejson.minzoom.or(def.minzoom) {
                tileset.minzoom = min;
            }
            if let Some(max) = tilejson.maxzoom.or(def.maxzoom) {
                tileset.maxzoom = max;
            }
        }

        Ok(Some(tileset))
    }

    /// Tiles at the tileset's zoom that intersect the viewport.
    fn covering_tiles(&self, tileset: &TileSet, options: &EngineRenderOptions) -> Vec<PlacedTile> {
        let tz = tileset.tile_zoom(options.zoom);
        let merc = SphericalMercator::new(WORLD_TILE_SIZE);
        let (cx, cy) = merc.px(options.center, options.zoom);

        let left = cx - options.width as f64 / 2.0;
        let top = cy - options.height as f64 / 2.0;
        let right = left + options.width as f64;
        let bottom = top + options.height as f64;

        let n = TileCoord::matrix_size(tz) as i64;
        let tile_px = merc.world_size(options.zoom) / n as f64;

        let x0 = (left / tile_px).floor() as i64;
        let x1 = (right / tile_px).ceil() as i64;
        let y0 = ((top / tile_px).floor() as i64).max(0);
        let y1 = ((bottom / tile_px).ceil() as i64).min(n);

        let mut tiles = Vec::new();
        for ty in y0..y1 {
            for tx in x0..x1 {
                tiles.push(PlacedTile {
                    coord: TileCoord::new(tz, tx.rem_euclid(n) as u32, ty as u32),
                    left: tx as f64 * tile_px - left,
                    top: ty as f64 * tile_px - top,
                    size: tile_px,
                });
            }
        }
        tiles
    }

    async fn fetch_tiles(
        &self,
        tileset: &TileSet,
        tiles: &[PlacedTile],
    ) -> RenderResult<Vec<(PlacedTile, ResourceResponse)>> {
        // Wrapped columns share a tile; fetch each address once
        let mut unique = Vec::new();
        let mut seen = HashSet::new();
        for tile in tiles {
            if seen.insert(tile.coord) {
                if let Some(url) = tileset.url_for(tile.coord) {
                    unique.push((tile.coord, url));
                }
            }
        }

        let fetched = try_join_all(unique.into_iter().map(|(coord, url)| async move {
            let response = self.fetch(url, ResourceKind::Tile).await?;
            Ok::<_, RenderError>((coord, response))
        }))
        .await?;
        let fetched: HashMap<TileCoord, ResourceResponse> = fetched.into_iter().collect();

        Ok(tiles
            .iter()
            .filter_map(|tile| fetched.get(&tile.coord).map(|r| (*tile, r.clone())))
            .collect())
    }

    async fn request_glyphs(&self, glyphs: &str, layers: &[&LayerDefinition]) -> RenderResult<()> {
        let stacks: HashSet<String> = layers
            .iter()
            .filter(|l| l.layer_type == "symbol")
            .filter_map(|l| l.text_font_stack())
            .collect();

        try_join_all(stacks.into_iter().map(|stack| {
            let url = glyphs
                .replace("{fontstack}", &stack)
                .replace("{range}", GLYPH_RANGE);
            self.fetch(url, ResourceKind::Glyph)
        }))
        .await?;
        Ok(())
    }
}

#[async_trait]
impl RenderEngine for MosaicEngine {
    #[instrument(skip_all)]
    async fn load(&mut self, style: &Value) -> RenderResult<()> {
        self.ensure_active()?;
        let doc = StyleDocument::from_value(style)?;

        let this = &*self;
        if let Some(sprite) = &doc.sprite {
            this.load_sprite(sprite).await?;
        }

        let loaded = try_join_all(doc.sources.iter().map(|(name, def)| async move {
            let tileset = this.load_source(name, def).await?;
            Ok::<_, RenderError>((name.clone(), tileset))
        }))
        .await?;

        self.tilesets = loaded
            .into_iter()
            .filter_map(|(name, tileset)| tileset.map(|t| (name, t)))
            .collect();
        debug!(sources = self.tilesets.len(), layers = doc.layers.len(), "Style loaded");

        self.style = Some(doc);
        Ok(())
    }

    fn add_image(&mut self, id: &str, image: StyleImage) -> RenderResult<()> {
        self.ensure_active()?;
        let expected = image.width as usize * image.height as usize * 4;
        if image.rgba.len() != expected {
            return Err(RenderError::RenderEngine(format!(
                "image {id} has {} bytes, expected {expected}",
                image.rgba.len()
            )));
        }
        self.images.insert(id.to_string(), image);
        Ok(())
    }

    #[instrument(skip(self), fields(zoom = options.zoom))]
    async fn render(&mut self, options: EngineRenderOptions) -> RenderResult<RawImage> {
        self.ensure_active()?;
        let style = self
            .style
            .as_ref()
            .ok_or_else(|| RenderError::RenderEngine("render called before load".to_string()))?;

        let (width, height) = physical_size(options.width, options.height, self.ratio)?;
        let mut canvas = Canvas::new(width, height, self.ratio as f64);

        let visible: Vec<&LayerDefinition> =
            style.layers.iter().filter(|l| l.is_visible(options.zoom)).collect();

        if let Some(glyphs) = &style.glyphs {
            self.request_glyphs(glyphs, &visible).await?;
        }

        let mut vector_sources_fetched = HashSet::new();
        for layer in &visible {
            match layer.layer_type.as_str() {
                "background" => {
                    if let Some(color) = layer.paint_color("background-color") {
                        let opacity = layer.paint_number("background-opacity", 1.0);
                        canvas.fill(color, opacity);
                    }
                }
                _ => {
                    let Some(tileset) = layer.source.as_ref().and_then(|s| self.tilesets.get(s))
                    else {
                        continue;
                    };
                    let tiles = self.covering_tiles(tileset, &options);

                    if tileset.raster && layer.layer_type == "raster" {
                        let opacity = layer.paint_number("raster-opacity", 1.0);
                        for (tile, response) in self.fetch_tiles(tileset, &tiles).await? {
                            let Some(bytes) = response.into_data() else {
                                continue;
                            };
                            let image = DecodedImage::decode(&bytes).map_err(|e| {
                                RenderError::RenderEngine(format!(
                                    "failed to decode tile {}/{}/{}: {e}",
                                    tile.coord.z, tile.coord.x, tile.coord.y
                                ))
                            })?;
                            canvas.draw_tile(&tile, &image, opacity);
                        }
                    } else if !tileset.raster {
                        let source = layer.source.clone().unwrap_or_default();
                        if vector_sources_fetched.insert(source) {
                            self.fetch_tiles(tileset, &tiles).await?;
                        }
                    }
                }
            }
        }

        debug!(width, height, "Rendered");
        Ok(canvas.into_raw())
    }

    fn release(&mut self) {
        if !self.released {
            debug!("Releasing engine");
        }
        self.released = true;
        self.style = None;
        self.tilesets.clear();
        self.images.clear();
    }
}

/// Premultiplied RGBA drawing surface in physical pixels.
struct Canvas {
    data: Vec<u8>,
    width: u32,
    height: u32,
    ratio: f64,
}

impl Canvas {
    fn new(width: u32, height: u32, ratio: f64) -> Self {
        Self {
            data: vec![0; width as usize * height as usize * 4],
            width,
            height,
            ratio,
        }
    }

    fn fill(&mut self, color: [u8; 4], opacity: f64) {
        let src = premultiply(color, opacity);
        for px in self.data.chunks_exact_mut(4) {
            blend(px, src);
        }
    }

    /// Nearest-neighbour draw of a straight-RGBA tile image.
    fn draw_tile(&mut self, tile: &PlacedTile, image: &DecodedImage, opacity: f64) {
        if image.width == 0 || image.height == 0 {
            return;
        }
        let x_start = (tile.left * self.ratio).floor().max(0.0) as u32;
        let y_start = (tile.top * self.ratio).floor().max(0.0) as u32;
        let x_end = (((tile.left + tile.size) * self.ratio).ceil().max(0.0) as u32).min(self.width);
        let y_end = (((tile.top + tile.size) * self.ratio).ceil().max(0.0) as u32).min(self.height);

        for py in y_start..y_end {
            let v = ((py as f64 + 0.5) / self.ratio - tile.top) / tile.size;
            if !(0.0..1.0).contains(&v) {
                continue;
            }
            let sy = ((v * image.height as f64) as u32).min(image.height - 1);

            for px in x_start..x_end {
                let u = ((px as f64 + 0.5) / self.ratio - tile.left) / tile.size;
                if !(0.0..1.0).contains(&u) {
                    continue;
                }
                let sx = ((u * image.width as f64) as u32).min(image.width - 1);

                let src = premultiply(image.pixel(sx, sy), opacity);
                let i = (py as usize * self.width as usize + px as usize) * 4;
                blend(&mut self.data[i..i + 4], src);
            }
        }
    }

    fn into_raw(self) -> RawImage {
        RawImage {
            data: self.data,
            width: self.width,
            height: self.height,
        }
    }
}

fn premultiply(color: [u8; 4], opacity: f64) -> [f64; 4] {
    let a = color[3] as f64 / 255.0 * opacity.clamp(0.0, 1.0);
    [
        color[0] as f64 * a,
        color[1] as f64 * a,
        color[2] as f64 * a,
        a * 255.0,
    ]
}

/// Source-over compositing of a premultiplied source onto a premultiplied pixel.
fn blend(dst: &mut [u8], src: [f64; 4]) {
    let keep = 1.0 - src[3] / 255.0;
    for c in 0..4 {
        dst[c] = (src[c] + dst[c] as f64 * keep).round().clamp(0.0, 255.0) as u8;
    }
}
