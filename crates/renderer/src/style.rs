//! The subset of a map style document the mosaic engine understands.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default raster/vector tile size in logical pixels.
pub const DEFAULT_TILE_SIZE: u32 = 512;

/// Style document: sources, ordered layers and the sprite/glyph locations.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StyleDocument {
    #[serde(default)]
    pub version: Option<u32>,
    #[serde(default)]
    pub sources: HashMap<String, SourceDefinition>,
    #[serde(default)]
    pub layers: Vec<LayerDefinition>,
    #[serde(default)]
    pub sprite: Option<String>,
    #[serde(default)]
    pub glyphs: Option<String>,
}

/// A style source.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceDefinition {
    #[serde(rename = "type")]
    pub source_type: String,
    /// TileJSON URL (tiled sources) or image URL (image sources)
    pub url: Option<String>,
    /// Inline tile URL templates
    pub tiles: Option<Vec<String>>,
    #[serde(rename = "tileSize")]
    pub tile_size: Option<u32>,
    pub minzoom: Option<u32>,
    pub maxzoom: Option<u32>,
    /// GeoJSON payload or URL
    pub data: Option<Value>,
}

/// A style layer.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LayerDefinition {
    pub id: String,
    #[serde(rename = "type")]
    pub layer_type: String,
    pub source: Option<String>,
    pub minzoom: Option<f64>,
    pub maxzoom: Option<f64>,
    #[serde(default)]
    pub paint: HashMap<String, Value>,
    #[serde(default)]
    pub layout: HashMap<String, Value>,
}

impl StyleDocument {
    pub fn from_value(style: &Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(style)
    }
}

impl LayerDefinition {
    /// Whether the layer draws at `zoom` (layout visibility plus zoom range).
    pub fn is_visible(&self, zoom: f64) -> bool {
        let hidden = self.layout.get("visibility").and_then(Value::as_str) == Some("none");
        let above_min = self.minzoom.map_or(true, |min| zoom >= min);
        let below_max = self.maxzoom.map_or(true, |max| zoom < max);
        !hidden && above_min && below_max
    }

    /// Numeric paint property, or `default` when absent or not a plain number.
    pub fn paint_number(&self, name: &str, default: f64) -> f64 {
        self.paint.get(name).and_then(Value::as_f64).unwrap_or(default)
    }

    /// Colour paint property as straight RGBA.
    pub fn paint_color(&self, name: &str) -> Option<[u8; 4]> {
        self.paint.get(name).and_then(Value::as_str).and_then(parse_color)
    }

    /// Font stack for symbol layers that carry text.
    pub fn text_font_stack(&self) -> Option<String> {
        self.layout.get("text-field")?;
        let fonts = match self.layout.get("text-font").and_then(Value::as_array) {
            Some(fonts) => fonts.iter().filter_map(Value::as_str).collect::<Vec<_>>(),
            None => vec!["Open Sans Regular", "Arial Unicode MS Regular"],
        };
        Some(fonts.join(","))
    }
}

/// Parse a CSS colour string to straight RGBA.
///
/// Accepts `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb(r,g,b)`, `rgba(r,g,b,a)` and a
/// handful of names.
pub fn parse_color(color: &str) -> Option<[u8; 4]> {
    let color = color.trim();

    if let Some(hex) = color.strip_prefix('#') {
        return parse_hex(hex);
    }
    if let Some(args) = color.strip_prefix("rgba(").and_then(|s| s.strip_suffix(')')) {
        return parse_rgb_args(args, true);
    }
    if let Some(args) = color.strip_prefix("rgb(").and_then(|s| s.strip_suffix(')')) {
        return parse_rgb_args(args, false);
    }

    match color.to_ascii_lowercase().as_str() {
        "black" => Some([0, 0, 0, 255]),
        "white" => Some([255, 255, 255, 255]),
        "red" => Some([255, 0, 0, 255]),
        "green" => Some([0, 128, 0, 255]),
        "blue" => Some([0, 0, 255, 255]),
        "transparent" => Some([0, 0, 0, 0]),
        _ => None,
    }
}

fn parse_hex(hex: &str) -> Option<[u8; 4]> {
    let byte = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        3 => {
            let mut out = [255u8; 4];
            for (i, c) in hex.chars().enumerate() {
                let v = c.to_digit(16)? as u8;
                out[i] = v * 17;
            }
            Some(out)
        }
        6 => Some([byte(&hex[0..2])?, byte(&hex[2..4])?, byte(&hex[4..6])?, 255]),
        8 => Some([
            byte(&hex[0..2])?,
            byte(&hex[2..4])?,
            byte(&hex[4..6])?,
            byte(&hex[6..8])?,
        ]),
        _ => None,
    }
}

fn parse_rgb_args(args: &str, with_alpha: bool) -> Option<[u8; 4]> {
    let parts: Vec<&str> = args.split(',').map(str::trim).collect();
    let expected = if with_alpha { 4 } else { 3 };
    if parts.len() != expected {
        return None;
    }

    let mut out = [255u8; 4];
    for i in 0..3 {
        out[i] = parts[i].parse::<f64>().ok()?.clamp(0.0, 255.0).round() as u8;
    }
    if with_alpha {
        let alpha: f64 = parts[3].parse().ok()?;
        out[3] = (alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("#ff0000"), Some([255, 0, 0, 255]));
        assert_eq!(parse_color("#0f0"), Some([0, 255, 0, 255]));
        assert_eq!(parse_color("#00000080"), Some([0, 0, 0, 128]));
        assert_eq!(parse_color("rgb(10, 20, 30)"), Some([10, 20, 30, 255]));
        assert_eq!(parse_color("rgba(10,20,30,0.5)"), Some([10, 20, 30, 128]));
        assert_eq!(parse_color("White"), Some([255, 255, 255, 255]));
        assert_eq!(parse_color("#12345"), None);
        assert_eq!(parse_color("hsl(0, 100%, 50%)"), None);
    }

    #[test]
    fn test_style_document_parses_subset() {
        let style = json!({
            "version": 8,
            "sources": {
                "land": { "type": "vector", "url": "mbtiles://land" },
                "osm": { "type": "raster", "tiles": ["https://t/{z}/{x}/{y}.png"], "tileSize": 256 }
            },
            "layers": [
                { "id": "bg", "type": "background", "paint": { "background-color": "#112233" } },
                { "id": "osm", "type": "raster", "source": "osm", "minzoom": 2 },
                { "id": "labels", "type": "symbol", "source": "land", "layout": { "text-field": "{name}" } }
            ],
            "glyphs": "https://fonts/{fontstack}/{range}.pbf"
        });

        let doc = StyleDocument::from_value(&style).unwrap();
        assert_eq!(doc.sources["osm"].tile_size, Some(256));
        assert_eq!(doc.layers[0].paint_color("background-color"), Some([0x11, 0x22, 0x33, 255]));
        assert!(!doc.layers[1].is_visible(1.5));
        assert!(doc.layers[1].is_visible(2.0));
        assert_eq!(
            doc.layers[2].text_font_stack().as_deref(),
            Some("Open Sans Regular,Arial Unicode MS Regular")
        );
    }

    #[test]
    fn test_hidden_layer() {
        let layer: LayerDefinition = serde_json::from_value(json!({
            "id": "x", "type": "raster", "layout": { "visibility": "none" }
        }))
        .unwrap();
        assert!(!layer.is_visible(5.0));
    }
}
