//! Render request parameters, from a query string or a JSON body.

use std::collections::HashMap;

use map_render::{ImageSpec, RenderOptions};
use serde::Deserialize;
use serde_json::Value;

use crate::error::ApiError;

/// A style given inline as an object, or as text (JSON or a hosted style URL).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StyleParam {
    Text(String),
    Document(Value),
}

/// A list of numbers given as `"a,b,c"` or as an array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ListParam {
    Text(String),
    Values(Vec<f64>),
}

impl ListParam {
    /// Numbers in the list. Entries that are not numbers become NaN and are
    /// rejected by validation.
    pub fn values(&self) -> Vec<f64> {
        match self {
            ListParam::Text(text) => text
                .split(',')
                .map(|v| v.trim().parse().unwrap_or(f64::NAN))
                .collect(),
            ListParam::Values(values) => values.clone(),
        }
    }
}

/// Icon images given as a JSON object, or as that object's JSON text.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ImagesParam {
    Text(String),
    Map(HashMap<String, ImageSpec>),
}

impl ImagesParam {
    pub fn into_map(self) -> Result<HashMap<String, ImageSpec>, ApiError> {
        match self {
            ImagesParam::Map(map) => Ok(map),
            ImagesParam::Text(text) => serde_json::from_str(&text).map_err(|e| {
                ApiError::bad_request("InvalidImages", format!("Error parsing images: {e}"))
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderParams {
    pub style: StyleParam,
    pub width: u32,
    pub height: u32,
    pub zoom: Option<f64>,
    pub center: Option<ListParam>,
    pub bounds: Option<ListParam>,
    pub ratio: Option<f64>,
    pub bearing: Option<f64>,
    pub pitch: Option<f64>,
    pub padding: Option<f64>,
    pub token: Option<String>,
    pub images: Option<ImagesParam>,
    /// `*` or a comma separated list of overlay file names
    pub overlay_files: Option<String>,
    /// Frame the map on the selected overlay features
    #[serde(default)]
    pub fit: bool,
}

impl RenderParams {
    /// Render options for these parameters. Style, overlays, tile directory
    /// and default token are applied by the caller.
    pub fn options(&self) -> Result<RenderOptions, ApiError> {
        Ok(RenderOptions {
            zoom: self.zoom,
            center: self.center.as_ref().map(ListParam::values),
            bounds: self.bounds.as_ref().map(ListParam::values),
            bearing: self.bearing,
            pitch: self.pitch,
            ratio: self.ratio,
            padding: self.padding,
            tile_path: None,
            token: self.token.clone().filter(|t| !t.is_empty()),
            images: match self.images.clone() {
                Some(images) => images.into_map()?,
                None => HashMap::new(),
            },
        })
    }
}
