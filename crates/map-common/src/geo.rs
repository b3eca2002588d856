//! Geographic point and viewport types.

use serde::{Deserialize, Serialize};

/// A longitude/latitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    pub fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    pub fn to_array(&self) -> [f64; 2] {
        [self.lng, self.lat]
    }
}

/// The visible part of the map: continuous zoom level plus center.
///
/// Either supplied by the caller or derived from a bounding box; in both
/// cases it is what the render engine receives.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub zoom: f64,
    pub center: LngLat,
}

impl Viewport {
    pub fn new(zoom: f64, center: LngLat) -> Self {
        Self { zoom, center }
    }
}
