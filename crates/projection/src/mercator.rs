//! Spherical Mercator (EPSG:3857) in global pixel space.
//!
//! At zoom `z` the whole world is a square of `tile_size * 2^z` pixels with
//! the origin at the top-left corner (lng -180, lat +85.0511). Zoom levels
//! are continuous, so fractional zooms scale the world accordingly.

use std::f64::consts::PI;

use map_common::LngLat;

/// Latitude limit of the Web Mercator square.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Pixel projection for a given tile size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphericalMercator {
    /// Tile edge length in pixels (256 for classic raster tiles)
    pub tile_size: f64,
}

impl Default for SphericalMercator {
    fn default() -> Self {
        Self { tile_size: 256.0 }
    }
}

impl SphericalMercator {
    pub fn new(tile_size: f64) -> Self {
        Self { tile_size }
    }

    /// World edge length in pixels at `zoom`.
    pub fn world_size(&self, zoom: f64) -> f64 {
        self.tile_size * 2f64.powf(zoom)
    }

    /// Project a longitude/latitude to global pixel coordinates at `zoom`.
    pub fn px(&self, point: LngLat, zoom: f64) -> (f64, f64) {
        let size = self.world_size(zoom);
        let lat = point.lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);

        let x = (point.lng + 180.0) / 360.0 * size;
        let sin = lat.to_radians().sin();
        let y = (0.5 - ((1.0 + sin) / (1.0 - sin)).ln() / (4.0 * PI)) * size;

        (x, y)
    }

    /// Inverse of [`px`](Self::px).
    pub fn ll(&self, x: f64, y: f64, zoom: f64) -> LngLat {
        let size = self.world_size(zoom);

        let lng = x / size * 360.0 - 180.0;
        let n = PI * (1.0 - 2.0 * y / size);
        let lat = n.sinh().atan().to_degrees();

        LngLat::new(lng, lat)
    }
}
