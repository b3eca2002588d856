//! Common test fixtures for map export tests.

use serde_json::{json, Value};

/// Common bounding boxes as `[west, south, east, north]`.
pub mod bbox {
    /// Most of the northern Pacific and North America
    pub const PACIFIC: [f64; 4] = [-163.370476, 4.852207, -15.714226, 64.255036];

    /// Continental United States
    pub const CONUS: [f64; 4] = [-130.0, 20.0, -60.0, 55.0];

    /// A small box around Charleston, SC
    pub const CHARLESTON: [f64; 4] = [-80.0, 32.6, -79.7, 32.8];
}

/// Common map centers as `[lng, lat]`.
pub mod center {
    pub const CHARLESTON: [f64; 2] = [-79.86, 32.68];
    pub const NULL_ISLAND: [f64; 2] = [0.0, 0.0];
}

/// Style with only a background layer.
pub fn background_style(color: &str) -> Value {
    json!({
        "version": 8,
        "name": "background",
        "sources": {},
        "layers": [
            { "id": "background", "type": "background", "paint": { "background-color": color } }
        ]
    })
}

/// Style with a background and one raster source served from `tiles_template`.
pub fn raster_style(tiles_template: &str) -> Value {
    json!({
        "version": 8,
        "name": "raster",
        "sources": {
            "basemap": {
                "type": "raster",
                "tiles": [tiles_template],
                "tileSize": 256,
                "maxzoom": 6
            }
        },
        "layers": [
            { "id": "background", "type": "background", "paint": { "background-color": "#dddddd" } },
            { "id": "basemap", "type": "raster", "source": "basemap" }
        ]
    })
}

/// Style with a vector source from a local archive `mbtiles://<archive>`.
pub fn mbtiles_vector_style(archive: &str) -> Value {
    json!({
        "version": 8,
        "name": "local vector",
        "sources": {
            "land": { "type": "vector", "url": format!("mbtiles://{archive}") }
        },
        "layers": [
            { "id": "background", "type": "background", "paint": { "background-color": "#a0cfdf" } },
            { "id": "land", "type": "fill", "source": "land", "source-layer": "land", "paint": { "fill-color": "#eeeeee" } }
        ]
    })
}

/// Style with a raster source from a local archive `mbtiles://<archive>`.
pub fn mbtiles_raster_style(archive: &str) -> Value {
    json!({
        "version": 8,
        "name": "local raster",
        "sources": {
            "imagery": { "type": "raster", "url": format!("mbtiles://{archive}"), "tileSize": 256 }
        },
        "layers": [
            { "id": "imagery", "type": "raster", "source": "imagery" }
        ]
    })
}

/// Style using sources, sprite and glyphs from the hosted map API.
pub fn mapbox_style() -> Value {
    json!({
        "version": 8,
        "name": "hosted",
        "sprite": "mapbox://sprites/mapbox/bright-v9",
        "glyphs": "mapbox://fonts/mapbox/{fontstack}/{range}.pbf",
        "sources": {
            "streets": { "type": "vector", "url": "mapbox://mapbox.mapbox-streets-v7" }
        },
        "layers": [
            { "id": "background", "type": "background", "paint": { "background-color": "#f8f4f0" } },
            { "id": "roads", "type": "line", "source": "streets", "source-layer": "road" }
        ]
    })
}
