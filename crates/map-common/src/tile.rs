//! Tile addressing (z/x/y).

use serde::{Deserialize, Serialize};

/// A tile coordinate in the XYZ scheme (top-left origin).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    /// Zoom level
    pub z: u32,
    /// Column (x)
    pub x: u32,
    /// Row (y)
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u32, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Number of tiles along one axis at this zoom level.
    pub fn matrix_size(z: u32) -> u32 {
        1u32 << z.min(31)
    }

    /// Parse the trailing `<z>/<x>/<y>[.ext]` segments of a tile URL.
    ///
    /// Query strings are ignored. Returns `None` when the last three path
    /// segments are not all integers.
    pub fn from_url(url: &str) -> Option<Self> {
        let path = url.split(&['?', '#'][..]).next().unwrap_or(url);
        let mut segments = path.rsplit('/');

        let last = segments.next()?;
        // Tile extensions can be compound, e.g. "1.vector.pbf"
        let y = last.split('.').next()?;
        let x = segments.next()?;
        let z = segments.next()?;

        Some(Self {
            z: z.parse().ok()?,
            x: x.parse().ok()?,
            y: y.parse().ok()?,
        })
    }

    /// Whether x and y both lie inside the tile matrix for this zoom.
    pub fn is_valid(&self) -> bool {
        let n = Self::matrix_size(self.z);
        self.x < n && self.y < n
    }

    /// Row index in the TMS scheme (bottom-left origin), as stored in MBTiles.
    ///
    /// `None` when the coordinate is outside the tile matrix.
    pub fn tms_y(&self) -> Option<u32> {
        self.is_valid()
            .then(|| Self::matrix_size(self.z) - 1 - self.y)
    }

    /// Substitute this coordinate into a `{z}/{x}/{y}` URL template.
    pub fn fill_template(&self, template: &str) -> String {
        let url = template
            .replace("{z}", &self.z.to_string())
            .replace("{x}", &self.x.to_string())
            .replace("{y}", &self.y.to_string());
        match self.tms_y() {
            Some(tms_y) => url.replace("{-y}", &tms_y.to_string()),
            None => url,
        }
    }
}
