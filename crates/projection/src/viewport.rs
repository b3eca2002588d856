//! Viewport derivation from a bounding box.
//!
//! Finds the largest continuous zoom at which the bounds fit inside the
//! padded output image, backs off one zoom level so features at the edges
//! are not clipped, and centers the map on the projected midpoint.

use map_common::{Bounds, LngLat, Viewport};

use crate::SphericalMercator;

pub const MIN_ZOOM: f64 = 0.0;
pub const MAX_ZOOM: f64 = 22.0;

/// Compute zoom and center that frame `bounds` in a `width` x `height` image.
///
/// `padding` is removed from each side of the image before fitting. The
/// caller is expected to have validated `|padding| < width / 2` and
/// `|padding| < height / 2`.
pub fn compute_viewport(bounds: &Bounds, width: u32, height: u32, padding: f64) -> Viewport {
    let merc = SphericalMercator::default();
    let base = MAX_ZOOM;

    let (left, bottom) = merc.px(LngLat::new(bounds.west, bounds.south), base);
    let (right, top) = merc.px(LngLat::new(bounds.east, bounds.north), base);

    let extent_x = (right - left).abs();
    let extent_y = (bottom - top).abs();
    let center = merc.ll((left + right) / 2.0, (top + bottom) / 2.0, base);

    let target_w = (width as f64 - 2.0 * padding).max(1.0);
    let target_h = (height as f64 - 2.0 * padding).max(1.0);

    let ratio = (extent_x / target_w).max(extent_y / target_h);
    let fitted = if ratio > 0.0 && ratio.is_finite() {
        (base - ratio.log2()).clamp(MIN_ZOOM, MAX_ZOOM)
    } else {
        MAX_ZOOM
    };

    Viewport::new((fitted - 1.0).max(MIN_ZOOM), center)
}
