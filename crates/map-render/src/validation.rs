//! Render parameter validation.
//!
//! Rules run in a fixed order and the first failure wins, so a request with
//! several problems always reports the same one. Nothing here does I/O.

use std::collections::HashMap;
use std::path::PathBuf;

use map_common::{Bounds, LngLat, ValidationError, Viewport};
use projection::{compute_viewport, MAX_ZOOM, MIN_ZOOM};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A custom icon to register with the engine before rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSpec {
    /// `http(s)://` URL or `data:` URI
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_pixel_ratio")]
    pub pixel_ratio: f64,
    #[serde(default)]
    pub sdf: bool,
}

fn default_pixel_ratio() -> f64 {
    1.0
}

impl ImageSpec {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            pixel_ratio: default_pixel_ratio(),
            sdf: false,
        }
    }
}

/// Optional render parameters, as supplied by a caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderOptions {
    pub zoom: Option<f64>,
    /// `[lng, lat]`
    pub center: Option<Vec<f64>>,
    /// `[west, south, east, north]`
    pub bounds: Option<Vec<f64>>,
    pub bearing: Option<f64>,
    pub pitch: Option<f64>,
    /// Whole number, at least 1
    pub ratio: Option<f64>,
    /// Pixels kept clear around `bounds`
    pub padding: Option<f64>,
    /// Directory holding `<name>.mbtiles` archives
    pub tile_path: Option<PathBuf>,
    /// Hosted map API access token
    pub token: Option<String>,
    #[serde(default)]
    pub images: HashMap<String, ImageSpec>,
}

/// A render request that passed every rule.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    pub style: Value,
    pub width: u32,
    pub height: u32,
    pub zoom: Option<f64>,
    pub center: Option<LngLat>,
    pub bounds: Option<Bounds>,
    pub bearing: f64,
    pub pitch: f64,
    pub ratio: u32,
    pub padding: f64,
    pub tile_path: Option<PathBuf>,
    pub token: Option<String>,
    pub images: HashMap<String, ImageSpec>,
}

impl ValidatedRequest {
    /// Whether the viewport has to be derived from `bounds`.
    pub fn needs_viewport(&self) -> bool {
        self.bounds.is_some() && (self.zoom.is_none() || self.center.is_none())
    }

    /// The camera for this request, deriving it from `bounds` when needed.
    pub fn viewport(&self) -> Viewport {
        match (self.zoom, self.center, self.bounds) {
            (Some(zoom), Some(center), _) => Viewport::new(zoom, center),
            (_, _, Some(bounds)) => compute_viewport(&bounds, self.width, self.height, self.padding),
            // Unreachable after validation; zoom 0 over null island keeps it total
            (zoom, center, None) => Viewport::new(
                zoom.unwrap_or(MIN_ZOOM),
                center.unwrap_or(LngLat::new(0.0, 0.0)),
            ),
        }
    }
}

fn join(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Validate render parameters.
pub fn validate(
    style: Value,
    width: u32,
    height: u32,
    options: &RenderOptions,
) -> Result<ValidatedRequest, ValidationError> {
    if style.is_null() {
        return Err(ValidationError::MissingStyle);
    }

    if width == 0 || height == 0 {
        return Err(ValidationError::InvalidDimensions);
    }

    let center = match &options.center {
        None => None,
        Some(values) => {
            let &[lng, lat] = values.as_slice() else {
                return Err(ValidationError::InvalidCenter(join(values)));
            };
            if !lng.is_finite() || lng.abs() > 180.0 {
                return Err(ValidationError::LongitudeOutOfRange(lng));
            }
            if !lat.is_finite() || lat.abs() > 90.0 {
                return Err(ValidationError::LatitudeOutOfRange(lat));
            }
            Some(LngLat::new(lng, lat))
        }
    };

    if let Some(zoom) = options.zoom {
        if !zoom.is_finite() || !(MIN_ZOOM..=MAX_ZOOM).contains(&zoom) {
            return Err(ValidationError::ZoomOutOfRange(zoom));
        }
    }

    let bearing = options.bearing.unwrap_or(0.0);
    if !(0.0..=360.0).contains(&bearing) {
        return Err(ValidationError::BearingOutOfRange(bearing));
    }

    let pitch = options.pitch.unwrap_or(0.0);
    if !(0.0..=60.0).contains(&pitch) {
        return Err(ValidationError::PitchOutOfRange(pitch));
    }

    let padding = options.padding.unwrap_or(0.0);
    let bounds = match &options.bounds {
        None => None,
        Some(values) => {
            let bounds = Bounds::from_slice(values)
                .filter(|b| b.to_array().iter().all(|v| v.is_finite()))
                .ok_or_else(|| ValidationError::InvalidBounds(join(values)))?;
            if bounds.west == bounds.east {
                return Err(ValidationError::DegenerateLongitudeBounds);
            }
            if bounds.south == bounds.north {
                return Err(ValidationError::DegenerateLatitudeBounds);
            }

            if padding != 0.0 {
                if !padding.is_finite() || padding.abs() >= width as f64 / 2.0 {
                    return Err(ValidationError::PaddingExceedsWidth);
                }
                if padding.abs() >= height as f64 / 2.0 {
                    return Err(ValidationError::PaddingExceedsHeight);
                }
            }
            Some(bounds)
        }
    };

    let ratio = options.ratio.unwrap_or(1.0);
    if !ratio.is_finite() || ratio < 1.0 || ratio.fract() != 0.0 || ratio > u32::MAX as f64 {
        return Err(ValidationError::RatioOutOfRange(ratio));
    }
    // Physical image size must be addressable
    if width.checked_mul(ratio as u32).is_none() || height.checked_mul(ratio as u32).is_none() {
        return Err(ValidationError::RatioOutOfRange(ratio));
    }

    if !((center.is_some() && options.zoom.is_some()) || bounds.is_some()) {
        return Err(ValidationError::MissingViewport);
    }

    Ok(ValidatedRequest {
        style,
        width,
        height,
        zoom: options.zoom,
        center,
        bounds,
        bearing,
        pitch,
        ratio: ratio as u32,
        padding,
        tile_path: options.tile_path.clone(),
        token: options.token.clone(),
        images: options.images.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn style() -> Value {
        json!({ "version": 8, "sources": {}, "layers": [] })
    }

    fn centered(zoom: f64) -> RenderOptions {
        RenderOptions {
            zoom: Some(zoom),
            center: Some(vec![-79.86, 32.68]),
            ..Default::default()
        }
    }

    fn bounded(padding: f64) -> RenderOptions {
        RenderOptions {
            bounds: Some(vec![-80.0, 32.0, -79.0, 33.0]),
            padding: Some(padding),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_center_and_zoom() {
        let req = validate(style(), 512, 256, &centered(10.0)).unwrap();
        assert_eq!(req.ratio, 1);
        assert_eq!(req.bearing, 0.0);
        assert!(!req.needs_viewport());
        assert_eq!(req.viewport(), Viewport::new(10.0, LngLat::new(-79.86, 32.68)));
    }

    #[test]
    fn test_missing_style_and_dimensions() {
        assert_eq!(
            validate(Value::Null, 10, 10, &centered(1.0)),
            Err(ValidationError::MissingStyle)
        );
        assert_eq!(
            validate(style(), 0, 10, &centered(1.0)),
            Err(ValidationError::InvalidDimensions)
        );
        assert_eq!(
            validate(style(), 10, 0, &centered(1.0)),
            Err(ValidationError::InvalidDimensions)
        );
    }

    #[test]
    fn test_center_rules() {
        let mut options = centered(1.0);
        options.center = Some(vec![1.0, 2.0, 3.0]);
        let err = validate(style(), 10, 10, &options).unwrap_err();
        assert_eq!(err.to_string(), "Center must be longitude,latitude.  Invalid value found: 1,2,3");

        options.center = Some(vec![-180.5, 0.0]);
        assert_eq!(
            validate(style(), 10, 10, &options),
            Err(ValidationError::LongitudeOutOfRange(-180.5))
        );

        options.center = Some(vec![180.0, 90.5]);
        assert_eq!(
            validate(style(), 10, 10, &options),
            Err(ValidationError::LatitudeOutOfRange(90.5))
        );

        options.center = Some(vec![180.0, -90.0]);
        assert!(validate(style(), 10, 10, &options).is_ok());
    }

    #[test]
    fn test_zoom_range() {
        assert!(validate(style(), 10, 10, &centered(0.0)).is_ok());
        assert!(validate(style(), 10, 10, &centered(22.0)).is_ok());
        assert_eq!(
            validate(style(), 10, 10, &centered(22.5)),
            Err(ValidationError::ZoomOutOfRange(22.5))
        );
        assert_eq!(
            validate(style(), 10, 10, &centered(-1.0)),
            Err(ValidationError::ZoomOutOfRange(-1.0))
        );
    }

    #[test]
    fn test_ratio_must_be_whole_and_positive() {
        for bad in [0.0, 0.5, 1.5, -2.0] {
            let mut options = centered(1.0);
            options.ratio = Some(bad);
            assert_eq!(
                validate(style(), 10, 10, &options),
                Err(ValidationError::RatioOutOfRange(bad))
            );
        }
        let mut options = centered(1.0);
        options.ratio = Some(2.0);
        assert_eq!(validate(style(), 10, 10, &options).unwrap().ratio, 2);
    }

    #[test]
    fn test_bounds_rules() {
        let mut options = bounded(0.0);
        options.bounds = Some(vec![1.0, 2.0, 3.0]);
        let err = validate(style(), 10, 10, &options).unwrap_err();
        assert_eq!(err.to_string(), "Bounds must be west,south,east,north.  Invalid value found: 1,2,3");

        options.bounds = Some(vec![5.0, 0.0, 5.0, 1.0]);
        assert_eq!(
            validate(style(), 10, 10, &options),
            Err(ValidationError::DegenerateLongitudeBounds)
        );

        options.bounds = Some(vec![0.0, 1.0, 5.0, 1.0]);
        assert_eq!(
            validate(style(), 10, 10, &options),
            Err(ValidationError::DegenerateLatitudeBounds)
        );
    }

    #[test]
    fn test_padding_boundary() {
        // width / 2 fails, width / 2 - 1 passes
        assert_eq!(
            validate(style(), 100, 400, &bounded(50.0)),
            Err(ValidationError::PaddingExceedsWidth)
        );
        assert!(validate(style(), 100, 400, &bounded(49.0)).is_ok());

        assert_eq!(
            validate(style(), 400, 100, &bounded(50.0)),
            Err(ValidationError::PaddingExceedsHeight)
        );
        assert!(validate(style(), 400, 100, &bounded(49.0)).is_ok());

        // Negative padding is measured by magnitude
        assert_eq!(
            validate(style(), 100, 400, &bounded(-50.0)),
            Err(ValidationError::PaddingExceedsWidth)
        );
    }

    #[test]
    fn test_padding_ignored_without_bounds() {
        let mut options = centered(3.0);
        options.padding = Some(1000.0);
        assert!(validate(style(), 10, 10, &options).is_ok());
    }

    #[test]
    fn test_bearing_and_pitch() {
        let mut options = centered(3.0);
        options.bearing = Some(361.0);
        assert_eq!(
            validate(style(), 10, 10, &options),
            Err(ValidationError::BearingOutOfRange(361.0))
        );

        options.bearing = Some(360.0);
        options.pitch = Some(61.0);
        assert_eq!(
            validate(style(), 10, 10, &options),
            Err(ValidationError::PitchOutOfRange(61.0))
        );

        options.pitch = Some(60.0);
        assert!(validate(style(), 10, 10, &options).is_ok());
    }

    #[test]
    fn test_viewport_required() {
        let options = RenderOptions {
            center: Some(vec![0.0, 0.0]),
            ..Default::default()
        };
        let err = validate(style(), 10, 10, &options).unwrap_err();
        assert_eq!(err.to_string(), "Either center and zoom or bounds must be provided");

        let options = RenderOptions {
            zoom: Some(3.0),
            ..Default::default()
        };
        assert_eq!(validate(style(), 10, 10, &options), Err(ValidationError::MissingViewport));
    }

    #[test]
    fn test_bounds_derive_viewport() {
        let req = validate(style(), 512, 512, &bounded(0.0)).unwrap();
        assert!(req.needs_viewport());
        let viewport = req.viewport();
        assert!(viewport.zoom > 0.0);
        assert!(req.bounds.unwrap().contains(viewport.center.lng, viewport.center.lat));
    }

    #[test]
    fn test_first_failure_wins() {
        let options = RenderOptions {
            zoom: Some(30.0),
            center: Some(vec![200.0, 0.0]),
            bearing: Some(-1.0),
            ..Default::default()
        };
        assert_eq!(
            validate(style(), 10, 10, &options),
            Err(ValidationError::LongitudeOutOfRange(200.0))
        );
    }

    #[test]
    fn test_bearing_checked_before_bounds() {
        let options = RenderOptions {
            bounds: Some(vec![5.0, 0.0, 5.0, 1.0]),
            bearing: Some(400.0),
            pitch: Some(90.0),
            ..Default::default()
        };
        assert_eq!(
            validate(style(), 10, 10, &options),
            Err(ValidationError::BearingOutOfRange(400.0))
        );
    }

    #[test]
    fn test_non_finite_padding_rejected() {
        assert_eq!(
            validate(style(), 512, 512, &bounded(f64::NAN)),
            Err(ValidationError::PaddingExceedsWidth)
        );
        assert_eq!(
            validate(style(), 512, 512, &bounded(f64::INFINITY)),
            Err(ValidationError::PaddingExceedsWidth)
        );
    }

    #[test]
    fn test_ratio_overflowing_image_size_rejected() {
        let mut options = centered(1.0);
        options.ratio = Some(u32::MAX as f64);
        assert_eq!(
            validate(style(), 2, 1, &options),
            Err(ValidationError::RatioOutOfRange(u32::MAX as f64))
        );
        assert_eq!(
            validate(style(), 1, 2, &options),
            Err(ValidationError::RatioOutOfRange(u32::MAX as f64))
        );
    }

    #[test]
    fn test_image_spec_defaults() {
        let spec: ImageSpec = serde_json::from_value(json!({ "url": "https://x/y.png" })).unwrap();
        assert_eq!(spec.pixel_ratio, 1.0);
        assert!(!spec.sdf);

        let spec: ImageSpec =
            serde_json::from_value(json!({ "url": "u", "pixelRatio": 2, "sdf": true })).unwrap();
        assert_eq!(spec.pixel_ratio, 2.0);
        assert!(spec.sdf);
    }
}
