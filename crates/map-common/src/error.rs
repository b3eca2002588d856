//! Error types for the render pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using RenderError.
pub type RenderResult<T> = Result<T, RenderError>;

/// A rejected render parameter.
///
/// Every rule of the parameter validator has its own variant so callers (the
/// HTTP server in particular) can map them to client errors without parsing
/// messages.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("style is a required parameter")]
    MissingStyle,

    #[error("width and height are required parameters and must be non-zero")]
    InvalidDimensions,

    #[error("Center must be longitude,latitude.  Invalid value found: {0}")]
    InvalidCenter(String),

    #[error("Center longitude is outside world bounds (-180 to 180 deg): {0}")]
    LongitudeOutOfRange(f64),

    #[error("Center latitude is outside world bounds (-90 to 90 deg): {0}")]
    LatitudeOutOfRange(f64),

    #[error("Zoom level is outside supported range (0-22): {0}")]
    ZoomOutOfRange(f64),

    #[error("Ratio is outside supported range (>=1): {0}")]
    RatioOutOfRange(f64),

    #[error("Bounds must be west,south,east,north.  Invalid value found: {0}")]
    InvalidBounds(String),

    #[error("Bounds west and east coordinate are the same value")]
    DegenerateLongitudeBounds,

    #[error("Bounds south and north coordinate are the same value")]
    DegenerateLatitudeBounds,

    #[error("Padding must be less than width / 2")]
    PaddingExceedsWidth,

    #[error("Padding must be less than height / 2")]
    PaddingExceedsHeight,

    #[error("Bearing is outside supported range (0-360): {0}")]
    BearingOutOfRange(f64),

    #[error("Pitch is outside supported range (0-60): {0}")]
    PitchOutOfRange(f64),

    #[error("Either center and zoom or bounds must be provided")]
    MissingViewport,
}

/// Primary error type for render operations.
#[derive(Debug, Error)]
pub enum RenderError {
    // === Request Errors ===
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("mapbox access token is required to request {url}")]
    MissingToken { url: String },

    #[error("Style has local mbtiles file sources, but no tilePath is set")]
    MissingTilePath,

    #[error("Mbtiles file {archive}.mbtiles in style file is not found in: {}", directory.display())]
    MissingArchiveFile { archive: String, directory: PathBuf },

    // === Resource Errors ===
    #[error("Error with request for: {url}\n{reason}")]
    RemoteFetch { url: String, reason: String },

    #[error("Request kind not handled: {0}")]
    UnsupportedResourceKind(u8),

    #[error("Failed to read tile archive {}: {reason}", path.display())]
    Archive { path: PathBuf, reason: String },

    #[error("Invalid url for image: {id}")]
    InvalidImageUrl { id: String },

    #[error("Error loading icon image: {id}\n{reason}")]
    IconLoad { id: String, reason: String },

    // === Rendering Errors ===
    #[error("Render engine failed: {0}")]
    RenderEngine(String),

    #[error("PNG encoding failed: {0}")]
    PngEncoding(String),

    // === Infrastructure Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    /// Short machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            RenderError::Validation(_) => "InvalidParameter",
            RenderError::MissingToken { .. } => "MissingToken",
            RenderError::MissingTilePath => "MissingTilePath",
            RenderError::MissingArchiveFile { .. } => "MissingArchiveFile",
            RenderError::RemoteFetch { .. } => "RemoteFetchFailed",
            RenderError::UnsupportedResourceKind(_) => "UnsupportedResourceKind",
            RenderError::Archive { .. } => "ArchiveError",
            RenderError::InvalidImageUrl { .. } => "InvalidImageUrl",
            RenderError::IconLoad { .. } => "IconLoadFailed",
            RenderError::RenderEngine(_) => "RenderEngineFailed",
            RenderError::PngEncoding(_) => "PngEncodingFailed",
            RenderError::Io(_) => "InternalError",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            RenderError::Validation(_)
            | RenderError::MissingTilePath
            | RenderError::MissingArchiveFile { .. }
            | RenderError::InvalidImageUrl { .. } => 400,

            _ => 500,
        }
    }

    /// Whether the failure was caused by the caller's parameters.
    pub fn is_validation(&self) -> bool {
        matches!(self, RenderError::Validation(_))
    }

    pub fn remote(url: impl Into<String>, reason: impl ToString) -> Self {
        RenderError::RemoteFetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<serde_json::Error> for RenderError {
    fn from(err: serde_json::Error) -> Self {
        RenderError::RenderEngine(format!("JSON error: {}", err))
    }
}
