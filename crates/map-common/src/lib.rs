//! Common types and utilities shared across the static map export crates.

pub mod bounds;
pub mod error;
pub mod geo;
pub mod resource;
pub mod tile;

pub use bounds::{Bounds, BoundsParseError};
pub use error::{RenderError, RenderResult, ValidationError};
pub use geo::{LngLat, Viewport};
pub use resource::{ResourceKind, ResourceRequest, ResourceResponse};
pub use tile::TileCoord;
