//! Map projection math for viewport and tile placement.
//!
//! Implements spherical (Web) Mercator from scratch without external
//! dependencies.

pub mod mercator;
pub mod viewport;

pub use mercator::{SphericalMercator, MAX_LATITUDE};
pub use viewport::{compute_viewport, MAX_ZOOM, MIN_ZOOM};
