//! Shared test utilities for the static map export workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Style document and bounding box fixtures
//! - PNG tile and premultiplied buffer generators
//! - An MBTiles archive writer
//! - A scripted local HTTP server for remote resources
//! - A render engine that records what it is asked to do
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```

pub mod engine;
pub mod fixtures;
pub mod generators;
pub mod mbtiles;
pub mod server;

// Re-export commonly used items at the crate root
pub use engine::{EngineLog, RecordingEngineFactory};
pub use fixtures::*;
pub use generators::*;
pub use mbtiles::MbTilesBuilder;
pub use server::{MockResponse, MockServer};
