//! Tile storage for static map export.
//!
//! Local tile archives are MBTiles files (SQLite databases) kept in a single
//! directory and referenced from styles as `mbtiles://<name>/...`.

pub mod local;
pub mod mbtiles;

pub use local::LocalTileStore;
pub use mbtiles::{MbTiles, MbTilesMetadata};
