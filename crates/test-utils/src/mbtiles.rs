//! Writing small MBTiles archives for tests.

use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

/// Builds `<dir>/<name>.mbtiles` with the given metadata and tiles.
///
/// Tiles are added with XYZ rows and stored with TMS rows, as real archives do.
#[derive(Debug, Clone)]
pub struct MbTilesBuilder {
    path: PathBuf,
    metadata: Vec<(String, String)>,
    tiles: Vec<(u32, u32, u32, Vec<u8>)>,
}

impl MbTilesBuilder {
    pub fn new(dir: &Path, name: &str) -> Self {
        Self {
            path: dir.join(format!("{name}.mbtiles")),
            metadata: vec![("name".to_string(), name.to_string())],
            tiles: Vec::new(),
        }
    }

    pub fn metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.push((key.to_string(), value.to_string()));
        self
    }

    /// Vector archive metadata: `format=pbf` plus zoom range and bounds.
    pub fn vector(self, minzoom: u32, maxzoom: u32) -> Self {
        self.metadata("format", "pbf")
            .metadata("minzoom", &minzoom.to_string())
            .metadata("maxzoom", &maxzoom.to_string())
            .metadata("bounds", "-180,-85.0511,180,85.0511")
            .metadata("center", "0,0,1")
    }

    /// Raster archive metadata: `format=png` plus zoom range and bounds.
    pub fn raster(self, minzoom: u32, maxzoom: u32) -> Self {
        self.metadata("format", "png")
            .metadata("minzoom", &minzoom.to_string())
            .metadata("maxzoom", &maxzoom.to_string())
            .metadata("bounds", "-180,-85.0511,180,85.0511")
    }

    /// Store a tile blob as-is at an XYZ address.
    pub fn tile(mut self, z: u32, x: u32, y: u32, data: Vec<u8>) -> Self {
        self.tiles.push((z, x, y, data));
        self
    }

    /// Store a gzip-compressed tile at an XYZ address, the usual vector layout.
    pub fn gzipped_tile(self, z: u32, x: u32, y: u32, data: &[u8]) -> Self {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).expect("gzip into memory");
        let compressed = encoder.finish().expect("gzip into memory");
        self.tile(z, x, y, compressed)
    }

    /// Write the archive and return its path.
    pub async fn build(self) -> PathBuf {
        let options = SqliteConnectOptions::new()
            .filename(&self.path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .expect("create MBTiles file");

        sqlx::query("CREATE TABLE metadata (name TEXT, value TEXT)")
            .execute(&pool)
            .await
            .expect("create metadata table");
        sqlx::query(
            "CREATE TABLE tiles (zoom_level INTEGER, tile_column INTEGER, tile_row INTEGER, tile_data BLOB)",
        )
        .execute(&pool)
        .await
        .expect("create tiles table");

        for (key, value) in &self.metadata {
            sqlx::query("INSERT INTO metadata (name, value) VALUES (?, ?)")
                .bind(key)
                .bind(value)
                .execute(&pool)
                .await
                .expect("insert metadata");
        }

        for (z, x, y, data) in &self.tiles {
            let tms_y = (1u32 << z) - 1 - y;
            sqlx::query(
                "INSERT INTO tiles (zoom_level, tile_column, tile_row, tile_data) VALUES (?, ?, ?, ?)",
            )
            .bind(*z as i64)
            .bind(*x as i64)
            .bind(tms_y as i64)
            .bind(data.as_slice())
            .execute(&pool)
            .await
            .expect("insert tile");
        }

        pool.close().await;
        self.path
    }
}
