//! Read-only access to MBTiles archives using sqlx.
//!
//! An MBTiles file is a SQLite database with a `metadata(name, value)` table
//! and a `tiles(zoom_level, tile_column, tile_row, tile_data)` table whose rows
//! use the TMS scheme (row 0 at the bottom).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use map_common::{RenderError, RenderResult};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::debug;

/// Parsed `metadata` table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MbTilesMetadata {
    pub name: Option<String>,
    /// Tile format, e.g. `pbf`, `png`, `jpg`
    pub format: Option<String>,
    pub minzoom: Option<u32>,
    pub maxzoom: Option<u32>,
    /// `[lng, lat, zoom]`
    pub center: Option<Vec<f64>>,
    /// `[west, south, east, north]`
    pub bounds: Option<Vec<f64>>,
    /// Every metadata row as stored
    pub raw: HashMap<String, String>,
}

impl MbTilesMetadata {
    fn from_rows(raw: HashMap<String, String>) -> Self {
        let number = |key: &str| raw.get(key).and_then(|v| v.trim().parse::<u32>().ok());
        let list = |key: &str| raw.get(key).and_then(|v| parse_number_list(v));

        Self {
            name: raw.get("name").cloned(),
            format: raw.get("format").cloned(),
            minzoom: number("minzoom"),
            maxzoom: number("maxzoom"),
            center: list("center"),
            bounds: list("bounds"),
            raw,
        }
    }

    pub fn is_vector(&self) -> bool {
        self.format.as_deref() == Some("pbf")
    }
}

fn parse_number_list(value: &str) -> Option<Vec<f64>> {
    value
        .split(',')
        .map(|part| part.trim().parse::<f64>().ok())
        .collect()
}

/// An open MBTiles archive.
#[derive(Debug, Clone)]
pub struct MbTiles {
    path: PathBuf,
    pool: SqlitePool,
}

impl MbTiles {
    /// Open an existing archive read-only.
    pub async fn open(path: &Path) -> RenderResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .read_only(true)
            .create_if_missing(false);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| archive_error(path, e))?;

        debug!(path = %path.display(), "Opened MBTiles archive");

        Ok(Self {
            path: path.to_path_buf(),
            pool,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the metadata table, filling zoom range and center the way tile
    /// servers do when the archive omits them.
    pub async fn metadata(&self) -> RenderResult<MbTilesMetadata> {
        let rows = sqlx::query("SELECT name, value FROM metadata")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| archive_error(&self.path, e))?;

        let mut raw = HashMap::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get("name").map_err(|e| archive_error(&self.path, e))?;
            let value: String = row.try_get("value").map_err(|e| archive_error(&self.path, e))?;
            raw.insert(name, value);
        }
        let mut metadata = MbTilesMetadata::from_rows(raw);

        if metadata.minzoom.is_none() || metadata.maxzoom.is_none() {
            let row = sqlx::query("SELECT MIN(zoom_level) AS minzoom, MAX(zoom_level) AS maxzoom FROM tiles")
                .fetch_one(&self.pool)
                .await
                .map_err(|e| archive_error(&self.path, e))?;
            let min: Option<i64> = row.try_get("minzoom").map_err(|e| archive_error(&self.path, e))?;
            let max: Option<i64> = row.try_get("maxzoom").map_err(|e| archive_error(&self.path, e))?;
            metadata.minzoom = metadata.minzoom.or(min.map(|z| z as u32));
            metadata.maxzoom = metadata.maxzoom.or(max.map(|z| z as u32));
        }

        if metadata.center.is_none() {
            if let (Some(b), Some(min), Some(max)) =
                (&metadata.bounds, metadata.minzoom, metadata.maxzoom)
            {
                if b.len() == 4 {
                    let range = max.saturating_sub(min);
                    let zoom = if range <= 1 { max } else { min + range / 2 };
                    metadata.center =
                        Some(vec![(b[0] + b[2]) / 2.0, (b[1] + b[3]) / 2.0, zoom as f64]);
                }
            }
        }

        Ok(metadata)
    }

    /// Raw tile blob at a TMS address, `None` when the archive has no such tile.
    pub async fn tile(&self, z: u32, x: u32, tms_y: u32) -> RenderResult<Option<Vec<u8>>> {
        let row = sqlx::query(
            "SELECT tile_data FROM tiles WHERE zoom_level = ? AND tile_column = ? AND tile_row = ?",
        )
        .bind(z as i64)
        .bind(x as i64)
        .bind(tms_y as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| archive_error(&self.path, e))?;

        match row {
            Some(row) => {
                let data: Vec<u8> = row
                    .try_get("tile_data")
                    .map_err(|e| archive_error(&self.path, e))?;
                Ok(Some(data))
            }
            None => Ok(None),
        }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn archive_error(path: &Path, err: sqlx::Error) -> RenderError {
    RenderError::Archive {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}
