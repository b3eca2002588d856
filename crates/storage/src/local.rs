//! Serving `mbtiles://` references from a directory of archives.
//!
//! `mbtiles://<service>/<z>/<x>/<y>[.ext]` maps to `<tile_path>/<service>.mbtiles`.
//! A store is created per render; archives it opens stay open for the rest of
//! that render and are dropped with it.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use flate2::read::{GzDecoder, ZlibDecoder};
use map_common::{RenderError, RenderResult, ResourceResponse, TileCoord};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::mbtiles::MbTiles;

/// URL scheme of local tile archive references.
pub const MBTILES_SCHEME: &str = "mbtiles://";

pub fn is_mbtiles_url(url: &str) -> bool {
    url.starts_with(MBTILES_SCHEME)
}

/// Archive name of a local reference: the segment right after `://`.
pub fn service_name(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    rest.split('/').next().unwrap_or(rest)
}

/// File backing a local reference.
pub fn resolve_file_path(tile_path: &Path, url: &str) -> PathBuf {
    tile_path.join(format!("{}.mbtiles", service_name(url)))
}

pub struct LocalTileStore {
    tile_path: PathBuf,
    archives: Mutex<HashMap<String, Arc<MbTiles>>>,
}

impl LocalTileStore {
    pub fn new(tile_path: impl Into<PathBuf>) -> Self {
        Self {
            tile_path: tile_path.into(),
            archives: Mutex::new(HashMap::new()),
        }
    }

    pub fn tile_path(&self) -> &Path {
        &self.tile_path
    }

    async fn archive(&self, url: &str) -> RenderResult<Arc<MbTiles>> {
        let service = service_name(url);
        let mut archives = self.archives.lock().await;
        if let Some(archive) = archives.get(service) {
            return Ok(archive.clone());
        }

        let archive = Arc::new(MbTiles::open(&resolve_file_path(&self.tile_path, url)).await?);
        archives.insert(service.to_string(), archive.clone());
        Ok(archive)
    }

    /// TileJSON for an archive, pointing its tiles back at `mbtiles://`.
    #[instrument(skip(self))]
    pub async fn get_tile_json(&self, url: &str) -> RenderResult<ResourceResponse> {
        let archive = self.archive(url).await?;
        let metadata = archive.metadata().await?;

        let service = service_name(url);
        let ext = if metadata.is_vector() { ".pbf" } else { "" };
        let tilejson = json!({
            "tilejson": "1.0.0",
            "tiles": [format!("{MBTILES_SCHEME}{service}/{{z}}/{{x}}/{{y}}{ext}")],
            "minzoom": metadata.minzoom,
            "maxzoom": metadata.maxzoom,
            "center": metadata.center,
            "bounds": metadata.bounds,
        });

        Ok(ResourceResponse::from(serde_json::to_vec(&tilejson)?))
    }

    /// One tile from an archive. Vector tiles come back decompressed.
    #[instrument(skip(self))]
    pub async fn get_tile(&self, url: &str) -> RenderResult<ResourceResponse> {
        let coord = TileCoord::from_url(url).ok_or_else(|| RenderError::Archive {
            path: resolve_file_path(&self.tile_path, url),
            reason: format!("no z/x/y tile address in {url}"),
        })?;

        let Some(tms_y) = coord.tms_y() else {
            debug!(z = coord.z, x = coord.x, y = coord.y, "Tile outside tile matrix");
            return Ok(ResourceResponse::Empty);
        };

        let archive = self.archive(url).await?;
        let Some(data) = archive.tile(coord.z, coord.x, tms_y).await? else {
            debug!(z = coord.z, x = coord.x, y = coord.y, "Tile not in archive");
            return Ok(ResourceResponse::Empty);
        };

        if is_vector_url(url) {
            let data = decompress(&data).map_err(|e| RenderError::Archive {
                path: archive.path().to_path_buf(),
                reason: format!("failed to decompress tile {}/{}/{}: {e}", coord.z, coord.x, coord.y),
            })?;
            return Ok(ResourceResponse::from(data));
        }

        Ok(ResourceResponse::from(data))
    }

    /// Close every archive opened by this store.
    pub async fn close(&self) {
        let mut archives = self.archives.lock().await;
        for (_, archive) in archives.drain() {
            archive.close().await;
        }
    }
}

fn is_vector_url(url: &str) -> bool {
    let path = url.split(&['?', '#'][..]).next().unwrap_or(url);
    Path::new(path).extension().and_then(|e| e.to_str()) == Some("pbf")
}

/// Inflate gzip or zlib data, detected by header. Anything else passes through.
fn decompress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() * 4);
    match data {
        [0x1f, 0x8b, ..] => {
            GzDecoder::new(data).read_to_end(&mut out)?;
        }
        [cmf, flg, ..] if cmf & 0x0f == 8 && (u16::from(*cmf) << 8 | u16::from(*flg)) % 31 == 0 => {
            ZlibDecoder::new(data).read_to_end(&mut out)?;
        }
        _ => out.extend_from_slice(data),
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::{GzEncoder, ZlibEncoder};
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_service_name_and_path() {
        assert_eq!(service_name("mbtiles://land"), "land");
        assert_eq!(service_name("mbtiles://land/3/4/2.pbf"), "land");
        assert_eq!(
            resolve_file_path(Path::new("/data/tiles"), "mbtiles://geography-class/0/0/0.png"),
            PathBuf::from("/data/tiles/geography-class.mbtiles")
        );
        assert!(is_mbtiles_url("mbtiles://land"));
        assert!(!is_mbtiles_url("https://example.com/land"));
    }

    #[test]
    fn test_vector_url_detection() {
        assert!(is_vector_url("mbtiles://land/0/0/0.pbf"));
        assert!(is_vector_url("mbtiles://land/0/0/0.pbf?fresh=1"));
        assert!(!is_vector_url("mbtiles://geography-class/0/0/0"));
        assert!(!is_vector_url("mbtiles://geography-class/0/0/0.png"));
    }

    #[test]
    fn test_decompress_gzip_zlib_and_plain() {
        let payload = b"vector tile bytes".to_vec();

        let mut gz = GzEncoder::new(Vec::new(), Compression::default());
        gz.write_all(&payload).unwrap();
        assert_eq!(decompress(&gz.finish().unwrap()).unwrap(), payload);

        let mut zlib = ZlibEncoder::new(Vec::new(), Compression::default());
        zlib.write_all(&payload).unwrap();
        assert_eq!(decompress(&zlib.finish().unwrap()).unwrap(), payload);

        assert_eq!(decompress(&payload).unwrap(), payload);
        assert!(decompress(&[]).unwrap().is_empty());
    }
}
