//! Checking a style's local archive references before rendering.

use std::path::Path;

use map_common::{RenderError, RenderResult};
use serde_json::Value;
use storage::local::MBTILES_SCHEME;

/// Archive names referenced as `mbtiles://<name>` anywhere in the style.
///
/// A name ends at the next `/` or at the end of the string value.
pub fn local_archives(style: &Value) -> Vec<String> {
    let mut names = Vec::new();
    collect(style, &mut names);
    names
}

fn collect(value: &Value, names: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            let mut rest = s.as_str();
            while let Some(start) = rest.find(MBTILES_SCHEME) {
                rest = &rest[start + MBTILES_SCHEME.len()..];
                let end = rest.find('/').unwrap_or(rest.len());
                let name = &rest[..end];
                if !name.is_empty() && !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
                rest = &rest[end..];
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect(v, names)),
        Value::Object(map) => map.values().for_each(|v| collect(v, names)),
        _ => {}
    }
}

/// Fail fast when the style references local archives that cannot be served.
pub fn check_local_archives(style: &Value, tile_path: Option<&Path>) -> RenderResult<()> {
    let archives = local_archives(style);
    if archives.is_empty() {
        return Ok(());
    }

    let directory = tile_path.ok_or(RenderError::MissingTilePath)?;
    for archive in archives {
        if !directory.join(format!("{archive}.mbtiles")).is_file() {
            return Err(RenderError::MissingArchiveFile {
                archive,
                directory: directory.to_path_buf(),
            });
        }
    }
    Ok(())
}
