//! GeoJSON and GPX overlays drawn on top of requested styles.
//!
//! Files are read once at startup from the overlay directory. GPX tracks and
//! routes become line features, waypoints become point features.

use std::collections::BTreeMap;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Name of the style source overlays are injected as.
pub const OVERLAY_SOURCE: &str = "geojson-line";

#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("Path to overlay files (GPX/geojson) does not exist: {0}")]
    MissingDirectory(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid GeoJSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("expected a FeatureCollection or a Feature, found {0}")]
    UnsupportedGeoJson(String),

    #[error("invalid GPX: {0}")]
    Gpx(String),
}

/// Features per overlay file name.
#[derive(Debug, Clone, Default)]
pub struct OverlayStore {
    files: BTreeMap<String, Vec<Value>>,
}

impl OverlayStore {
    /// Load every `.geojson` and `.gpx` file in `dir`.
    ///
    /// Files that fail to parse are logged and skipped.
    pub fn load_dir(dir: &Path) -> Result<Self, OverlayError> {
        if !dir.is_dir() {
            return Err(OverlayError::MissingDirectory(dir.display().to_string()));
        }

        let mut store = Self::default();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                continue;
            };

            let parsed = if name.ends_with(".geojson") {
                std::fs::read_to_string(&path)
                    .map_err(OverlayError::from)
                    .and_then(|text| parse_geojson(&text))
            } else if name.ends_with(".gpx") {
                std::fs::read_to_string(&path)
                    .map_err(OverlayError::from)
                    .and_then(|text| parse_gpx(&text))
            } else {
                continue;
            };

            match parsed {
                Ok(features) => {
                    debug!(file = %name, features = features.len(), "Loaded overlay file");
                    store.insert(name, features);
                }
                Err(e) => warn!(file = %name, error = %e, "Skipping overlay file"),
            }
        }

        info!(files = store.files.len(), path = %dir.display(), "Using local overlays (GPX/geojson)");
        Ok(store)
    }

    pub fn insert(&mut self, name: impl Into<String>, features: Vec<Value>) {
        self.files.insert(name.into(), features);
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Features of the named files: `*` for all, otherwise a comma separated
    /// list. Unknown names are ignored.
    pub fn select(&self, names: &str) -> Vec<Value> {
        if names.trim() == "*" {
            return self.files.values().flatten().cloned().collect();
        }
        names
            .split(',')
            .filter_map(|name| self.files.get(name.trim()))
            .flatten()
            .cloned()
            .collect()
    }
}

/// Add `features` to the style as the overlay GeoJSON source.
pub fn inject(style: &mut Value, features: Vec<Value>) {
    let Some(root) = style.as_object_mut() else {
        return;
    };
    let sources = root
        .entry("sources")
        .or_insert_with(|| Value::Object(Map::new()));
    if !sources.is_object() {
        *sources = Value::Object(Map::new());
    }
    if let Some(sources) = sources.as_object_mut() {
        sources.insert(
            OVERLAY_SOURCE.to_string(),
            json!({
                "type": "geojson",
                "data": { "type": "FeatureCollection", "features": features }
            }),
        );
    }
}

/// `[west, south, east, north]` of every position in `features`.
pub fn bbox(features: &[Value]) -> Option<[f64; 4]> {
    let mut extent: Option<[f64; 4]> = None;
    for feature in features {
        if let Some(geometry) = feature.get("geometry") {
            visit_geometry(geometry, &mut |lng, lat| {
                let e = extent.get_or_insert([lng, lat, lng, lat]);
                e[0] = e[0].min(lng);
                e[1] = e[1].min(lat);
                e[2] = e[2].max(lng);
                e[3] = e[3].max(lat);
            });
        }
    }
    extent
}

fn visit_geometry(geometry: &Value, f: &mut impl FnMut(f64, f64)) {
    if let Some(coordinates) = geometry.get("coordinates") {
        visit_positions(coordinates, f);
    }
    if let Some(Value::Array(geometries)) = geometry.get("geometries") {
        for g in geometries {
            visit_geometry(g, f);
        }
    }
}

fn visit_positions(value: &Value, f: &mut impl FnMut(f64, f64)) {
    let Value::Array(items) = value else {
        return;
    };
    if let (Some(lng), Some(lat)) = (
        items.first().and_then(Value::as_f64),
        items.get(1).and_then(Value::as_f64),
    ) {
        f(lng, lat);
        return;
    }
    for item in items {
        visit_positions(item, f);
    }
}

/// Features of a GeoJSON document (a FeatureCollection or a single Feature).
pub fn parse_geojson(text: &str) -> Result<Vec<Value>, OverlayError> {
    let doc: Value = serde_json::from_str(text)?;
    match doc.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => Ok(doc
            .get("features")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()),
        Some("Feature") => Ok(vec![doc]),
        other => Err(OverlayError::UnsupportedGeoJson(
            other.unwrap_or("untyped").to_string(),
        )),
    }
}

/// Feature being assembled from a `trk`, `rte` or `wpt` element.
#[derive(Default)]
struct Pending {
    properties: Map<String, Value>,
    segments: Vec<Vec<Value>>,
    point: Option<Value>,
}

impl Pending {
    fn into_feature(self, kind: &[u8]) -> Option<Value> {
        let geometry = match kind {
            b"wpt" => json!({ "type": "Point", "coordinates": self.point? }),
            _ => {
                let mut lines: Vec<Vec<Value>> =
                    self.segments.into_iter().filter(|s| !s.is_empty()).collect();
                match lines.len() {
                    0 => return None,
                    1 => json!({ "type": "LineString", "coordinates": lines.remove(0) }),
                    _ => json!({ "type": "MultiLineString", "coordinates": lines }),
                }
            }
        };
        Some(json!({
            "type": "Feature",
            "properties": self.properties,
            "geometry": geometry,
        }))
    }
}

fn position(e: &BytesStart<'_>) -> Result<Option<Value>, OverlayError> {
    let mut lat = None;
    let mut lon = None;
    for attr in e.attributes() {
        let attr = attr.map_err(|err| OverlayError::Gpx(err.to_string()))?;
        let value = attr
            .unescape_value()
            .map_err(|err| OverlayError::Gpx(err.to_string()))?;
        match attr.key.as_ref() {
            b"lat" => lat = value.trim().parse::<f64>().ok(),
            b"lon" => lon = value.trim().parse::<f64>().ok(),
            _ => {}
        }
    }
    Ok(lat.zip(lon).map(|(lat, lon)| json!([lon, lat])))
}

/// Tracks, routes and waypoints of a GPX document as GeoJSON features.
pub fn parse_gpx(text: &str) -> Result<Vec<Value>, OverlayError> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut features = Vec::new();
    // Innermost open feature element and what is being built for it
    let mut current: Option<(Vec<u8>, Pending)> = None;
    // Property element whose text is being read, e.g. `name`
    let mut property: Option<String> = None;
    // Inside a track or route point, whose `name` is not the feature name
    let mut in_point = false;
    let mut buf = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| OverlayError::Gpx(e.to_string()))?;
        match event {
            Event::Start(e) => match e.local_name().as_ref() {
                kind @ (b"trk" | b"rte") => {
                    let mut pending = Pending::default();
                    if kind == b"rte" {
                        pending.segments.push(Vec::new());
                    }
                    current = Some((kind.to_vec(), pending));
                }
                b"wpt" => {
                    let pending = Pending {
                        point: position(&e)?,
                        ..Default::default()
                    };
                    current = Some((b"wpt".to_vec(), pending));
                }
                b"trkseg" => {
                    if let Some((_, pending)) = current.as_mut() {
                        pending.segments.push(Vec::new());
                    }
                }
                b"trkpt" | b"rtept" => {
                    push_point(&mut current, &e)?;
                    in_point = true;
                }
                name @ (b"name" | b"desc" | b"type" | b"cmt") if !in_point => {
                    property = Some(String::from_utf8_lossy(name).into_owned());
                }
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"trkpt" | b"rtept" => push_point(&mut current, &e)?,
                b"wpt" => {
                    let pending = Pending {
                        point: position(&e)?,
                        ..Default::default()
                    };
                    features.extend(pending.into_feature(b"wpt"));
                }
                _ => {}
            },
            Event::Text(t) => {
                if let (Some(key), Some((_, pending))) = (property.as_ref(), current.as_mut()) {
                    let text = t.unescape().map_err(|e| OverlayError::Gpx(e.to_string()))?;
                    pending
                        .properties
                        .insert(key.clone(), Value::String(text.into_owned()));
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"trkpt" | b"rtept" => in_point = false,
                b"name" | b"desc" | b"type" | b"cmt" => property = None,
                kind @ (b"trk" | b"rte" | b"wpt") => {
                    if let Some((open, pending)) = current.take() {
                        if open == kind {
                            features.extend(pending.into_feature(kind));
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(features)
}

fn push_point(current: &mut Option<(Vec<u8>, Pending)>, e: &BytesStart<'_>) -> Result<(), OverlayError> {
    let Some(point) = position(e)? else {
        return Ok(());
    };
    if let Some((_, pending)) = current.as_mut() {
        if pending.segments.is_empty() {
            pending.segments.push(Vec::new());
        }
        if let Some(segment) = pending.segments.last_mut() {
            segment.push(point);
        }
    }
    Ok(())
}
