//! Rewriting `mapbox://` references to hosted API URLs.
//!
//! Every normalizer needs an access token; without one the reference cannot
//! be fetched and resolution fails with [`RenderError::MissingToken`].

use map_common::{RenderError, RenderResult};
use reqwest::Url;

pub const MAPBOX_SCHEME: &str = "mapbox://";

const API_HOST: &str = "api.mapbox.com";
const TILES_HOST: &str = "a.tiles.mapbox.com";

pub fn is_mapbox_url(url: &str) -> bool {
    url.starts_with(MAPBOX_SCHEME)
}

pub fn is_mapbox_style_url(url: &str) -> bool {
    url.starts_with("mapbox://styles/")
}

/// Pieces of `mapbox://<kind>/<path>?<query>`.
struct Reference<'a> {
    /// Everything between the scheme and the query
    body: &'a str,
    /// Path after the first segment, with its leading slash
    path: &'a str,
    query: Option<&'a str>,
}

fn split(url: &str) -> Reference<'_> {
    let rest = url.strip_prefix(MAPBOX_SCHEME).unwrap_or(url);
    let (body, query) = match rest.split_once('?') {
        Some((body, query)) => (body, Some(query).filter(|q| !q.is_empty())),
        None => (rest, None),
    };
    let path = body.find('/').map_or("", |i| &body[i..]);
    Reference { body, path, query }
}

fn require_token<'a>(url: &str, token: Option<&'a str>) -> RenderResult<&'a str> {
    token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| RenderError::MissingToken {
            url: url.to_string(),
        })
}

fn build(
    source: &str,
    host: &str,
    path: &str,
    query: Option<&str>,
    params: &[(&str, &str)],
) -> RenderResult<String> {
    let mut url = Url::parse(&format!("https://{host}"))
        .map_err(|e| RenderError::remote(source, format!("could not normalize url: {e}")))?;
    url.set_path(path);
    url.set_query(query);
    {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in params {
            pairs.append_pair(key, value);
        }
    }
    Ok(url.to_string())
}

/// `mapbox://mapbox.mapbox-streets-v7` to its TileJSON URL.
pub fn normalize_source_url(url: &str, token: Option<&str>) -> RenderResult<String> {
    let token = require_token(url, token)?;
    let reference = split(url);
    build(
        url,
        API_HOST,
        &format!("/v4/{}.json", reference.body),
        reference.query,
        &[("secure", "true"), ("access_token", token)],
    )
}

/// `mapbox://tiles/<tileset>/<z>/<x>/<y>.<ext>` to its tile URL.
pub fn normalize_tile_url(url: &str, token: Option<&str>) -> RenderResult<String> {
    let token = require_token(url, token)?;
    let reference = split(url);
    build(
        url,
        TILES_HOST,
        &format!("/v4{}", reference.path),
        reference.query,
        &[("access_token", token)],
    )
}

/// `mapbox://styles/<user>/<style>` to its style document URL.
pub fn normalize_style_url(url: &str, token: Option<&str>) -> RenderResult<String> {
    let token = require_token(url, token)?;
    let reference = split(url);
    build(
        url,
        API_HOST,
        &format!("/styles/v1{}", reference.path),
        None,
        &[("access_token", token), ("secure", "true")],
    )
}

/// `mapbox://sprites/<user>/<style>[@2x].(png|json)` to its sprite URL.
pub fn normalize_sprite_url(url: &str, token: Option<&str>) -> RenderResult<String> {
    let token = require_token(url, token)?;
    let reference = split(url);

    let path = reference.path;
    let ext = [".png", ".json"]
        .into_iter()
        .find(|ext| path.ends_with(ext))
        .ok_or_else(|| {
            RenderError::remote(url, "could not normalize sprite url: missing .png or .json")
        })?;
    let stem = &path[..path.len() - ext.len()];
    let (base, ratio) = split_ratio(stem);

    build(
        url,
        API_HOST,
        &format!("/styles/v1{base}/sprite{ratio}{ext}"),
        reference.query,
        &[("access_token", token)],
    )
}

/// Split a trailing `@<n>x` pixel ratio marker off a sprite stem.
fn split_ratio(stem: &str) -> (&str, &str) {
    if let Some(at) = stem.rfind('@') {
        let marker = &stem[at + 1..];
        let digits = marker.strip_suffix('x').unwrap_or("");
        if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
            return (&stem[..at], &stem[at..]);
        }
    }
    (stem, "")
}

/// `mapbox://fonts/<user>/<fontstack>/<range>.pbf` to its glyph URL.
pub fn normalize_glyph_url(url: &str, token: Option<&str>) -> RenderResult<String> {
    let token = require_token(url, token)?;
    let reference = split(url);
    build(
        url,
        API_HOST,
        &format!("/fonts/v1{}", reference.path),
        reference.query,
        &[("access_token", token)],
    )
}
