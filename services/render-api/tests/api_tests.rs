//! Tests for the render server routes.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use render_api::state::{AppState, ServerOptions};
use serde_json::{json, Value};
use test_utils::{background_style, mbtiles_vector_style, RecordingEngineFactory};
use tower::ServiceExt;

const GPX: &str = r#"<?xml version="1.0"?>
<gpx version="1.1" xmlns="http://www.topografix.com/GPX/1/1">
  <trk><name>Loop</name><trkseg>
    <trkpt lat="32.70" lon="-79.90"/>
    <trkpt lat="32.80" lon="-79.80"/>
  </trkseg></trk>
</gpx>"#;

fn router(options: ServerOptions) -> Router {
    render_api::app(Arc::new(AppState::new(options, None).unwrap()))
}

fn recording_router(factory: &RecordingEngineFactory, options: ServerOptions) -> Router {
    let state = AppState::with_factory(options, Arc::new(factory.clone()), None).unwrap();
    render_api::app(Arc::new(state))
}

fn encode(value: &str) -> String {
    let mut out = String::new();
    for b in value.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

async fn get(app: Router, uri: &str) -> Response {
    app.oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn post(app: Router, body: Value) -> Response {
    app.oneshot(
        Request::post("/render")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn png_dimensions(response: Response) -> (u32, u32) {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let image = image::load_from_memory(&bytes).unwrap();
    (image.width(), image.height())
}

// ============================================================================
// Render
// ============================================================================

#[tokio::test]
async fn test_get_render() {
    let style = encode(&background_style("#ff0000").to_string());
    let uri = format!("/render?style={style}&width=64&height=32&zoom=2&center=-79.86,32.68");

    let response = get(router(ServerOptions::default()), &uri).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    assert_eq!(png_dimensions(response).await, (64, 32));
}

#[tokio::test]
async fn test_post_render_with_ratio() {
    let response = post(
        router(ServerOptions::default()),
        json!({
            "style": background_style("#0000ff"),
            "width": 40,
            "height": 20,
            "bounds": [-80.0, 32.6, -79.7, 32.8],
            "ratio": 2
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(png_dimensions(response).await, (80, 40));
}

#[tokio::test]
async fn test_validation_error_is_bad_request() {
    let response = post(
        router(ServerOptions::default()),
        json!({
            "style": background_style("#0000ff"),
            "width": 40,
            "height": 20,
            "zoom": 30,
            "center": [0, 0]
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["code"], "InvalidParameter");
    assert_eq!(body["message"], "Zoom level is outside supported range (0-22): 30");
}

#[tokio::test]
async fn test_invalid_style_json() {
    let uri = "/render?style=%7Bnot-json&width=10&height=10&zoom=1&center=0,0";
    let response = get(router(ServerOptions::default()), uri).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["code"], "InvalidStyle");
}

#[tokio::test]
async fn test_missing_width() {
    let style = encode(&background_style("#ff0000").to_string());
    let uri = format!("/render?style={style}&height=10&zoom=1&center=0,0");

    let response = get(router(ServerOptions::default()), &uri).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_tile_path() {
    let response = post(
        router(ServerOptions::default()),
        json!({
            "style": mbtiles_vector_style("land"),
            "width": 10,
            "height": 10,
            "zoom": 1,
            "center": [0, 0]
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["code"], "MissingTilePath");
}

#[tokio::test]
async fn test_engine_failure_is_server_error() {
    let factory = RecordingEngineFactory::new().failing_render();
    let response = post(
        recording_router(&factory, ServerOptions::default()),
        json!({
            "style": background_style("#000000"),
            "width": 10,
            "height": 10,
            "zoom": 1,
            "center": [0, 0]
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["code"], "RenderEngineFailed");
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("Error processing render request"));
    assert_eq!(factory.log().released, 1);
}

// ============================================================================
// Overlays
// ============================================================================

#[tokio::test]
async fn test_overlay_fit_sets_bounds() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("loop.gpx"), GPX).unwrap();

    let factory = RecordingEngineFactory::new();
    let options = ServerOptions {
        overlay_path: Some(dir.path().to_path_buf()),
        ..Default::default()
    };
    let response = post(
        recording_router(&factory, options),
        json!({
            "style": background_style("#ffffff"),
            "width": 256,
            "height": 256,
            "overlayFiles": "*",
            "fit": true
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let camera = factory.log().renders[0];
    assert!(camera.center.lng > -79.90 && camera.center.lng < -79.80);
    assert!(camera.center.lat > 32.70 && camera.center.lat < 32.80);
}

#[tokio::test]
async fn test_overlay_fit_keeps_explicit_camera() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("loop.gpx"), GPX).unwrap();

    let factory = RecordingEngineFactory::new();
    let options = ServerOptions {
        overlay_path: Some(dir.path().to_path_buf()),
        ..Default::default()
    };
    let response = post(
        recording_router(&factory, options),
        json!({
            "style": background_style("#ffffff"),
            "width": 256,
            "height": 256,
            "zoom": 3,
            "center": [10.0, 20.0],
            "overlayFiles": "loop.gpx",
            "fit": true
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let camera = factory.log().renders[0];
    assert_eq!(camera.zoom, 3.0);
    assert_eq!((camera.center.lng, camera.center.lat), (10.0, 20.0));
}

#[tokio::test]
async fn test_unknown_overlay_dir_fails_startup() {
    let dir = tempfile::tempdir().unwrap();
    let options = ServerOptions {
        overlay_path: Some(dir.path().join("absent")),
        ..Default::default()
    };
    assert!(AppState::new(options, None).is_err());

    let options = ServerOptions {
        tile_path: Some(dir.path().join("absent")),
        ..Default::default()
    };
    assert!(AppState::new(options, None).is_err());
}

// ============================================================================
// Index, health and metrics
// ============================================================================

#[tokio::test]
async fn test_index_lists_routes() {
    let response = get(router(ServerOptions::default()), "/").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["routes"]["/render"], json!(["GET", "POST"]));
    assert_eq!(body["routes"]["/health"], json!(["GET"]));
}

#[tokio::test]
async fn test_health() {
    let response = get(router(ServerOptions::default()), "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_metrics_without_recorder() {
    let response = get(router(ServerOptions::default()), "/metrics").await;
    assert_eq!(response.status(), StatusCode::OK);
}
