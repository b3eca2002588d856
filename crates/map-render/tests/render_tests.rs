//! End-to-end tests for render calls.

use std::collections::HashMap;
use std::sync::Arc;

use map_common::{RenderError, ResourceKind, ResourceRequest, ValidationError};
use map_render::{FetchConfig, ImageSpec, RenderOptions, RenderOrchestrator};
use renderer::MosaicEngineFactory;
use test_utils::{
    background_style, bbox, center, mapbox_style, mbtiles_raster_style, mbtiles_vector_style,
    png_data_uri, raster_style, solid_png, MbTilesBuilder, MockResponse, MockServer,
    RecordingEngineFactory,
};

fn mosaic() -> RenderOrchestrator {
    RenderOrchestrator::new(Arc::new(MosaicEngineFactory), FetchConfig::default()).unwrap()
}

fn recording(factory: &RecordingEngineFactory) -> RenderOrchestrator {
    RenderOrchestrator::new(Arc::new(factory.clone()), FetchConfig::default()).unwrap()
}

fn at(zoom: f64, center: [f64; 2]) -> RenderOptions {
    RenderOptions {
        zoom: Some(zoom),
        center: Some(center.to_vec()),
        ..Default::default()
    }
}

fn decode(png: &[u8]) -> image::RgbaImage {
    image::load_from_memory(png).unwrap().to_rgba8()
}

// ============================================================================
// Basic renders
// ============================================================================

#[tokio::test]
async fn test_render_center_and_zoom() {
    let png = mosaic()
        .render(background_style("#00ff00"), 512, 256, &at(10.0, center::CHARLESTON))
        .await
        .unwrap();

    let image = decode(&png);
    assert_eq!(image.dimensions(), (512, 256));
    assert_eq!(image.get_pixel(100, 100).0, [0, 255, 0, 255]);
}

#[tokio::test]
async fn test_render_bounds_derives_viewport() {
    let factory = RecordingEngineFactory::new();
    let options = RenderOptions {
        bounds: Some(bbox::PACIFIC.to_vec()),
        ..Default::default()
    };

    let png = recording(&factory)
        .render(background_style("#ffffff"), 512, 512, &options)
        .await
        .unwrap();

    assert_eq!(decode(&png).dimensions(), (512, 512));
    let log = factory.log();
    assert_eq!(log.renders.len(), 1);
    let camera = log.renders[0];
    assert!(camera.zoom > 1.0 && camera.zoom < 2.0);
    assert!(camera.center.lng > -163.37 && camera.center.lng < -15.71);
    assert!(camera.center.lat > 4.85 && camera.center.lat < 64.26);
}

#[tokio::test]
async fn test_render_with_ratio_scales_output() {
    let mut options = at(2.0, center::NULL_ISLAND);
    options.ratio = Some(2.0);

    let png = mosaic()
        .render(background_style("#336699"), 100, 50, &options)
        .await
        .unwrap();
    assert_eq!(decode(&png).dimensions(), (200, 100));
}

#[tokio::test]
async fn test_bearing_and_pitch_reach_engine() {
    let factory = RecordingEngineFactory::new();
    let mut options = at(3.0, center::CHARLESTON);
    options.bearing = Some(90.0);
    options.pitch = Some(30.0);

    recording(&factory)
        .render(background_style("#000000"), 64, 64, &options)
        .await
        .unwrap();

    let camera = factory.log().renders[0];
    assert_eq!(camera.bearing, 90.0);
    assert_eq!(camera.pitch, 30.0);
    assert_eq!((camera.width, camera.height), (64, 64));
}

// ============================================================================
// Validation
// ============================================================================

#[tokio::test]
async fn test_validation_failure_creates_no_engine() {
    let factory = RecordingEngineFactory::new();
    let err = recording(&factory)
        .render(background_style("#000000"), 0, 256, &at(1.0, center::NULL_ISLAND))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RenderError::Validation(ValidationError::InvalidDimensions)
    ));
    assert_eq!(factory.log().created, 0);
}

#[tokio::test]
async fn test_padding_boundary() {
    let mut options = RenderOptions {
        bounds: Some(bbox::CONUS.to_vec()),
        padding: Some(255.0),
        ..Default::default()
    };
    assert!(mosaic()
        .render(background_style("#ffffff"), 512, 512, &options)
        .await
        .is_ok());

    options.padding = Some(256.0);
    let err = mosaic()
        .render(background_style("#ffffff"), 512, 512, &options)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RenderError::Validation(ValidationError::PaddingExceedsWidth)
    ));
}

// ============================================================================
// Local archives
// ============================================================================

#[tokio::test]
async fn test_missing_archive_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut options = at(1.0, center::NULL_ISLAND);
    options.tile_path = Some(dir.path().to_path_buf());

    let err = mosaic()
        .render(mbtiles_vector_style("missingset"), 256, 256, &options)
        .await
        .unwrap_err();

    assert!(matches!(err, RenderError::MissingArchiveFile { .. }));
    assert!(err.to_string().contains("missingset"));
}

#[tokio::test]
async fn test_missing_tile_path() {
    let err = mosaic()
        .render(mbtiles_vector_style("missingset"), 256, 256, &at(1.0, center::NULL_ISLAND))
        .await
        .unwrap_err();

    assert!(matches!(err, RenderError::MissingTilePath));
    assert!(err.to_string().contains("no tilePath is set"));
}

#[tokio::test]
async fn test_local_raster_archive_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    MbTilesBuilder::new(dir.path(), "imagery-set")
        .raster(0, 2)
        .tile(1, 0, 0, solid_png(256, 256, [0, 0, 255, 255]))
        .build()
        .await;

    let mut options = at(0.0, center::NULL_ISLAND);
    options.tile_path = Some(dir.path().to_path_buf());

    let png = mosaic()
        .render(mbtiles_raster_style("imagery-set"), 512, 512, &options)
        .await
        .unwrap();

    let image = decode(&png);
    // North-west quadrant comes from the archive, the rest has no tiles
    assert_eq!(image.get_pixel(10, 10).0, [0, 0, 255, 255]);
    assert_eq!(image.get_pixel(400, 400).0[3], 0);
}

#[tokio::test]
async fn test_local_vector_archive_tiles_are_decompressed() {
    let dir = tempfile::tempdir().unwrap();
    MbTilesBuilder::new(dir.path(), "land")
        .vector(0, 4)
        .gzipped_tile(0, 0, 0, b"vector tile bytes")
        .build()
        .await;

    let factory = RecordingEngineFactory::new().with_requests(vec![
        ResourceRequest::new("mbtiles://land", ResourceKind::Source),
        ResourceRequest::new("mbtiles://land/0/0/0.pbf", ResourceKind::Tile),
        ResourceRequest::new("mbtiles://land/4/0/0.pbf", ResourceKind::Tile),
    ]);
    let mut options = at(0.0, center::NULL_ISLAND);
    options.tile_path = Some(dir.path().to_path_buf());

    recording(&factory)
        .render(mbtiles_vector_style("land"), 256, 256, &options)
        .await
        .unwrap();

    let responses = factory.log().responses;
    assert!(responses[0].is_some());
    assert_eq!(responses[1], Some(b"vector tile bytes".len()));
    assert_eq!(responses[2], None);
}

// ============================================================================
// Remote resources
// ============================================================================

#[tokio::test]
async fn test_missing_remote_tile_leaves_blank_region() {
    let server = MockServer::start().await;
    server.respond("/tiles/1/0/0.png", MockResponse::ok(solid_png(256, 256, [255, 0, 0, 255])));

    let template = server.url("/tiles/{z}/{x}/{y}.png");
    let png = mosaic()
        .render(raster_style(&template), 512, 512, &at(0.0, center::NULL_ISLAND))
        .await
        .unwrap();

    let image = decode(&png);
    assert_eq!(image.get_pixel(10, 10).0, [255, 0, 0, 255]);
    assert_eq!(image.get_pixel(400, 400).0, [221, 221, 221, 255]);
    assert_eq!(server.hits("/tiles/1/1/1.png"), 1);
}

#[tokio::test]
async fn test_remote_tile_server_error_fails_render() {
    let server = MockServer::start().await;
    server.respond("/tiles/1/0/0.png", MockResponse::status(500));

    let template = server.url("/tiles/{z}/{x}/{y}.png");
    let err = mosaic()
        .render(raster_style(&template), 512, 512, &at(0.0, center::NULL_ISLAND))
        .await
        .unwrap_err();

    assert!(matches!(err, RenderError::RemoteFetch { .. }));
    let message = err.to_string();
    assert!(message.contains("/tiles/1/0/0.png"));
    assert!(message.contains("status: 500"));
}

#[tokio::test]
async fn test_no_content_and_accepted_responses() {
    let server = MockServer::start().await;
    server.respond("/empty.pbf", MockResponse::status(204));
    server.script(
        "/pending.json",
        vec![
            MockResponse::status(202).with_header("Retry-After", "0"),
            MockResponse::ok(b"{}".to_vec()),
        ],
    );

    let factory = RecordingEngineFactory::new().with_requests(vec![
        ResourceRequest::new(server.url("/empty.pbf"), ResourceKind::Tile),
        ResourceRequest::new(server.url("/pending.json"), ResourceKind::SpriteJson),
    ]);
    recording(&factory)
        .render(background_style("#ffffff"), 32, 32, &at(1.0, center::NULL_ISLAND))
        .await
        .unwrap();

    assert_eq!(factory.log().responses, vec![None, Some(2)]);
    assert_eq!(server.hits("/pending.json"), 2);
}

#[tokio::test]
async fn test_accepted_twice_is_an_error() {
    let server = MockServer::start().await;
    server.respond(
        "/pending.png",
        MockResponse::status(202).with_header("Retry-After", "0"),
    );

    let factory = RecordingEngineFactory::new().with_requests(vec![ResourceRequest::new(
        server.url("/pending.png"),
        ResourceKind::Tile,
    )]);
    let err = recording(&factory)
        .render(background_style("#ffffff"), 32, 32, &at(1.0, center::NULL_ISLAND))
        .await
        .unwrap_err();

    assert!(matches!(err, RenderError::RemoteFetch { .. }));
    assert_eq!(server.hits("/pending.png"), 2);
    assert_eq!(factory.log().released, 1);
}

#[tokio::test]
async fn test_hosted_reference_without_token() {
    let factory = RecordingEngineFactory::new().with_requests(vec![ResourceRequest::new(
        "mapbox://mapbox.mapbox-streets-v7",
        ResourceKind::Source,
    )]);

    let err = recording(&factory)
        .render(mapbox_style(), 256, 256, &at(1.0, center::NULL_ISLAND))
        .await
        .unwrap_err();

    assert!(matches!(err, RenderError::MissingToken { .. }));
    assert_eq!(factory.log().released, 1);
}

// ============================================================================
// Icons
// ============================================================================

#[tokio::test]
async fn test_invalid_icon_url() {
    let mut options = at(1.0, center::NULL_ISLAND);
    options
        .images
        .insert("marker".to_string(), ImageSpec::new("not-a-url"));

    let err = mosaic()
        .render(background_style("#ffffff"), 64, 64, &options)
        .await
        .unwrap_err();

    assert!(matches!(err, RenderError::InvalidImageUrl { ref id } if id == "marker"));
    assert_eq!(err.to_string(), "Invalid url for image: marker");
}

#[tokio::test]
async fn test_icons_from_data_uri_and_remote() {
    let server = MockServer::start().await;
    server.respond("/pin.png", MockResponse::ok(solid_png(8, 4, [0, 0, 0, 255])));

    let mut images = HashMap::new();
    images.insert(
        "dot".to_string(),
        ImageSpec {
            url: Some(png_data_uri([255, 0, 0, 255])),
            pixel_ratio: 2.0,
            sdf: true,
        },
    );
    images.insert("pin".to_string(), ImageSpec::new(server.url("/pin.png")));

    let factory = RecordingEngineFactory::new();
    let mut options = at(1.0, center::NULL_ISLAND);
    options.images = images;

    recording(&factory)
        .render(background_style("#ffffff"), 64, 64, &options)
        .await
        .unwrap();

    let mut registered = factory.log().images;
    registered.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(
        registered,
        vec![
            ("dot".to_string(), 1, 1, 2.0, true),
            ("pin".to_string(), 8, 4, 1.0, false),
        ]
    );
}

#[tokio::test]
async fn test_missing_remote_icon_fails() {
    let server = MockServer::start().await;

    let mut options = at(1.0, center::NULL_ISLAND);
    options
        .images
        .insert("pin".to_string(), ImageSpec::new(server.url("/absent.png")));

    let factory = RecordingEngineFactory::new();
    let err = recording(&factory)
        .render(background_style("#ffffff"), 64, 64, &options)
        .await
        .unwrap_err();

    assert!(matches!(err, RenderError::IconLoad { .. }));
    assert!(err.to_string().starts_with("Error loading icon image: pin\n"));
    assert!(factory.log().images.is_empty());
    assert_eq!(factory.log().released, 1);
}

// ============================================================================
// Engine lifecycle
// ============================================================================

#[tokio::test]
async fn test_engine_released_once_on_success() {
    let factory = RecordingEngineFactory::new();
    recording(&factory)
        .render(background_style("#ffffff"), 16, 16, &at(0.0, center::NULL_ISLAND))
        .await
        .unwrap();

    let log = factory.log();
    assert_eq!(log.created, 1);
    assert_eq!(log.loads, 1);
    assert_eq!(log.released, 1);
}

#[tokio::test]
async fn test_engine_released_once_on_render_failure() {
    let factory = RecordingEngineFactory::new().failing_render();
    let err = recording(&factory)
        .render(background_style("#ffffff"), 16, 16, &at(0.0, center::NULL_ISLAND))
        .await
        .unwrap_err();

    assert!(matches!(err, RenderError::RenderEngine(_)));
    assert_eq!(factory.log().released, 1);
}
