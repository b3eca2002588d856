//! HTTP request handlers.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Extension, Query};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use map_common::{RenderError, ResourceResponse};
use map_render::mapbox::{is_mapbox_style_url, normalize_style_url};
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::error::ApiError;
use crate::metrics;
use crate::overlay;
use crate::params::{RenderParams, StyleParam};
use crate::state::AppState;

// ============================================================================
// Render
// ============================================================================

/// GET /render - parameters in the query string
#[instrument(skip_all)]
pub async fn render_get_handler(
    Extension(state): Extension<Arc<AppState>>,
    params: Result<Query<RenderParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(params) =
        params.map_err(|e| ApiError::bad_request("InvalidParameter", e.body_text()))?;
    render(&state, params).await
}

/// POST /render - parameters in a JSON body
#[instrument(skip_all)]
pub async fn render_post_handler(
    Extension(state): Extension<Arc<AppState>>,
    params: Result<Json<RenderParams>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(params) =
        params.map_err(|e| ApiError::bad_request("InvalidParameter", e.body_text()))?;
    render(&state, params).await
}

async fn render(state: &AppState, params: RenderParams) -> Result<Response, ApiError> {
    metrics::record_render_request();
    let start = Instant::now();

    let result = render_png(state, params).await;
    match &result {
        Ok(png) => metrics::record_render_success(start.elapsed(), png.len()),
        Err(e) => metrics::record_render_error(e.code()),
    }

    let png = result?;
    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}

async fn render_png(state: &AppState, params: RenderParams) -> Result<Vec<u8>, ApiError> {
    let mut options = params.options()?;
    options.tile_path = state.tile_path.clone();
    if options.token.is_none() {
        options.token = state.token.clone();
    }

    let mut style = load_style(state, &params.style, options.token.as_deref()).await?;

    if let Some(names) = &params.overlay_files {
        let features = state.overlays.select(names);
        debug!(names = %names, features = features.len(), "Adding overlay features");
        let extent = overlay::bbox(&features);
        overlay::inject(&mut style, features);
        if params.fit {
            if let Some(extent) = extent {
                options.bounds = Some(extent.to_vec());
            }
        }
    }

    let _permit = state
        .render_permits
        .acquire()
        .await
        .map_err(|_| ApiError::Internal("render queue closed".to_string()))?;
    let _in_flight = state.begin_render();

    Ok(state
        .orchestrator
        .render(style, params.width, params.height, &options)
        .await?)
}

/// Style document from an inline object, JSON text or a hosted style URL.
async fn load_style(
    state: &AppState,
    style: &StyleParam,
    token: Option<&str>,
) -> Result<Value, ApiError> {
    let text = match style {
        StyleParam::Document(doc) => return Ok(doc.clone()),
        StyleParam::Text(text) => text.trim(),
    };

    if is_mapbox_style_url(text) {
        let url = normalize_style_url(text, token)?;
        let body = match state.orchestrator.fetcher().fetch(&url).await? {
            ResourceResponse::Data(body) => body,
            ResourceResponse::Empty => {
                return Err(RenderError::remote(text, "style not found").into());
            }
        };
        return serde_json::from_slice(&body)
            .map_err(|e| RenderError::remote(text, format!("invalid style document: {e}")).into());
    }

    serde_json::from_str(text)
        .map_err(|e| ApiError::bad_request("InvalidStyle", format!("Error parsing JSON style: {e}")))
}

// ============================================================================
// Index, health and metrics
// ============================================================================

/// GET / - routes and the methods they accept
pub async fn index_handler() -> impl IntoResponse {
    Json(json!({
        "routes": {
            "/": ["GET"],
            "/health": ["GET"],
            "/metrics": ["GET"],
            "/render": ["GET", "POST"],
        }
    }))
}

/// GET /health - Basic health check
pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /metrics - Prometheus metrics endpoint
pub async fn metrics_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    let body = state
        .prometheus
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default();
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response()
}
