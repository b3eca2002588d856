//! Dispatching engine resource requests to the right backing store.
//!
//! | kind                      | `mbtiles://`       | `mapbox://`          | other |
//! |---------------------------|--------------------|----------------------|-------|
//! | source                    | archive TileJSON   | hosted TileJSON      | fetch |
//! | tile                      | archive tile       | hosted tile          | fetch |
//! | glyph                     | fetch              | hosted glyphs        | fetch |
//! | sprite image / sprite json| fetch              | hosted sprite        | fetch |
//! | image source              | fetch              | fetch                | fetch |
//!
//! Any `mapbox://` request without a token fails before dispatch.

use std::path::PathBuf;

use async_trait::async_trait;
use map_common::{RenderError, RenderResult, ResourceKind, ResourceRequest, ResourceResponse};
use renderer::ResourceSource;
use storage::local::is_mbtiles_url;
use storage::LocalTileStore;
use tracing::{debug, error};

use crate::fetch::RemoteFetcher;
use crate::mapbox;

/// Resolves resources for one render call.
///
/// Holds the request-scoped context (archive directory, access token, pixel
/// ratio); archives opened while resolving are released with the resolver.
pub struct ResourceResolver {
    fetcher: RemoteFetcher,
    local: Option<LocalTileStore>,
    token: Option<String>,
    ratio: u32,
}

impl ResourceResolver {
    pub fn new(
        fetcher: RemoteFetcher,
        tile_path: Option<PathBuf>,
        token: Option<String>,
        ratio: u32,
    ) -> Self {
        Self {
            fetcher,
            local: tile_path.map(LocalTileStore::new),
            token,
            ratio,
        }
    }

    pub fn ratio(&self) -> u32 {
        self.ratio
    }

    /// Resolve one request. Failures are logged before being returned.
    pub async fn resolve(&self, request: ResourceRequest) -> RenderResult<ResourceResponse> {
        let url = request.url.clone();
        let kind = request.kind;

        let result = self.dispatch(request).await;
        match &result {
            Ok(response) => debug!(url = %url, kind = %kind, empty = response.is_empty(), "Resolved resource"),
            Err(e) => error!(url = %url, kind = %kind, error = %e, "Error while making resource request"),
        }
        result
    }

    /// Resolve a request carrying the engine's raw integer kind code.
    pub async fn resolve_code(&self, url: &str, code: u8) -> RenderResult<ResourceResponse> {
        let request = ResourceRequest::from_code(url, code).map_err(|e| {
            error!(url, code, "Request kind not handled");
            e
        })?;
        self.resolve(request).await
    }

    async fn dispatch(&self, request: ResourceRequest) -> RenderResult<ResourceResponse> {
        let url = request.url.as_str();
        let token = self.token.as_deref();
        let hosted = mapbox::is_mapbox_url(url);
        if hosted && token.is_none() {
            return Err(RenderError::MissingToken { url: url.to_string() });
        }

        match request.kind {
            ResourceKind::Source if is_mbtiles_url(url) => self.local()?.get_tile_json(url).await,
            ResourceKind::Source if hosted => {
                self.fetcher.fetch(&mapbox::normalize_source_url(url, token)?).await
            }
            ResourceKind::Tile if is_mbtiles_url(url) => self.local()?.get_tile(url).await,
            ResourceKind::Tile if hosted => {
                self.fetcher.fetch(&mapbox::normalize_tile_url(url, token)?).await
            }
            ResourceKind::Glyph if hosted => {
                self.fetcher.fetch(&mapbox::normalize_glyph_url(url, token)?).await
            }
            ResourceKind::SpriteImage | ResourceKind::SpriteJson if hosted => {
                self.fetcher.fetch(&mapbox::normalize_sprite_url(url, token)?).await
            }
            _ => self.fetcher.fetch(url).await,
        }
    }

    fn local(&self) -> RenderResult<&LocalTileStore> {
        self.local.as_ref().ok_or(RenderError::MissingTilePath)
    }

    /// Close archives opened during this render.
    pub async fn close(&self) {
        if let Some(local) = &self.local {
            local.close().await;
        }
    }
}

#[async_trait]
impl ResourceSource for ResourceResolver {
    async fn request(&self, request: ResourceRequest) -> RenderResult<ResourceResponse> {
        self.resolve(request).await
    }
}
