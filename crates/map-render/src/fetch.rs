//! HTTP fetching of remote resources.
//!
//! Status policy:
//! - 200: the body
//! - 202: wait for `Retry-After`, then retry exactly once
//! - 204 and 404: no content (partial-coverage tilesets answer 404 for
//!   tiles they do not have)
//! - anything else: an error naming the URL and status

use std::time::Duration;

use chrono::{DateTime, Utc};
use map_common::{RenderError, RenderResult, ResourceResponse};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, instrument, warn};

use crate::config::FetchConfig;

/// Fetches remote resources with the status policy above.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct RemoteFetcher {
    client: Client,
    config: FetchConfig,
}

impl RemoteFetcher {
    pub fn new(config: FetchConfig) -> RenderResult<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout())
            .gzip(true)
            .pool_max_idle_per_host(8)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| RenderError::remote("", format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    #[instrument(skip(self))]
    pub async fn fetch(&self, url: &str) -> RenderResult<ResourceResponse> {
        let response = self.send(url).await?;
        if response.status() != StatusCode::ACCEPTED {
            return self.finish(url, response).await;
        }

        let delay = retry_after(response.headers(), Utc::now()).ok_or_else(|| {
            RenderError::remote(url, "status: 202 without a usable Retry-After header")
        })?;
        let delay = delay.min(self.config.max_retry_after());
        debug!(delay_ms = delay.as_millis() as u64, "Resource not ready, retrying");
        tokio::time::sleep(delay).await;

        let retry = self.send(url).await?;
        if retry.status() == StatusCode::ACCEPTED {
            return Err(RenderError::remote(url, "status: 202 after retry"));
        }
        self.finish(url, retry).await
    }

    async fn send(&self, url: &str) -> RenderResult<Response> {
        self.client
            .get(url)
            .send()
            .await
            .map_err(|e| RenderError::remote(url, e))
    }

    async fn finish(&self, url: &str, response: Response) -> RenderResult<ResourceResponse> {
        match response.status() {
            StatusCode::OK => {
                let body = response
                    .bytes()
                    .await
                    .map_err(|e| RenderError::remote(url, e))?;
                Ok(ResourceResponse::Data(body))
            }
            StatusCode::NO_CONTENT => Ok(ResourceResponse::Empty),
            StatusCode::NOT_FOUND => {
                warn!(url, "Missing tile");
                Ok(ResourceResponse::Empty)
            }
            status => Err(RenderError::remote(url, format!("status: {}", status.as_u16()))),
        }
    }
}

/// Delay requested by a `Retry-After` header: delta seconds or an HTTP date.
fn retry_after(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let when = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((when - now).to_std().unwrap_or(Duration::ZERO))
}
