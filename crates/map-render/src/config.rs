//! Configuration for remote resource fetching.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for the HTTP client used to fetch remote resources.
///
/// There is deliberately no total request timeout: a remote host that accepts
/// the connection but never answers stalls the render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// `User-Agent` header sent with every request.
    pub user_agent: String,

    /// Time allowed for establishing a TCP/TLS connection, in seconds.
    pub connect_timeout_secs: u64,

    /// Longest `Retry-After` delay honoured on a 202, in seconds. Longer
    /// delays are clamped.
    pub max_retry_after_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("static-maps/{}", env!("CARGO_PKG_VERSION")),
            connect_timeout_secs: 30,
            max_retry_after_secs: 60,
        }
    }
}

impl FetchConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("RENDER_USER_AGENT") {
            if !val.trim().is_empty() {
                config.user_agent = val;
            }
        }

        if let Ok(val) = std::env::var("RENDER_CONNECT_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                config.connect_timeout_secs = secs;
            }
        }

        if let Ok(val) = std::env::var("RENDER_MAX_RETRY_AFTER_SECS") {
            if let Ok(secs) = val.parse() {
                config.max_retry_after_secs = secs;
            }
        }

        config
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn max_retry_after(&self) -> Duration {
        Duration::from_secs(self.max_retry_after_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FetchConfig::default();
        assert!(config.user_agent.starts_with("static-maps/"));
        assert_eq!(config.connect_timeout(), Duration::from_secs(30));
        assert_eq!(config.max_retry_after(), Duration::from_secs(60));
    }
}
