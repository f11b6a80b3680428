//! Fetcher configuration.

use std::time::Duration;

use linkfeed_core::defaults;
use tracing::debug;

/// Configuration for [`PageLinkFetcher`](crate::PageLinkFetcher).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetcherConfig {
    /// Page the links are scraped from.
    pub upstream_url: String,
    /// Maximum links kept per fetch.
    pub max_links: usize,
    /// HTTP request timeout.
    pub timeout: Duration,
    /// CSS selector matching the link anchors.
    pub link_selector: String,
    /// User agent header value.
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            upstream_url: defaults::UPSTREAM_URL.to_string(),
            max_links: defaults::FETCH_POST_LIMIT,
            timeout: Duration::from_secs(defaults::FETCH_TIMEOUT_SECS),
            link_selector: defaults::FETCH_LINK_SELECTOR.to_string(),
            user_agent: defaults::FETCH_USER_AGENT.to_string(),
        }
    }
}

impl FetcherConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `UPSTREAM_URL` | `https://news.ycombinator.com/` |
    /// | `FETCH_POST_LIMIT` | `30` |
    /// | `FETCH_TIMEOUT_SECS` | `20` |
    /// | `FETCH_LINK_SELECTOR` | `a.storylink, span.titleline > a` |
    pub fn from_env() -> Self {
        let base = Self::default();
        let config = Self {
            upstream_url: std::env::var("UPSTREAM_URL").unwrap_or(base.upstream_url),
            max_links: std::env::var("FETCH_POST_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(base.max_links),
            timeout: std::env::var("FETCH_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(base.timeout),
            link_selector: std::env::var("FETCH_LINK_SELECTOR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(base.link_selector),
            user_agent: base.user_agent,
        };
        debug!(
            subsystem = "fetch",
            upstream_url = %config.upstream_url,
            max_links = config.max_links,
            timeout_secs = config.timeout.as_secs(),
            "Fetcher configuration loaded"
        );
        config
    }

    pub fn with_upstream_url(mut self, url: impl Into<String>) -> Self {
        self.upstream_url = url.into();
        self
    }

    pub fn with_max_links(mut self, max_links: usize) -> Self {
        self.max_links = max_links;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_link_selector(mut self, selector: impl Into<String>) -> Self {
        self.link_selector = selector.into();
        self
    }
}
