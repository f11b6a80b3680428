//! Upstream page fetcher.
//!
//! Downloads one HTML page and extracts story links from it.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::{Client, Url};
use scraper::{Html, Selector};
use tracing::{debug, trace, warn};

use linkfeed_core::{Error, FetchedLink, LinkFetcher, Result};

use crate::config::FetcherConfig;

/// [`LinkFetcher`] backed by an HTTP GET of the upstream page.
#[derive(Debug, Clone)]
pub struct PageLinkFetcher {
    client: Client,
    url: Url,
    selector: Selector,
    max_links: usize,
}

impl PageLinkFetcher {
    /// Build a fetcher, validating the URL and CSS selector up front.
    pub fn new(config: FetcherConfig) -> Result<Self> {
        let url = Url::parse(&config.upstream_url).map_err(|e| {
            Error::Config(format!("Invalid upstream URL {}: {}", config.upstream_url, e))
        })?;
        let selector = Selector::parse(&config.link_selector).map_err(|e| {
            Error::Config(format!(
                "Invalid link selector {:?}: {}",
                config.link_selector, e
            ))
        })?;
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url,
            selector,
            max_links: config.max_links,
        })
    }

    /// Load configuration from the environment and build a fetcher.
    pub fn from_env() -> Result<Self> {
        Self::new(FetcherConfig::from_env())
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl LinkFetcher for PageLinkFetcher {
    async fn fetch(&self) -> Result<Vec<FetchedLink>> {
        let start = Instant::now();
        debug!(subsystem = "fetch", op = "fetch", url = %self.url, "Starting upstream request");

        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| Error::Request(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            warn!(subsystem = "fetch", op = "fetch", status = %status, "Upstream returned error status");
            return Err(Error::Request(format!("Upstream returned {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::Request(format!("Failed to read response body: {}", e)))?;

        let links = extract_links(&body, &self.url, &self.selector, self.max_links);
        debug!(
            subsystem = "fetch",
            op = "fetch",
            status = %status,
            body_len = body.len(),
            links = links.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Upstream page parsed"
        );
        Ok(links)
    }
}

/// Extract up to `max` links matched by `selector` from an HTML document.
///
/// Absolute `href`s are kept exactly as written; relative ones are resolved
/// against `base`. Anchors with no `href`, an unresolvable `href`, or an
/// empty title are skipped.
pub fn extract_links(html: &str, base: &Url, selector: &Selector, max: usize) -> Vec<FetchedLink> {
    let document = Html::parse_document(html);

    document
        .select(selector)
        .filter_map(|anchor| {
            let href = anchor.value().attr("href")?;
            let url = stored_url(base, href.trim())?;
            let title = anchor.text().collect::<Vec<_>>().join("");
            let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
            if title.is_empty() {
                return None;
            }
            trace!(subsystem = "fetch", url = %url, title = %title, "Extracted link");
            Some(FetchedLink::new(url, title))
        })
        .take(max)
        .collect()
}

/// Uniqueness is on the stored string, so an absolute href is not
/// re-serialized (`http://host` would otherwise gain a trailing slash).
fn stored_url(base: &Url, href: &str) -> Option<String> {
    if Url::parse(href).is_ok() {
        return Some(href.to_string());
    }
    base.join(href).ok().map(String::from)
}
