//! # linkfeed-fetch
//!
//! Upstream link fetching for linkfeed.
//!
//! This crate provides:
//! - [`PageLinkFetcher`]: downloads the upstream page with `reqwest` and
//!   extracts `(url, title)` pairs with a CSS selector
//! - [`FetcherConfig`]: environment-driven configuration
//! - `MockLinkFetcher` (feature `mock`): deterministic fetcher for tests
//!
//! # Example
//!
//! ```rust,no_run
//! use linkfeed_fetch::{FetcherConfig, LinkFetcher, PageLinkFetcher};
//!
//! #[tokio::main]
//! async fn main() {
//!     let fetcher = PageLinkFetcher::new(FetcherConfig::from_env()).unwrap();
//!     let links = fetcher.fetch().await.unwrap();
//!     println!("{} links", links.len());
//! }
//! ```

pub mod config;
pub mod page;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export core types
pub use linkfeed_core::*;

pub use config::FetcherConfig;
pub use page::{extract_links, PageLinkFetcher};

#[cfg(any(test, feature = "mock"))]
pub use mock::MockLinkFetcher;
