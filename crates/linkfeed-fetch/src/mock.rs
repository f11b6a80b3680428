//! Mock link fetcher for deterministic testing.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use linkfeed_fetch::{FetchedLink, LinkFetcher, MockLinkFetcher};
//!
//! let fetcher = MockLinkFetcher::new(vec![FetchedLink::new("http://a", "A")])
//!     .with_latency_ms(50);
//! fetcher.fail_next(1);
//!
//! assert!(fetcher.fetch().await.is_err());
//! assert_eq!(fetcher.fetch().await.unwrap().len(), 1);
//! assert_eq!(fetcher.call_count(), 2);
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use linkfeed_core::{Error, FetchedLink, LinkFetcher, Result};

/// Scripted result for one upcoming call.
#[derive(Debug, Clone)]
enum Scripted {
    Fail(String),
    Panic,
}

#[derive(Debug, Default)]
struct MockState {
    links: Vec<FetchedLink>,
    script: VecDeque<Scripted>,
}

/// Mock fetcher returning a fixed link list.
#[derive(Debug, Clone, Default)]
pub struct MockLinkFetcher {
    state: Arc<Mutex<MockState>>,
    calls: Arc<AtomicUsize>,
    latency: Duration,
}

impl MockLinkFetcher {
    pub fn new(links: Vec<FetchedLink>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                links,
                script: VecDeque::new(),
            })),
            ..Self::default()
        }
    }

    /// Simulated latency for every call.
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency = Duration::from_millis(latency_ms);
        self
    }

    /// Replace the links returned by subsequent calls.
    pub fn set_links(&self, links: Vec<FetchedLink>) {
        self.lock().links = links;
    }

    /// Make the next `n` calls fail with `Error::Request`.
    pub fn fail_next(&self, n: usize) {
        let mut state = self.lock();
        for _ in 0..n {
            state
                .script
                .push_back(Scripted::Fail("simulated upstream failure".to_string()));
        }
    }

    /// Make the next call panic.
    pub fn panic_next(&self) {
        self.lock().script.push_back(Scripted::Panic);
    }

    /// Number of times `fetch` has been called.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl LinkFetcher for MockLinkFetcher {
    async fn fetch(&self) -> Result<Vec<FetchedLink>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let (next, links) = {
            let mut state = self.lock();
            (state.script.pop_front(), state.links.clone())
        };
        match next {
            Some(Scripted::Fail(msg)) => Err(Error::Request(msg)),
            Some(Scripted::Panic) => panic!("simulated fetcher panic"),
            None => Ok(links),
        }
    }
}
