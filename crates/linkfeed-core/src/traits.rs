//! Collaborator traits the update scheduler and read path depend on.
//!
//! Concrete implementations live in `linkfeed-db` (Postgres and in-memory
//! stores) and `linkfeed-fetch` (upstream page scraping and a mock).

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{FetchedLink, ListPostsRequest, Post, SortField};

/// Source of `(url, title)` pairs. Implementations may fail; callers must
/// treat failure as transient.
#[async_trait]
pub trait LinkFetcher: Send + Sync {
    /// Fetch the current link list from upstream.
    async fn fetch(&self) -> Result<Vec<FetchedLink>>;
}

/// Post store.
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Insert links, silently discarding any whose `url` or `title` already
    /// exists (including duplicates within `links`). Returns the number of
    /// rows actually inserted.
    async fn insert_ignoring_duplicates(&self, links: &[FetchedLink]) -> Result<u64>;

    /// Ordered, paginated read.
    async fn list(&self, req: ListPostsRequest) -> Result<Vec<Post>>;

    /// Total number of stored posts.
    async fn count(&self) -> Result<i64>;
}

/// Read posts ordered by a caller-supplied field name.
///
/// The field is checked against [`SortField`] even when the caller has
/// already validated it, failing with `Error::UnknownSortField`.
pub async fn list_posts(
    repo: &dyn PostRepository,
    order: &str,
    limit: i64,
    offset: i64,
    descending: bool,
) -> Result<Vec<Post>> {
    let order: SortField = order.parse()?;
    repo.list(ListPostsRequest {
        order,
        limit,
        offset,
        descending,
    })
    .await
}
