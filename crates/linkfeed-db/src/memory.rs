//! In-memory post repository.
//!
//! Mirrors the uniqueness and ordering behaviour of the `posts` table so the
//! scheduler and HTTP layer can be exercised without a database.

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use linkfeed_core::{
    Error, FetchedLink, ListPostsRequest, Post, PostRepository, Result, SortField,
};

#[derive(Debug, Default)]
struct MemoryState {
    posts: Vec<Post>,
    next_id: i64,
}

/// Thread-safe in-memory implementation of PostRepository.
#[derive(Debug, Clone, Default)]
pub struct MemoryPostRepository {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryPostRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all stored posts in insertion order.
    pub async fn all(&self) -> Vec<Post> {
        self.state.read().await.posts.clone()
    }
}

fn compare(order: SortField, a: &Post, b: &Post) -> Ordering {
    match order {
        SortField::Id => a.id.cmp(&b.id),
        SortField::Url => a.url.cmp(&b.url),
        SortField::Title => a.title.cmp(&b.title),
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
    }
}

#[async_trait]
impl PostRepository for MemoryPostRepository {
    async fn insert_ignoring_duplicates(&self, links: &[FetchedLink]) -> Result<u64> {
        let mut state = self.state.write().await;
        let mut inserted = 0;

        for link in links {
            let exists = state
                .posts
                .iter()
                .any(|post| post.url == link.url || post.title == link.title);
            if exists {
                continue;
            }
            state.next_id += 1;
            let id = state.next_id;
            state.posts.push(Post {
                id,
                url: link.url.clone(),
                title: link.title.clone(),
                created_at: Utc::now(),
            });
            inserted += 1;
        }

        Ok(inserted)
    }

    async fn list(&self, req: ListPostsRequest) -> Result<Vec<Post>> {
        if req.limit < 0 || req.offset < 0 {
            return Err(Error::InvalidInput(
                "limit and offset must not be negative".to_string(),
            ));
        }

        let mut posts = self.state.read().await.posts.clone();
        // Stable sort: ties keep insertion order in both directions.
        if req.descending {
            posts.sort_by(|a, b| compare(req.order, b, a));
        } else {
            posts.sort_by(|a, b| compare(req.order, a, b));
        }

        Ok(posts
            .into_iter()
            .skip(req.offset as usize)
            .take(req.limit as usize)
            .collect())
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.state.read().await.posts.len() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkfeed_core::list_posts;

    fn links() -> Vec<FetchedLink> {
        vec![
            FetchedLink::new("http://server1", "Title 1"),
            FetchedLink::new("http://server2", "Title 2"),
            FetchedLink::new("http://server3", "Title 3"),
            FetchedLink::new("http://server4", "Title 4"),
            FetchedLink::new("http://server5", "A Title 5"),
        ]
    }

    async fn seeded() -> MemoryPostRepository {
        let repo = MemoryPostRepository::new();
        repo.insert_ignoring_duplicates(&links()).await.unwrap();
        repo
    }

    #[tokio::test]
    async fn test_insert_assigns_sequential_ids() {
        let repo = seeded().await;
        let ids: Vec<i64> = repo.all().await.iter().map(|p| p.id).collect();
        assert_eq!(ids, [1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_insert_is_idempotent() {
        let repo = seeded().await;
        let inserted = repo.insert_ignoring_duplicates(&links()).await.unwrap();
        assert_eq!(inserted, 0);
        assert_eq!(repo.count().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_insert_ignores_url_or_title_conflicts() {
        let repo = seeded().await;
        let inserted = repo
            .insert_ignoring_duplicates(&[
                FetchedLink::new("http://server1", "Fresh title"),
                FetchedLink::new("http://fresh", "Title 2"),
                FetchedLink::new("http://new", "New"),
                FetchedLink::new("http://new", "New"),
            ])
            .await
            .unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(repo.count().await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_list_pagination_after_ordering() {
        let repo = seeded().await;
        let page = list_posts(&repo, "id", 2, 1, false).await.unwrap();
        let ids: Vec<i64> = page.iter().map(|p| p.id).collect();
        assert_eq!(ids, [2, 3]);
    }

    #[tokio::test]
    async fn test_list_descending() {
        let repo = seeded().await;
        let page = list_posts(&repo, "id", 1, 0, true).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, 5);
    }

    #[tokio::test]
    async fn test_list_by_title() {
        let repo = seeded().await;
        let page = list_posts(&repo, "title", 2, 0, false).await.unwrap();
        assert_eq!(page[0].title, "A Title 5");
        assert_eq!(page[1].title, "Title 1");
    }

    #[tokio::test]
    async fn test_list_offset_past_end_is_empty() {
        let repo = seeded().await;
        assert!(list_posts(&repo, "url", 10, 5, false).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_rejects_unknown_sort_field() {
        let repo = seeded().await;
        let err = list_posts(&repo, "fubar", 5, 0, false).await.unwrap_err();
        assert!(matches!(err, Error::UnknownSortField(f) if f == "fubar"));
    }

    #[tokio::test]
    async fn test_list_rejects_negative_limit() {
        let repo = seeded().await;
        let err = list_posts(&repo, "id", -1, 0, false).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
