//! Post repository implementation.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;

use linkfeed_core::{Error, FetchedLink, ListPostsRequest, Post, PostRepository, Result};

/// PostgreSQL implementation of PostRepository.
#[derive(Clone)]
pub struct PgPostRepository {
    pool: Pool<Postgres>,
}

impl PgPostRepository {
    /// Create a new PgPostRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn order_clause(req: &ListPostsRequest) -> String {
    let direction = if req.descending { "DESC" } else { "ASC" };
    format!("{} {}", req.order.column(), direction)
}

fn map_row_to_post(row: PgRow) -> Post {
    Post {
        id: row.get("id"),
        url: row.get("url"),
        title: row.get("title"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl PostRepository for PgPostRepository {
    async fn insert_ignoring_duplicates(&self, links: &[FetchedLink]) -> Result<u64> {
        if links.is_empty() {
            return Ok(0);
        }

        let (urls, titles): (Vec<String>, Vec<String>) = links
            .iter()
            .map(|link| (link.url.clone(), link.title.clone()))
            .unzip();

        let result = sqlx::query(
            "INSERT INTO posts (url, title)
             SELECT * FROM UNNEST($1::text[], $2::text[])
             ON CONFLICT DO NOTHING",
        )
        .bind(urls)
        .bind(titles)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "posts",
            op = "insert",
            submitted = links.len(),
            inserted = result.rows_affected(),
            "Inserted posts"
        );
        Ok(result.rows_affected())
    }

    async fn list(&self, req: ListPostsRequest) -> Result<Vec<Post>> {
        let sql = format!(
            "SELECT id, url, title, created_at FROM posts ORDER BY {} LIMIT $1 OFFSET $2",
            order_clause(&req)
        );

        let rows = sqlx::query(&sql)
            .bind(req.limit)
            .bind(req.offset)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(rows.into_iter().map(map_row_to_post).collect())
    }

    async fn count(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM posts")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkfeed_core::SortField;

    #[test]
    fn test_order_clause_ascending() {
        let req = ListPostsRequest {
            order: SortField::Title,
            ..Default::default()
        };
        assert_eq!(order_clause(&req), "title ASC");
    }

    #[test]
    fn test_order_clause_descending() {
        let req = ListPostsRequest {
            order: SortField::CreatedAt,
            descending: true,
            ..Default::default()
        };
        assert_eq!(order_clause(&req), "created_at DESC");
    }
}
