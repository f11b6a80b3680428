//! Data models shared across linkfeed crates.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{Error, Result};

/// Rendering used for `created_at` in API responses,
/// e.g. `2019-08-02 12:32:55.533172+00:00`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f%:z";

/// A stored link. Field order is the API's JSON field order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Post {
    /// Store-assigned identifier.
    pub id: i64,
    /// Link target (unique).
    pub url: String,
    /// Link text (unique).
    pub title: String,
    /// Insert time, assigned by the store.
    #[serde(serialize_with = "serialize_timestamp")]
    pub created_at: DateTime<Utc>,
}

fn serialize_timestamp<S>(ts: &DateTime<Utc>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(&ts.format(TIMESTAMP_FORMAT))
}

/// One `(url, title)` pair produced by the upstream fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FetchedLink {
    pub url: String,
    pub title: String,
}

impl FetchedLink {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
        }
    }
}

/// Columns posts can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Id,
    Url,
    Title,
    CreatedAt,
}

impl SortField {
    /// Column name in the `posts` table. Only these strings ever reach SQL.
    pub fn column(self) -> &'static str {
        match self {
            SortField::Id => "id",
            SortField::Url => "url",
            SortField::Title => "title",
            SortField::CreatedAt => "created_at",
        }
    }
}

impl FromStr for SortField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "id" => Ok(SortField::Id),
            "url" => Ok(SortField::Url),
            "title" => Ok(SortField::Title),
            "created_at" => Ok(SortField::CreatedAt),
            other => Err(Error::UnknownSortField(other.to_string())),
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// Ordered, paginated read against the post store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListPostsRequest {
    pub order: SortField,
    /// Maximum rows returned, applied after ordering.
    pub limit: i64,
    /// Rows skipped, applied after ordering.
    pub offset: i64,
    pub descending: bool,
}

impl Default for ListPostsRequest {
    fn default() -> Self {
        Self {
            order: SortField::Id,
            limit: crate::defaults::PAGE_LIMIT,
            offset: crate::defaults::PAGE_OFFSET,
            descending: false,
        }
    }
}
