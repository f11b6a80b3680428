//! `GET /posts`.

use std::time::Instant;

use axum::{
    extract::{Query, State},
    Json,
};
use tracing::{debug, warn};

use linkfeed_core::{defaults, list_posts as read_posts, Post};
use linkfeed_jobs::CycleOutcome;

use crate::{ApiError, AppState};

/// Typed view of the `/posts` query. Absent parameters take their defaults;
/// the first occurrence of a repeated parameter wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostsParams {
    pub order: String,
    pub limit: i64,
    pub offset: i64,
    pub descending: bool,
    pub force_update: bool,
}

impl PostsParams {
    pub fn from_pairs(pairs: &[(String, String)], page_limit: i64) -> Result<Self, ApiError> {
        let first = |name: &str| {
            pairs
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str())
        };
        let integer = |name: &str, default: i64| match first(name) {
            Some(raw) => raw.parse::<i64>().map_err(|_| {
                ApiError::BadRequest(format!("Parameter {} is not a valid integer", name))
            }),
            None => Ok(default),
        };

        Ok(Self {
            order: first("order").unwrap_or(defaults::PAGE_ORDER).to_string(),
            limit: integer("limit", page_limit)?,
            offset: integer("offset", defaults::PAGE_OFFSET)?,
            descending: first("descending") == Some("true"),
            force_update: first("force_update") == Some("true"),
        })
    }
}

/// List posts, optionally forcing a refresh first.
pub async fn list_posts(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<Post>>, ApiError> {
    let params = PostsParams::from_pairs(&pairs, state.page_limit)?;

    if params.force_update {
        let start = Instant::now();
        let status = state.refresh.request_and_await_refresh().await?;
        match status.last_outcome {
            Some(CycleOutcome::Failed(ref error)) => {
                warn!(subsystem = "api", op = "force_update", %error, "Forced refresh failed, serving stored posts");
            }
            ref outcome => {
                debug!(
                    subsystem = "api",
                    op = "force_update",
                    outcome = outcome.as_ref().map(CycleOutcome::label),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Forced refresh completed"
                );
            }
        }
    }

    let posts = read_posts(
        state.posts.as_ref(),
        &params.order,
        params.limit,
        params.offset,
        params.descending,
    )
    .await?;

    Ok(Json(posts))
}
