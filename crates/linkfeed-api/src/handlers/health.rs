//! `GET /health`.

use axum::{extract::State, Json};
use serde::Serialize;

use linkfeed_core::TIMESTAMP_FORMAT;

use crate::{ApiError, AppState};

#[derive(Debug, Serialize)]
pub struct SchedulerHealth {
    pub cycles_completed: u64,
    pub last_outcome: Option<String>,
    pub last_fetch_at: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub posts: i64,
    pub scheduler: SchedulerHealth,
}

/// Liveness plus store and scheduler summary.
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let posts = state.posts.count().await?;
    let refresh = state.refresh.status();

    Ok(Json(HealthResponse {
        status: if state.refresh.is_running() {
            "healthy"
        } else {
            "degraded"
        },
        version: env!("CARGO_PKG_VERSION"),
        posts,
        scheduler: SchedulerHealth {
            cycles_completed: refresh.completed,
            last_outcome: refresh.last_outcome.map(|outcome| outcome.to_string()),
            last_fetch_at: refresh
                .last_fetch_at
                .map(|ts| ts.format(TIMESTAMP_FORMAT).to_string()),
        },
    }))
}
