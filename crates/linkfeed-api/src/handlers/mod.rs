//! HTTP handlers.

pub mod health;
pub mod posts;

use crate::ApiError;

/// Fallback for paths with no route.
pub async fn not_found() -> ApiError {
    ApiError::NotFound("Not found".to_string())
}
