//! # linkfeed-api
//!
//! HTTP service for linkfeed: the `/posts` read endpoint guarded by the
//! declarative parameter schema, plus `/health`.
//!
//! The binary in `main.rs` wires configuration, logging, the database, the
//! upstream fetcher and the update scheduler around [`build_router`].

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use linkfeed_core::{ParameterSchema, PostRepository};
use linkfeed_jobs::RefreshTrigger;

pub use config::ApiConfig;
pub use error::ApiError;

/// Shared application context.
#[derive(Clone)]
pub struct AppState {
    /// Immutable parameter schema loaded at startup.
    pub schema: Arc<ParameterSchema>,
    /// Post store.
    pub posts: Arc<dyn PostRepository>,
    /// Producer handle of the update scheduler.
    pub refresh: RefreshTrigger,
    /// Posts returned when `limit` is omitted.
    pub page_limit: i64,
}

/// Generates time-ordered UUIDv7 request correlation IDs.
#[derive(Clone, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// Build the application router.
///
/// Schema validation wraps every route and the fallback, so unregistered
/// paths and methods answer 404 before reaching a handler.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/posts", get(handlers::posts::list_posts))
        .route("/health", get(handlers::health::health_check))
        .fallback(handlers::not_found)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::schema_validation,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .with_state(state)
}
