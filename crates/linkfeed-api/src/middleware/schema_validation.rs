//! Schema validation middleware.
//!
//! Checks the request path, method and query string against the loaded
//! [`ParameterSchema`](linkfeed_core::ParameterSchema) before any handler
//! runs.

use axum::{
    extract::{Query, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use linkfeed_core::validate;

use crate::{ApiError, AppState};

pub async fn schema_validation(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    // Pairs in received order, duplicates kept.
    let query = match Query::<Vec<(String, String)>>::try_from_uri(request.uri()) {
        Ok(Query(pairs)) => pairs,
        Err(e) => {
            debug!(subsystem = "api", component = "schema_validation", error = %e, "Malformed query string");
            return ApiError::BadRequest(format!("Malformed query string: {}", e)).into_response();
        }
    };

    let path = request.uri().path();
    let method = request.method().as_str();

    if let Err(err) = validate(&state.schema, path, method, &query) {
        debug!(
            subsystem = "api",
            component = "schema_validation",
            path,
            method,
            error = %err,
            "Request rejected"
        );
        return ApiError::from(err).into_response();
    }

    next.run(request).await
}
