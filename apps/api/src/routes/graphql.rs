//! GraphQL HTTP route handlers
//!
//! - `POST /graphql` - execute a query or mutation

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};

use crate::error::{ApiError, ApiResult};
use crate::graphql::{ExecutionResponse, Executor};

/// Shared state for the GraphQL handlers
#[derive(Clone)]
pub struct GraphQLState {
    pub executor: Executor,
}

impl GraphQLState {
    pub fn new(executor: Executor) -> Self {
        Self { executor }
    }
}

/// Create the GraphQL router
pub fn graphql_router(state: GraphQLState) -> Router {
    Router::new()
        .route("/", post(graphql_handler))
        .with_state(state)
}

/// Execute a query or mutation
///
/// Query-level failures (validation, missing records, fetch failures) are
/// reported inside the body with status 200; only an unreadable body is an
/// HTTP error.
async fn graphql_handler(
    State(state): State<GraphQLState>,
    request: Result<Json<async_graphql::Request>, JsonRejection>,
) -> ApiResult<Json<ExecutionResponse>> {
    let Json(request) = request.map_err(|e| ApiError::InvalidBody(e.body_text()))?;
    Ok(Json(state.executor.execute(request).await))
}
