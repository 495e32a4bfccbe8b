//! HTTP route handlers for the Blogroll API
//!
//! - GraphQL endpoint
//! - Health check and readiness endpoints

pub mod graphql;
pub mod health;

pub use graphql::{graphql_router, GraphQLState};
pub use health::{health_router, HealthState};

use std::sync::Arc;

use axum::Router;
use blogroll_shared_config::StorageBackend;

use crate::graphql::Executor;
use crate::repositories::{Fetcher, Mutator};

/// Assemble every route over one backing store
///
/// `fetcher` and `mutator` are normally the same store seen through its read
/// and write interfaces.
pub fn build_router(
    fetcher: Arc<dyn Fetcher>,
    mutator: Arc<dyn Mutator>,
    storage: StorageBackend,
) -> Router {
    let executor = Executor::new(Arc::clone(&fetcher)).with_mutator(mutator);
    Router::new()
        .nest("/graphql", graphql_router(GraphQLState::new(executor)))
        .nest("/health", health_router(HealthState::new(fetcher, storage)))
}
