//! Blogroll API library
//!
//! This module exposes the query engine, backing stores and HTTP routes for
//! use by the server binary and by integration tests.

pub mod config;
pub mod error;
pub mod graphql;
pub mod models;
pub mod repositories;
pub mod routes;

// Re-export commonly used types
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use graphql::{ExecutionRequest, ExecutionResponse, Executor};
pub use repositories::{Fetcher, MemoryStore, PgFetcher};
