//! Query engine for Blogroll
//!
//! - [`schema`]: the static entity graph every query is checked against
//! - [`validation`]: depth limiting and planning, run before any fetch
//! - [`loaders`]: per-execution batching of relation lookups
//! - [`executor`]: resolution of a plan into a response tree

pub mod error;
pub mod executor;
pub mod loaders;
pub mod request;
pub mod response;
pub mod schema;
pub mod validation;

pub use error::{FieldError, ValidationError};
pub use executor::Executor;
pub use loaders::{BatchCoordinator, CallSiteId, LoadHandle, Related};
pub use request::ExecutionRequest;
pub use response::{ExecutionError, ExecutionResponse, PathSegment};
pub use schema::{entity_graph, EdgeId, EntityGraph};
pub use validation::MAX_QUERY_DEPTH;
