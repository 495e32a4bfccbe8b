//! Test helper functions for API integration tests
//!
//! Provides utility functions for driving the HTTP router and asserting on
//! execution responses.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use blogroll_api::graphql::{ExecutionResponse, PathSegment};
use blogroll_api::repositories::{Fetcher, Mutator};
use blogroll_api::routes::build_router;
use blogroll_shared_config::StorageBackend;
use serde_json::Value;
use tower::ServiceExt;

/// Full application router over `store`
pub fn test_app<S>(store: Arc<S>) -> Router
where
    S: Fetcher + Mutator + 'static,
{
    build_router(store.clone(), store, StorageBackend::Memory)
}

/// Send a request and decode the JSON body
pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

/// POST a raw body to the GraphQL endpoint
pub async fn post_graphql(app: Router, body: impl Into<String>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/graphql")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.into()))
        .unwrap();
    send(app, request).await
}

/// GET a path
pub async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

/// Render an error path as `users.0.posts`
pub fn dotted(path: &[PathSegment]) -> String {
    path.iter()
        .map(|segment| match segment {
            PathSegment::Field(name) => name.clone(),
            PathSegment::Index(index) => index.to_string(),
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// Paths of every error carrying `code`, dotted
pub fn error_paths(response: &ExecutionResponse, code: &str) -> Vec<String> {
    response
        .errors
        .iter()
        .filter(|error| error.code() == code)
        .filter_map(|error| error.path.as_deref().map(dotted))
        .collect()
}

/// Assert that a response carries no errors, showing them otherwise
pub fn assert_ok(response: &ExecutionResponse) {
    assert!(
        response.is_ok(),
        "expected no errors, got {:?}",
        response.errors
    );
}
