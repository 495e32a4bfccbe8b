//! Integration tests for the query depth limit
//!
//! Over-deep queries are rejected before any backing fetch runs.

mod common;

use blogroll_api::graphql::error::codes;
use blogroll_api::graphql::MAX_QUERY_DEPTH;
use common::*;
use rstest::rstest;

const DEPTH_FIVE: &str = "{ users { posts { author { profile { memberType { id } } } } } }";
const DEPTH_SIX: &str =
    "query TooDeep { users { posts { author { profile { user { posts { id } } } } } } }";

#[test]
fn test_default_limit() {
    assert_eq!(MAX_QUERY_DEPTH, 5);
}

#[tokio::test]
async fn test_query_at_limit_executes() {
    let (_, executor) = seeded();

    let response = executor.execute(DEPTH_FIVE).await;

    assert_ok(&response);
    assert!(response
        .pointer("users.0.posts.0.author.profile.memberType.id")
        .is_some());
}

#[tokio::test]
async fn test_query_over_limit_is_rejected_without_fetching() {
    let (store, executor) = seeded();

    let response = executor.execute(DEPTH_SIX).await;

    assert!(response.data.is_none());
    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].code(), codes::VALIDATION_ERROR);
    assert_eq!(
        response.errors[0].message,
        "'TooDeep' exceeds maximum operation depth of 5"
    );
    assert!(response.errors[0].path.is_none());
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn test_unused_deep_operation_still_rejects_request() {
    let (store, executor) = seeded();
    let query = format!("query Shallow {{ users {{ id }} }}\n{}", DEPTH_SIX);

    let request = blogroll_api::ExecutionRequest::new(query).operation_name("Shallow");
    let response = executor.execute(request).await;

    assert!(response.data.is_none());
    assert!(response.has_error_code(codes::VALIDATION_ERROR));
    assert!(store.calls().is_empty());
}

#[rstest]
#[case::fragment_spread(
    "{ users { ...Deep } } fragment Deep on User { posts { author { profile { user { id } } } } }",
    true
)]
#[case::inline_fragment(
    "{ users { ... on User { posts { author { profile { memberType { id } } } } } } }",
    true
)]
#[case::introspection_leaf(
    "{ users { posts { author { profile { memberType { __typename id } } } } } }",
    true
)]
#[case::anonymous_over_limit(
    "{ posts { author { posts { author { posts { author { id } } } } } } }",
    false
)]
#[tokio::test]
async fn test_depth_is_measured_through_fragments(#[case] query: &str, #[case] accepted: bool) {
    let (_, executor) = seeded();

    let response = executor.execute(query).await;

    assert_eq!(response.data.is_some(), accepted, "{:?}", response.errors);
}

#[tokio::test]
async fn test_anonymous_operation_is_named_in_message() {
    let (_, executor) = seeded();

    let response = executor
        .execute("{ posts { author { posts { author { posts { author { id } } } } } } }")
        .await;

    assert_eq!(
        response.errors[0].message,
        "'<anonymous>' exceeds maximum operation depth of 5"
    );
}

#[tokio::test]
async fn test_lower_limit_can_be_configured() {
    let store = seeded_store();
    let executor = executor_for(&store).with_max_depth(1);

    let accepted = executor.execute("{ users { id } }").await;
    let rejected = executor.execute("{ users { profile { id } } }").await;

    assert_ok(&accepted);
    assert!(rejected.data.is_none());
}
