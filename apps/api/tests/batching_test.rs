//! Integration tests for per-execution relation batching
//!
//! Counts the backing fetches each query issues against a recording store.

mod common;

use blogroll_api::graphql::EdgeId;
use blogroll_api::models::{EntityKey, EntityKind};
use blogroll_api::repositories::FetchCall;
use common::*;

fn user_keys(store: &blogroll_api::MemoryStore) -> Vec<EntityKey> {
    store.users().iter().map(|user| user.id.into()).collect()
}

#[tokio::test]
async fn test_sibling_relations_batch_per_level() {
    let (store, executor) = seeded();

    let response = executor
        .execute("{ users { id posts { id } profile { id } } }")
        .await;
    assert_ok(&response);

    let mut batches = store.batch_calls();
    batches.sort_by_key(|(edge, _)| edge.as_str());
    assert_eq!(
        batches,
        vec![
            (EdgeId::UserPosts, user_keys(&store)),
            (EdgeId::UserProfile, user_keys(&store)),
        ]
    );

    let users = response.pointer("users").unwrap().as_array().unwrap();
    assert_eq!(users.len(), 3);
    for user in users {
        assert_eq!(user["posts"].as_array().unwrap().len(), 2);
        assert!(user["profile"]["id"].is_string());
    }
}

#[tokio::test]
async fn test_batch_count_does_not_grow_with_users() {
    let (store, executor) = seeded();
    for n in 0..20 {
        let user = blogroll_api::models::User::new(format!("reader {}", n), 0.0);
        store.insert_user(user);
    }

    let response = executor
        .execute("{ users { posts { id } profile { id } } }")
        .await;
    assert_ok(&response);
    assert_eq!(store.batch_calls().len(), 2);
}

#[tokio::test]
async fn test_repeated_keys_are_deduplicated() {
    let (store, executor) = seeded();

    let response = executor.execute("{ posts { title author { name } } }").await;
    assert_ok(&response);

    // six posts, three distinct authors
    let batches = store.batch_calls();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].0, EdgeId::PostAuthor);
    assert_eq!(batches[0].1.len(), 3);

    for post in response.pointer("posts").unwrap().as_array().unwrap() {
        let title = post["title"].as_str().unwrap();
        let author = post["author"]["name"].as_str().unwrap();
        assert!(title.starts_with(author), "{} not written by {}", title, author);
    }
}

#[tokio::test]
async fn test_each_level_issues_one_fetch() {
    let (store, executor) = seeded();

    let response = executor
        .execute("{ users { posts { author { posts { id } } } } }")
        .await;
    assert_ok(&response);

    let edges: Vec<EdgeId> = store.batch_calls().into_iter().map(|(edge, _)| edge).collect();
    assert_eq!(
        edges,
        vec![EdgeId::UserPosts, EdgeId::PostAuthor, EdgeId::UserPosts]
    );
}

#[tokio::test]
async fn test_same_relation_at_two_sites_is_not_shared() {
    let (store, executor) = seeded();

    let response = executor
        .execute("{ users { mine: profile { id } again: profile { yearOfBirth } } }")
        .await;
    assert_ok(&response);

    let batches = store.batch_calls();
    assert_eq!(batches.len(), 2);
    assert!(batches.iter().all(|(edge, keys)| {
        *edge == EdgeId::UserProfile && keys.len() == 3
    }));
}

#[tokio::test]
async fn test_root_lookups_bypass_batching() {
    let (store, executor) = seeded();
    let ada = store.users()[0].clone();

    let query = format!(
        r#"{{ users {{ id }} user(id: "{}") {{ name }} memberTypes {{ id }} }}"#,
        ada.id
    );
    let response = executor.execute(query).await;
    assert_ok(&response);
    assert_eq!(response.pointer("user.name").unwrap(), "Ada");

    let mut calls = store.calls();
    calls.sort_by_key(|call| format!("{:?}", call));
    assert_eq!(
        calls,
        vec![
            FetchCall::All(EntityKind::MemberType),
            FetchCall::All(EntityKind::User),
            FetchCall::One(EntityKind::User, ada.id.into()),
        ]
    );
}

#[tokio::test]
async fn test_subscription_edges_in_both_directions() {
    let (store, executor) = seeded();

    let response = executor
        .execute("{ users { name userSubscribedTo { name } subscribedToUser { name } } }")
        .await;
    assert_ok(&response);

    let names = |pointer: &str| -> Vec<String> {
        response
            .pointer(pointer)
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|user| user["name"].as_str().unwrap().to_string())
            .collect()
    };
    assert_eq!(names("users.0.subscribedToUser"), vec!["Brian", "Chen"]);
    assert_eq!(names("users.0.userSubscribedTo"), vec!["Chen"]);
    assert_eq!(names("users.1.userSubscribedTo"), vec!["Ada"]);
    assert!(names("users.1.subscribedToUser").is_empty());

    assert_eq!(store.batch_calls().len(), 2);
}

#[tokio::test]
async fn test_concurrent_executions_do_not_share_batches() {
    let (store, executor) = seeded();
    let query = "{ users { posts { id } } }";

    let (first, second) = tokio::join!(executor.execute(query), executor.execute(query));
    assert_ok(&first);
    assert_eq!(first, second);

    let batches = store.batch_calls();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0], batches[1]);
}

#[tokio::test]
async fn test_executions_are_repeatable() {
    let (store, executor) = seeded();
    let query = "{ profiles { user { name } memberType { discount } } }";

    let first = executor.execute(query).await;
    let calls = store.calls();
    store.clear_calls();
    let second = executor.execute(query).await;

    assert_ok(&first);
    assert_eq!(first, second);
    assert_eq!(store.calls(), calls);
}
