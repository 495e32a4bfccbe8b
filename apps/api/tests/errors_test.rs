//! Integration tests for field-scoped errors
//!
//! Missing required records and failing backing fetches are reported per
//! output position, next to the data that did resolve.

mod common;

use blogroll_api::graphql::error::codes;
use blogroll_api::graphql::EdgeId;
use blogroll_api::models::{EntityKey, EntityKind, MemberTypeId, Post, Profile};
use common::*;
use serde_json::{json, Value};
use uuid::Uuid;

#[tokio::test]
async fn test_missing_member_type_is_not_found() {
    let store = StoreBuilder::new().basic_tier().build();
    let executor = executor_for(&store);

    let response = executor
        .execute("{ memberType(id: business) { id } memberTypes { id } }")
        .await;

    assert_eq!(response.pointer("memberType"), Some(&Value::Null));
    assert_eq!(response.pointer("memberTypes"), Some(&json!([{"id": "basic"}])));
    assert_eq!(response.errors.len(), 1);
    assert_eq!(error_paths(&response, codes::NOT_FOUND), vec!["memberType"]);
}

#[tokio::test]
async fn test_existing_member_type_resolves() {
    let (_, executor) = seeded();

    let response = executor
        .execute(r#"{ memberType(id: "business") { id discount postsLimitPerMonth } }"#)
        .await;

    assert_ok(&response);
    assert_eq!(
        response.pointer("memberType"),
        Some(&json!({"id": "business", "discount": 7.7, "postsLimitPerMonth": 100}))
    );
}

#[tokio::test]
async fn test_profile_without_user_is_not_found() {
    let (builder, owner) = StoreBuilder::new().basic_tier().user("Dora");
    let store = builder
        .profile(owner, MemberTypeId::Basic)
        .profile(uuid::Uuid::new_v4(), MemberTypeId::Basic)
        .build();
    let executor = executor_for(&store);

    let response = executor
        .execute("{ profiles { yearOfBirth user { name } } }")
        .await;

    assert_eq!(response.pointer("profiles.0.user.name").unwrap(), "Dora");
    assert_eq!(response.pointer("profiles.1.user"), Some(&Value::Null));
    assert_eq!(response.pointer("profiles.1.yearOfBirth").unwrap(), 1999);
    assert_eq!(error_paths(&response, codes::NOT_FOUND), vec!["profiles.1.user"]);
}

#[tokio::test]
async fn test_optional_relations_yield_null() {
    let (builder, author) = StoreBuilder::new().basic_tier().user("Eli");
    let store = builder
        .post(author, "kept")
        .post(uuid::Uuid::new_v4(), "orphaned")
        .profile(uuid::Uuid::new_v4(), MemberTypeId::Business)
        .build();
    let executor = executor_for(&store);

    let response = executor
        .execute("{ posts { title author { name } } profiles { memberType { id } } users { profile { id } posts { title } } }")
        .await;

    assert_ok(&response);
    assert_eq!(response.pointer("posts.0.author.name").unwrap(), "Eli");
    assert_eq!(response.pointer("posts.1.author"), Some(&Value::Null));
    assert_eq!(response.pointer("profiles.0.memberType"), Some(&Value::Null));
    assert_eq!(response.pointer("users.0.profile"), Some(&Value::Null));
    assert_eq!(response.pointer("users.0.posts"), Some(&json!([{"title": "kept"}])));
}

#[tokio::test]
async fn test_null_foreign_keys_resolve_to_null_without_fetching() {
    let (builder, owner) = StoreBuilder::new().basic_tier().user("Fay");
    let store = builder
        .post(owner, "signed")
        .post_record(Post::new(None::<Uuid>, "anonymous", "body"))
        .profile_record(Profile::new(owner, None::<MemberTypeId>, true, 1988))
        .profile_record(Profile::new(None::<Uuid>, MemberTypeId::Basic, false, 1970))
        .build();
    let executor = executor_for(&store);

    let response = executor
        .execute(
            "{ posts { title authorId author { name } } \
               profiles { userId memberTypeId user { name } memberType { id } } }",
        )
        .await;

    assert_ok(&response);
    assert_eq!(
        response.pointer("posts.1"),
        Some(&json!({"title": "anonymous", "authorId": null, "author": null}))
    );
    assert_eq!(response.pointer("profiles.0.memberTypeId"), Some(&Value::Null));
    assert_eq!(response.pointer("profiles.0.memberType"), Some(&Value::Null));
    assert_eq!(response.pointer("profiles.0.user.name").unwrap(), "Fay");
    assert_eq!(
        response.pointer("profiles.1"),
        Some(&json!({"userId": null, "memberTypeId": "basic", "user": null, "memberType": {"id": "basic"}}))
    );

    // only the keys that exist reach the store
    let owner_key = EntityKey::Id(owner);
    for (edge, keys) in store.batch_calls() {
        match edge {
            EdgeId::PostAuthor | EdgeId::ProfileUser => assert_eq!(keys, vec![owner_key]),
            EdgeId::ProfileMemberType => {
                assert_eq!(keys, vec![EntityKey::MemberType(MemberTypeId::Basic)])
            }
            other => panic!("unexpected batch along {}", other),
        }
    }
    assert_eq!(store.batch_calls().len(), 3);
}

#[tokio::test]
async fn test_missing_optional_root_records_are_null() {
    let (_, executor) = seeded();
    let missing = uuid::Uuid::new_v4();

    let query = format!(
        r#"{{ user(id: "{id}") {{ id }} post(id: "{id}") {{ id }} profile(id: "{id}") {{ id }} }}"#,
        id = missing
    );
    let response = executor.execute(query).await;

    assert_ok(&response);
    assert_eq!(
        response.data,
        Some(json!({"user": null, "post": null, "profile": null}))
    );
}

#[tokio::test]
async fn test_fetch_failure_is_scoped_to_its_window() {
    let (store, executor) = seeded();
    store.fail_edge(EdgeId::UserPosts);

    let response = executor
        .execute("{ users { name posts { id } profile { id } } }")
        .await;

    assert_eq!(
        error_paths(&response, codes::FETCH_FAILURE),
        vec!["users.0.posts", "users.1.posts", "users.2.posts"]
    );
    assert_eq!(response.errors.len(), 3);
    assert!(response.errors[0].message.contains("User.posts"));

    for index in 0..3 {
        assert_eq!(
            response.pointer(&format!("users.{}.posts", index)),
            Some(&Value::Null)
        );
        assert!(response
            .pointer(&format!("users.{}.profile.id", index))
            .unwrap()
            .is_string());
    }
    assert_eq!(response.pointer("users.0.name").unwrap(), "Ada");
}

#[tokio::test]
async fn test_nested_fetch_failure_keeps_ancestors() {
    let (store, executor) = seeded();
    store.fail_edge(EdgeId::ProfileMemberType);

    let response = executor
        .execute("{ user: users { profile { isMale memberType { id } } } }")
        .await;

    assert_eq!(response.errors.len(), 3);
    assert!(response.has_error_code(codes::FETCH_FAILURE));
    assert_eq!(response.pointer("user.1.profile.isMale").unwrap(), true);
    assert_eq!(response.pointer("user.1.profile.memberType"), Some(&Value::Null));
}

#[tokio::test]
async fn test_failing_root_collection_keeps_siblings() {
    let (store, executor) = seeded();
    store.fail_kind(EntityKind::Post);

    let response = executor.execute("{ posts { id } memberTypes { id } }").await;

    assert_eq!(response.pointer("posts"), Some(&Value::Null));
    assert_eq!(
        response.pointer("memberTypes"),
        Some(&json!([{"id": "basic"}, {"id": "business"}]))
    );
    assert_eq!(error_paths(&response, codes::FETCH_FAILURE), vec!["posts"]);
}

#[tokio::test]
async fn test_errors_are_ordered_by_path() {
    let (builder, _) = StoreBuilder::new().basic_tier().user("Fay");
    let store = builder
        .profile(uuid::Uuid::new_v4(), MemberTypeId::Basic)
        .build();
    store.fail_edge(EdgeId::UserPosts);
    let executor = executor_for(&store);

    let response = executor
        .execute("{ users { posts { id } } profiles { user { id } } memberType(id: business) { id } }")
        .await;

    let paths: Vec<String> = response
        .errors
        .iter()
        .filter_map(|error| error.path.as_deref().map(dotted))
        .collect();
    assert_eq!(paths, vec!["memberType", "profiles.0.user", "users.0.posts"]);
}

#[tokio::test]
async fn test_error_wire_format() {
    let store = StoreBuilder::new().basic_tier().build();
    let executor = executor_for(&store);

    let response = executor.execute("{\n  memberType(id: business) { id }\n}").await;
    let json = serde_json::to_value(&response).unwrap();

    assert_eq!(json["data"], json!({"memberType": null}));
    assert_eq!(json["errors"][0]["path"], json!(["memberType"]));
    assert_eq!(json["errors"][0]["locations"], json!([{"line": 2, "column": 3}]));
    assert_eq!(json["errors"][0]["extensions"]["code"], "NOT_FOUND");
}
