//! Test fixtures for API integration tests
//!
//! Provides backing stores pre-filled with known data and executors over them.

#![allow(dead_code)]

use std::sync::Arc;

use blogroll_api::graphql::Executor;
use blogroll_api::models::{MemberType, MemberTypeId, Post, Profile, User};
use blogroll_api::repositories::MemoryStore;

/// Seeded store: three users (Ada, Brian, Chen), two posts and one profile each
pub fn seeded_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::seeded())
}

/// Executor reading from and writing to `store`
pub fn executor_for(store: &Arc<MemoryStore>) -> Executor {
    Executor::new(store.clone()).with_mutator(store.clone())
}

/// Store with a seeded demo data set and an executor over it
pub fn seeded() -> (Arc<MemoryStore>, Executor) {
    let store = seeded_store();
    let executor = executor_for(&store);
    (store, executor)
}

/// Builder for stores with hand-picked, possibly inconsistent, contents
#[derive(Default)]
pub struct StoreBuilder {
    store: MemoryStore,
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add only the basic membership tier
    pub fn basic_tier(self) -> Self {
        self.store
            .insert_member_type(MemberType::new(MemberTypeId::Basic, 2.3, 20));
        self
    }

    /// Add a user and return its id alongside the builder
    pub fn user(self, name: &str) -> (Self, uuid::Uuid) {
        let user = User::new(name, 10.0);
        let id = user.id;
        self.store.insert_user(user);
        (self, id)
    }

    pub fn post(self, author_id: uuid::Uuid, title: &str) -> Self {
        self.store.insert_post(Post::new(author_id, title, "body"));
        self
    }

    pub fn profile(self, user_id: uuid::Uuid, tier: MemberTypeId) -> Self {
        self.store
            .insert_profile(Profile::new(user_id, tier, false, 1999));
        self
    }

    /// Add a post as given, including one with no author
    pub fn post_record(self, post: Post) -> Self {
        self.store.insert_post(post);
        self
    }

    /// Add a profile as given, including one with null foreign keys
    pub fn profile_record(self, profile: Profile) -> Self {
        self.store.insert_profile(profile);
        self
    }

    pub fn build(self) -> Arc<MemoryStore> {
        Arc::new(self.store)
    }
}
