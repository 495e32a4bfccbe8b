//! In-process backing store
//!
//! Serves the `memory` storage backend and the test suites. Every call is
//! recorded so batching behaviour can be asserted on, and individual lookups
//! can be made to fail. Writes enforce the same reference and uniqueness
//! rules as the PostgreSQL schema, including cascading user deletes.

use std::collections::HashSet;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use super::fetcher::{group_by_key, FetchError, FetchResult, Fetcher, KeyedEntities};
use super::mutator::{Mutator, Write, WriteOutcome};
use crate::graphql::schema::{EdgeId, ForeignKey, JoinDirection, Lookup, RelationEdge};
use crate::models::{
    Entity, EntityKey, EntityKind, MemberType, MemberTypeId, Post, Profile, Subscription, User,
};

/// One call received by a [`MemoryStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchCall {
    ByKeys { edge: EdgeId, keys: Vec<EntityKey> },
    All(EntityKind),
    One(EntityKind, EntityKey),
    /// A write, by the mutation field that issued it
    Write(&'static str),
}

#[derive(Debug, Default)]
struct Tables {
    users: Vec<User>,
    posts: Vec<Post>,
    profiles: Vec<Profile>,
    member_types: Vec<MemberType>,
    subscriptions: Vec<Subscription>,
}

#[derive(Debug, Default)]
struct Faults {
    edges: HashSet<EdgeId>,
    kinds: HashSet<EntityKind>,
}

/// Backing store holding every table in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    calls: RwLock<Vec<FetchCall>>,
    faults: RwLock<Faults>,
    latency: Option<Duration>,
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-filled with [`seed_demo`](Self::seed_demo)
    pub fn seeded() -> Self {
        let store = Self::new();
        store.seed_demo();
        store
    }

    /// Delay every fetch by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Fill the store with a small demo data set
    ///
    /// Both membership tiers, three users with two posts and a profile each,
    /// and a few subscriptions between them.
    pub fn seed_demo(&self) {
        self.insert_member_type(MemberType::new(MemberTypeId::Basic, 2.3, 20));
        self.insert_member_type(MemberType::new(MemberTypeId::Business, 7.7, 100));

        let people = [
            ("Ada", 120.5, MemberTypeId::Business, false, 1985),
            ("Brian", 42.0, MemberTypeId::Basic, true, 1990),
            ("Chen", 7.25, MemberTypeId::Basic, false, 2001),
        ];

        let mut ids = Vec::with_capacity(people.len());
        for (name, balance, tier, is_male, year_of_birth) in people {
            let user = User::new(name, balance);
            ids.push(user.id);
            for n in 1..=2 {
                self.insert_post(Post::new(
                    user.id,
                    format!("{}'s post #{}", name, n),
                    format!("Notes from {}", name),
                ));
            }
            self.insert_profile(Profile::new(user.id, tier, is_male, year_of_birth));
            self.insert_user(user);
        }

        self.subscribe(ids[1], ids[0]);
        self.subscribe(ids[2], ids[0]);
        self.subscribe(ids[0], ids[2]);

        tracing::debug!(users = ids.len(), "Seeded demo data");
    }

    pub fn insert_user(&self, user: User) {
        self.write_tables().users.push(user);
    }

    pub fn insert_post(&self, post: Post) {
        self.write_tables().posts.push(post);
    }

    pub fn insert_profile(&self, profile: Profile) {
        self.write_tables().profiles.push(profile);
    }

    /// Insert or replace the record of one membership tier
    pub fn insert_member_type(&self, member_type: MemberType) {
        let mut tables = self.write_tables();
        tables.member_types.retain(|m| m.id != member_type.id);
        tables.member_types.push(member_type);
    }

    /// Record that `subscriber_id` follows `author_id`; repeats are ignored
    pub fn subscribe(&self, subscriber_id: Uuid, author_id: Uuid) {
        let subscription = Subscription::new(subscriber_id, author_id);
        let mut tables = self.write_tables();
        if !tables.subscriptions.contains(&subscription) {
            tables.subscriptions.push(subscription);
        }
    }

    pub fn users(&self) -> Vec<User> {
        self.read_tables().users.clone()
    }

    pub fn posts(&self) -> Vec<Post> {
        self.read_tables().posts.clone()
    }

    pub fn profiles(&self) -> Vec<Profile> {
        self.read_tables().profiles.clone()
    }

    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.read_tables().subscriptions.clone()
    }

    /// Make every batched fetch along `edge` fail
    pub fn fail_edge(&self, edge: EdgeId) {
        self.faults
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .edges
            .insert(edge);
    }

    /// Make fetch-all, fetch-one and writes of `kind` fail
    pub fn fail_kind(&self, kind: EntityKind) {
        self.faults
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .kinds
            .insert(kind);
    }

    /// Calls received so far, in arrival order
    pub fn calls(&self) -> Vec<FetchCall> {
        self.calls
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Batched calls received so far
    pub fn batch_calls(&self) -> Vec<(EdgeId, Vec<EntityKey>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                FetchCall::ByKeys { edge, keys } => Some((edge, keys)),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn record(&self, call: FetchCall) {
        self.calls
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    fn read_tables(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_tables(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn check_edge(&self, edge: EdgeId) -> FetchResult<()> {
        let faults = self.faults.read().unwrap_or_else(PoisonError::into_inner);
        if faults.edges.contains(&edge) {
            return Err(FetchError::Unavailable(format!("{} lookups are failing", edge)));
        }
        Ok(())
    }

    fn check_kind(&self, kind: EntityKind) -> FetchResult<()> {
        let faults = self.faults.read().unwrap_or_else(PoisonError::into_inner);
        if faults.kinds.contains(&kind) {
            return Err(FetchError::Unavailable(format!("{} lookups are failing", kind)));
        }
        Ok(())
    }

    fn all_of(tables: &Tables, kind: EntityKind) -> Vec<Entity> {
        match kind {
            EntityKind::User => tables.users.iter().cloned().map(Entity::from).collect(),
            EntityKind::Post => tables.posts.iter().cloned().map(Entity::from).collect(),
            EntityKind::Profile => tables.profiles.iter().cloned().map(Entity::from).collect(),
            EntityKind::MemberType => tables
                .member_types
                .iter()
                .cloned()
                .map(Entity::from)
                .collect(),
        }
    }

    fn by_primary_key(tables: &Tables, kind: EntityKind, keys: &HashSet<EntityKey>) -> KeyedEntities {
        group_by_key(
            Self::all_of(tables, kind)
                .into_iter()
                .filter(|entity| keys.contains(&entity.key()))
                .map(|entity| (entity.key(), entity)),
        )
    }

    fn by_foreign_key(tables: &Tables, fk: ForeignKey, keys: &HashSet<EntityKey>) -> KeyedEntities {
        let owner = match fk {
            ForeignKey::PostAuthor => EntityKind::Post,
            ForeignKey::ProfileUser => EntityKind::Profile,
        };
        group_by_key(Self::all_of(tables, owner).into_iter().filter_map(|entity| {
            let key = fk.read(&entity)?;
            keys.contains(&key).then_some((key, entity))
        }))
    }

    fn through_subscriptions(
        tables: &Tables,
        direction: JoinDirection,
        keys: &HashSet<EntityKey>,
    ) -> KeyedEntities {
        group_by_key(tables.subscriptions.iter().filter_map(|subscription| {
            let (from, to) = match direction {
                JoinDirection::SubscribedTo => (subscription.subscriber_id, subscription.author_id),
                JoinDirection::Subscribers => (subscription.author_id, subscription.subscriber_id),
            };
            let key = EntityKey::Id(from);
            if !keys.contains(&key) {
                return None;
            }
            let user = tables.users.iter().find(|user| user.id == to)?;
            Some((key, Entity::from(user.clone())))
        }))
    }
}

#[async_trait]
impl Fetcher for MemoryStore {
    async fn fetch_by_keys(
        &self,
        edge: &RelationEdge,
        keys: &[EntityKey],
    ) -> FetchResult<KeyedEntities> {
        self.record(FetchCall::ByKeys {
            edge: edge.id,
            keys: keys.to_vec(),
        });
        self.simulate_latency().await;
        self.check_edge(edge.id)?;

        let keys: HashSet<EntityKey> = keys.iter().copied().collect();
        let tables = self.read_tables();
        Ok(match edge.lookup {
            Lookup::PrimaryKey => Self::by_primary_key(&tables, edge.target, &keys),
            Lookup::ForeignKey(fk) => Self::by_foreign_key(&tables, fk, &keys),
            Lookup::Subscription(direction) => {
                Self::through_subscriptions(&tables, direction, &keys)
            }
        })
    }

    async fn fetch_all(&self, kind: EntityKind) -> FetchResult<Vec<Entity>> {
        self.record(FetchCall::All(kind));
        self.simulate_latency().await;
        self.check_kind(kind)?;
        Ok(Self::all_of(&self.read_tables(), kind))
    }

    async fn fetch_one(&self, kind: EntityKind, key: EntityKey) -> FetchResult<Option<Entity>> {
        self.record(FetchCall::One(kind, key));
        self.simulate_latency().await;
        self.check_kind(kind)?;
        Ok(Self::all_of(&self.read_tables(), kind)
            .into_iter()
            .find(|entity| entity.key() == key))
    }
}

impl Tables {
    fn has_user(&self, id: Uuid) -> bool {
        self.users.iter().any(|user| user.id == id)
    }

    fn require_user(&self, id: Uuid) -> FetchResult<()> {
        if self.has_user(id) {
            return Ok(());
        }
        Err(FetchError::Rejected(format!("user {} does not exist", id)))
    }

    fn require_member_type(&self, id: MemberTypeId) -> FetchResult<()> {
        if self.member_types.iter().any(|member_type| member_type.id == id) {
            return Ok(());
        }
        Err(FetchError::Rejected(format!("member type {} does not exist", id)))
    }

    fn delete_user(&mut self, id: Uuid) -> bool {
        let before = self.users.len();
        self.users.retain(|user| user.id != id);
        if self.users.len() == before {
            return false;
        }
        self.posts.retain(|post| post.author_id != Some(id));
        self.profiles.retain(|profile| profile.user_id != Some(id));
        self.subscriptions
            .retain(|s| s.subscriber_id != id && s.author_id != id);
        true
    }

    fn apply(&mut self, write: &Write) -> FetchResult<WriteOutcome> {
        let outcome = match write {
            Write::CreateUser(input) => {
                let user = input.clone().into_user();
                self.users.push(user.clone());
                WriteOutcome::Record(Some(user.into()))
            }
            Write::ChangeUser(id, changes) => WriteOutcome::Record(
                self.users.iter_mut().find(|user| user.id == *id).map(|user| {
                    changes.apply(user);
                    Entity::from(user.clone())
                }),
            ),
            Write::DeleteUser(id) => WriteOutcome::Removed(self.delete_user(*id)),
            Write::CreatePost(input) => {
                self.require_user(input.author_id)?;
                let post = input.clone().into_post();
                self.posts.push(post.clone());
                WriteOutcome::Record(Some(post.into()))
            }
            Write::ChangePost(id, changes) => WriteOutcome::Record(
                self.posts.iter_mut().find(|post| post.id == *id).map(|post| {
                    changes.apply(post);
                    Entity::from(post.clone())
                }),
            ),
            Write::DeletePost(id) => {
                let before = self.posts.len();
                self.posts.retain(|post| post.id != *id);
                WriteOutcome::Removed(self.posts.len() < before)
            }
            Write::CreateProfile(input) => {
                self.require_user(input.user_id)?;
                self.require_member_type(input.member_type_id)?;
                if self
                    .profiles
                    .iter()
                    .any(|profile| profile.user_id == Some(input.user_id))
                {
                    return Err(FetchError::Rejected(format!(
                        "user {} already has a profile",
                        input.user_id
                    )));
                }
                let profile = input.clone().into_profile();
                self.profiles.push(profile.clone());
                WriteOutcome::Record(Some(profile.into()))
            }
            Write::ChangeProfile(id, changes) => {
                if let Some(member_type_id) = changes.member_type_id {
                    self.require_member_type(member_type_id)?;
                }
                WriteOutcome::Record(
                    self.profiles
                        .iter_mut()
                        .find(|profile| profile.id == *id)
                        .map(|profile| {
                            changes.apply(profile);
                            Entity::from(profile.clone())
                        }),
                )
            }
            Write::DeleteProfile(id) => {
                let before = self.profiles.len();
                self.profiles.retain(|profile| profile.id != *id);
                WriteOutcome::Removed(self.profiles.len() < before)
            }
            Write::SubscribeTo { user_id, author_id } => {
                let Some(user) = self.users.iter().find(|user| user.id == *user_id).cloned() else {
                    return Ok(WriteOutcome::Record(None));
                };
                self.require_user(*author_id)?;
                let subscription = Subscription::new(*user_id, *author_id);
                if !self.subscriptions.contains(&subscription) {
                    self.subscriptions.push(subscription);
                }
                WriteOutcome::Record(Some(user.into()))
            }
            Write::UnsubscribeFrom { user_id, author_id } => {
                let subscription = Subscription::new(*user_id, *author_id);
                let before = self.subscriptions.len();
                self.subscriptions.retain(|s| *s != subscription);
                WriteOutcome::Removed(self.subscriptions.len() < before)
            }
        };
        Ok(outcome)
    }
}

#[async_trait]
impl Mutator for MemoryStore {
    async fn apply(&self, write: &Write) -> FetchResult<WriteOutcome> {
        self.record(FetchCall::Write(write.name()));
        self.simulate_latency().await;
        self.check_kind(write.kind())?;

        let outcome = self.write_tables().apply(write)?;
        tracing::debug!(write = write.name(), "Applied write");
        Ok(outcome)
    }
}
