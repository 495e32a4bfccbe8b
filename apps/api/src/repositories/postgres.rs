//! PostgreSQL backing store
//!
//! Every batched lookup is a single `= ANY($1)` query over the window's key
//! set, issued through the per-table repositories. Writes are single
//! statements; reference and uniqueness rules are left to the schema.

use async_trait::async_trait;
use sqlx::PgPool;

use super::fetcher::{group_by_key, uuid_keys, FetchError, FetchResult, Fetcher, KeyedEntities};
use super::mutator::{Mutator, Write, WriteOutcome};
use super::{
    MemberTypeRepository, PostRepository, ProfileRepository, SubscriptionRepository,
    UserRepository,
};
use crate::graphql::schema::{ForeignKey, JoinDirection, Lookup, RelationEdge};
use crate::models::{Entity, EntityKey, EntityKind, MemberTypeId, Subscription};

/// [`Fetcher`] and [`Mutator`] over a PostgreSQL connection pool
#[derive(Clone)]
pub struct PgFetcher {
    pool: PgPool,
    users: UserRepository,
    posts: PostRepository,
    profiles: ProfileRepository,
    member_types: MemberTypeRepository,
    subscriptions: SubscriptionRepository,
}

impl PgFetcher {
    pub fn new(pool: PgPool) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            posts: PostRepository::new(pool.clone()),
            profiles: ProfileRepository::new(pool.clone()),
            member_types: MemberTypeRepository::new(pool.clone()),
            subscriptions: SubscriptionRepository::new(pool.clone()),
            pool,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn by_primary_key(
        &self,
        kind: EntityKind,
        keys: &[EntityKey],
    ) -> FetchResult<KeyedEntities> {
        let found: Vec<Entity> = match kind {
            EntityKind::User => into_entities(self.users.find_by_ids(&uuid_keys(kind, keys)?).await?),
            EntityKind::Post => into_entities(self.posts.find_by_ids(&uuid_keys(kind, keys)?).await?),
            EntityKind::Profile => {
                into_entities(self.profiles.find_by_ids(&uuid_keys(kind, keys)?).await?)
            }
            EntityKind::MemberType => {
                let ids = member_type_keys(keys)?;
                into_entities(self.member_types.find_by_ids(&ids).await?)
            }
        };
        Ok(group_by_key(found.into_iter().map(|e| (e.key(), e))))
    }

    async fn by_foreign_key(&self, fk: ForeignKey, keys: &[EntityKey]) -> FetchResult<KeyedEntities> {
        let found: Vec<Entity> = match fk {
            ForeignKey::PostAuthor => {
                let ids = uuid_keys(EntityKind::User, keys)?;
                into_entities(self.posts.find_by_authors(&ids).await?)
            }
            ForeignKey::ProfileUser => {
                let ids = uuid_keys(EntityKind::User, keys)?;
                into_entities(self.profiles.find_by_users(&ids).await?)
            }
        };
        Ok(group_by_key(
            found
                .into_iter()
                .filter_map(|entity| fk.read(&entity).map(|key| (key, entity))),
        ))
    }

    async fn through_subscriptions(
        &self,
        direction: JoinDirection,
        keys: &[EntityKey],
    ) -> FetchResult<KeyedEntities> {
        let ids = uuid_keys(EntityKind::User, keys)?;
        let rows = match direction {
            JoinDirection::SubscribedTo => self.subscriptions.find_authors_followed_by(&ids).await?,
            JoinDirection::Subscribers => self.subscriptions.find_subscribers_of(&ids).await?,
        };
        Ok(group_by_key(
            rows.into_iter()
                .map(|row| (EntityKey::Id(row.source_id), Entity::from(row.user))),
        ))
    }
}

#[async_trait]
impl Fetcher for PgFetcher {
    async fn fetch_by_keys(
        &self,
        edge: &RelationEdge,
        keys: &[EntityKey],
    ) -> FetchResult<KeyedEntities> {
        if keys.is_empty() {
            return Ok(KeyedEntities::new());
        }

        match edge.lookup {
            Lookup::PrimaryKey => self.by_primary_key(edge.target, keys).await,
            Lookup::ForeignKey(fk) => self.by_foreign_key(fk, keys).await,
            Lookup::Subscription(direction) => self.through_subscriptions(direction, keys).await,
        }
    }

    async fn fetch_all(&self, kind: EntityKind) -> FetchResult<Vec<Entity>> {
        Ok(match kind {
            EntityKind::User => into_entities(self.users.find_all().await?),
            EntityKind::Post => into_entities(self.posts.find_all().await?),
            EntityKind::Profile => into_entities(self.profiles.find_all().await?),
            EntityKind::MemberType => into_entities(self.member_types.find_all().await?),
        })
    }

    async fn fetch_one(&self, kind: EntityKind, key: EntityKey) -> FetchResult<Option<Entity>> {
        let mismatch = || FetchError::KindMismatch { kind, key };
        Ok(match kind {
            EntityKind::User => {
                let id = key.as_uuid().ok_or_else(mismatch)?;
                self.users.find_by_id(id).await?.map(Entity::from)
            }
            EntityKind::Post => {
                let id = key.as_uuid().ok_or_else(mismatch)?;
                self.posts.find_by_id(id).await?.map(Entity::from)
            }
            EntityKind::Profile => {
                let id = key.as_uuid().ok_or_else(mismatch)?;
                self.profiles.find_by_id(id).await?.map(Entity::from)
            }
            EntityKind::MemberType => {
                let id = key.as_member_type().ok_or_else(mismatch)?;
                self.member_types.find_by_id(id).await?.map(Entity::from)
            }
        })
    }
}

#[async_trait]
impl Mutator for PgFetcher {
    async fn apply(&self, write: &Write) -> FetchResult<WriteOutcome> {
        let outcome = match write {
            Write::CreateUser(input) => {
                let user = self.users.create(&input.clone().into_user()).await?;
                WriteOutcome::Record(Some(user.into()))
            }
            Write::ChangeUser(id, changes) => {
                WriteOutcome::Record(self.users.update(*id, changes).await?.map(Entity::from))
            }
            Write::DeleteUser(id) => WriteOutcome::Removed(self.users.delete(*id).await?),
            Write::CreatePost(input) => {
                let post = self.posts.create(&input.clone().into_post()).await?;
                WriteOutcome::Record(Some(post.into()))
            }
            Write::ChangePost(id, changes) => {
                WriteOutcome::Record(self.posts.update(*id, changes).await?.map(Entity::from))
            }
            Write::DeletePost(id) => WriteOutcome::Removed(self.posts.delete(*id).await?),
            Write::CreateProfile(input) => {
                let profile = self.profiles.create(&input.clone().into_profile()).await?;
                WriteOutcome::Record(Some(profile.into()))
            }
            Write::ChangeProfile(id, changes) => {
                WriteOutcome::Record(self.profiles.update(*id, changes).await?.map(Entity::from))
            }
            Write::DeleteProfile(id) => WriteOutcome::Removed(self.profiles.delete(*id).await?),
            Write::SubscribeTo { user_id, author_id } => {
                match self.users.find_by_id(*user_id).await? {
                    Some(user) => {
                        self.subscriptions
                            .subscribe(Subscription::new(*user_id, *author_id))
                            .await?;
                        WriteOutcome::Record(Some(user.into()))
                    }
                    None => WriteOutcome::Record(None),
                }
            }
            Write::UnsubscribeFrom { user_id, author_id } => WriteOutcome::Removed(
                self.subscriptions
                    .unsubscribe(Subscription::new(*user_id, *author_id))
                    .await?,
            ),
        };
        tracing::debug!(write = write.name(), "Applied write");
        Ok(outcome)
    }
}

fn into_entities<T: Into<Entity>>(records: Vec<T>) -> Vec<Entity> {
    records.into_iter().map(Into::into).collect()
}

fn member_type_keys(keys: &[EntityKey]) -> FetchResult<Vec<MemberTypeId>> {
    keys.iter()
        .map(|key| {
            key.as_member_type().ok_or(FetchError::KindMismatch {
                kind: EntityKind::MemberType,
                key: *key,
            })
        })
        .collect()
}
