//! Backing store interface consumed by the query engine

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::graphql::schema::RelationEdge;
use crate::models::{Entity, EntityKey, EntityKind};

/// Errors raised by a backing store
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("backing store unavailable: {0}")]
    Unavailable(String),

    #[error("key {key} cannot address {kind} records")]
    KindMismatch { kind: EntityKind, key: EntityKey },

    /// A write would break a reference or uniqueness rule of the store
    #[error("write rejected: {0}")]
    Rejected(String),
}

pub type FetchResult<T> = Result<T, FetchError>;

/// Related records grouped by the source key that reached them
pub type KeyedEntities = HashMap<EntityKey, Vec<Entity>>;

/// Key-based read access to the durable store
///
/// Implementations must be safe to call concurrently; the engine issues at
/// most one `fetch_by_keys` per batch window.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Resolve a whole key set along `edge` in one call
    ///
    /// Keys with no related record are absent from the result.
    async fn fetch_by_keys(
        &self,
        edge: &RelationEdge,
        keys: &[EntityKey],
    ) -> FetchResult<KeyedEntities>;

    /// Every record of `kind`
    async fn fetch_all(&self, kind: EntityKind) -> FetchResult<Vec<Entity>>;

    /// One record of `kind` by primary key
    async fn fetch_one(&self, kind: EntityKind, key: EntityKey) -> FetchResult<Option<Entity>>;
}

/// Group records under the key each one was reached by
pub(crate) fn group_by_key<I>(records: I) -> KeyedEntities
where
    I: IntoIterator<Item = (EntityKey, Entity)>,
{
    let mut grouped: KeyedEntities = HashMap::new();
    for (key, entity) in records {
        grouped.entry(key).or_default().push(entity);
    }
    grouped
}

/// Split a key set into uuids, rejecting keys from another domain
pub(crate) fn uuid_keys(kind: EntityKind, keys: &[EntityKey]) -> FetchResult<Vec<uuid::Uuid>> {
    keys.iter()
        .map(|key| {
            key.as_uuid()
                .ok_or(FetchError::KindMismatch { kind, key: *key })
        })
        .collect()
}
