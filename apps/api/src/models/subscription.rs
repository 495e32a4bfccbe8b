//! Subscription join record

use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// One row of the subscribers_on_authors join table
///
/// `(subscriber_id, author_id)` is unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRow, Serialize)]
pub struct Subscription {
    /// User who subscribed
    pub subscriber_id: Uuid,

    /// User being followed
    pub author_id: Uuid,
}

impl Subscription {
    pub fn new(subscriber_id: Uuid, author_id: Uuid) -> Self {
        Self {
            subscriber_id,
            author_id,
        }
    }
}
