//! Subscription repository: traversals of the subscribers_on_authors join

use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::utils::{qualify_columns, USER_COLUMNS};
use crate::models::{Subscription, User};

/// A user reached through the join, tagged with the user it was reached from
#[derive(Debug, FromRow)]
pub struct JoinedUser {
    pub source_id: Uuid,
    #[sqlx(flatten)]
    pub user: User,
}

/// Repository for subscription database operations
#[derive(Clone)]
pub struct SubscriptionRepository {
    pool: PgPool,
}

impl SubscriptionRepository {
    /// Create a new SubscriptionRepository instance
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Authors followed by any of `subscriber_ids`
    pub async fn find_authors_followed_by(
        &self,
        subscriber_ids: &[Uuid],
    ) -> Result<Vec<JoinedUser>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT s.subscriber_id AS source_id, {}
            FROM subscribers_on_authors s
            JOIN users u ON u.id = s.author_id
            WHERE s.subscriber_id = ANY($1)
            ORDER BY u.name ASC, u.id ASC
            "#,
            qualify_columns("u", USER_COLUMNS)
        );
        sqlx::query_as::<_, JoinedUser>(&sql)
            .bind(subscriber_ids)
            .fetch_all(&self.pool)
            .await
    }

    /// Subscribers of any of `author_ids`
    pub async fn find_subscribers_of(
        &self,
        author_ids: &[Uuid],
    ) -> Result<Vec<JoinedUser>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT s.author_id AS source_id, {}
            FROM subscribers_on_authors s
            JOIN users u ON u.id = s.subscriber_id
            WHERE s.author_id = ANY($1)
            ORDER BY u.name ASC, u.id ASC
            "#,
            qualify_columns("u", USER_COLUMNS)
        );
        sqlx::query_as::<_, JoinedUser>(&sql)
            .bind(author_ids)
            .fetch_all(&self.pool)
            .await
    }

    /// Record a subscription; repeating an existing pair is a no-op
    pub async fn subscribe(&self, subscription: Subscription) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO subscribers_on_authors (subscriber_id, author_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(subscription.subscriber_id)
        .bind(subscription.author_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Remove a subscription, returning whether it existed
    pub async fn unsubscribe(&self, subscription: Subscription) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM subscribers_on_authors WHERE subscriber_id = $1 AND author_id = $2",
        )
        .bind(subscription.subscriber_id)
        .bind(subscription.author_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
