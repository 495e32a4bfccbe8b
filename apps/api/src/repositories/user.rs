//! User repository for centralized database operations

use sqlx::PgPool;
use uuid::Uuid;

use super::utils::USER_COLUMNS;
use crate::models::{ChangeUserInput, User};

/// Repository for user database operations
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new UserRepository instance
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Find a user by their unique ID
    ///
    /// # Returns
    /// * `Ok(Some(User))` - If the user exists
    /// * `Ok(None)` - If no user with the given ID exists
    /// * `Err(sqlx::Error)` - If a database error occurs
    pub async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, sqlx::Error> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        sqlx::query_as::<_, User>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Find every user whose ID is in `ids`, in one query
    pub async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>, sqlx::Error> {
        let sql = format!("SELECT {} FROM users WHERE id = ANY($1)", USER_COLUMNS);
        sqlx::query_as::<_, User>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await
    }

    /// List all users ordered by name
    pub async fn find_all(&self) -> Result<Vec<User>, sqlx::Error> {
        let sql = format!("SELECT {} FROM users ORDER BY name ASC, id ASC", USER_COLUMNS);
        sqlx::query_as::<_, User>(&sql).fetch_all(&self.pool).await
    }

    /// Insert a user record
    ///
    /// # Returns
    /// * `Ok(User)` - The stored user
    /// * `Err(sqlx::Error)` - If a database error occurs (including duplicate IDs)
    pub async fn create(&self, user: &User) -> Result<User, sqlx::Error> {
        let sql = format!(
            "INSERT INTO users ({0}) VALUES ($1, $2, $3) RETURNING {0}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(user.id)
            .bind(&user.name)
            .bind(user.balance)
            .fetch_one(&self.pool)
            .await
    }

    /// Apply the present fields of `changes` to one user
    ///
    /// # Returns
    /// * `Ok(Some(User))` - The user as stored after the update
    /// * `Ok(None)` - If no user with the given ID exists
    /// * `Err(sqlx::Error)` - If a database error occurs
    pub async fn update(
        &self,
        user_id: Uuid,
        changes: &ChangeUserInput,
    ) -> Result<Option<User>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE users
            SET name = COALESCE($2, name), balance = COALESCE($3, balance)
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(user_id)
            .bind(changes.name.as_deref())
            .bind(changes.balance)
            .fetch_optional(&self.pool)
            .await
    }

    /// Delete a user; their posts, profile and subscriptions go with them
    ///
    /// Returns whether a row was removed.
    pub async fn delete(&self, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
