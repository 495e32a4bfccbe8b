//! Profile repository for centralized database operations

use sqlx::PgPool;
use uuid::Uuid;

use super::utils::PROFILE_COLUMNS;
use crate::models::{ChangeProfileInput, Profile};

/// Repository for profile database operations
#[derive(Clone)]
pub struct ProfileRepository {
    pool: PgPool,
}

impl ProfileRepository {
    /// Create a new ProfileRepository instance
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a profile by its unique ID
    pub async fn find_by_id(&self, profile_id: Uuid) -> Result<Option<Profile>, sqlx::Error> {
        let sql = format!("SELECT {} FROM profiles WHERE id = $1", PROFILE_COLUMNS);
        sqlx::query_as::<_, Profile>(&sql)
            .bind(profile_id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Find every profile whose ID is in `ids`
    pub async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Profile>, sqlx::Error> {
        let sql = format!("SELECT {} FROM profiles WHERE id = ANY($1)", PROFILE_COLUMNS);
        sqlx::query_as::<_, Profile>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await
    }

    /// Find the profiles owned by any of `user_ids` (at most one each)
    pub async fn find_by_users(&self, user_ids: &[Uuid]) -> Result<Vec<Profile>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM profiles WHERE user_id = ANY($1)",
            PROFILE_COLUMNS
        );
        sqlx::query_as::<_, Profile>(&sql)
            .bind(user_ids)
            .fetch_all(&self.pool)
            .await
    }

    /// List all profiles
    pub async fn find_all(&self) -> Result<Vec<Profile>, sqlx::Error> {
        let sql = format!("SELECT {} FROM profiles ORDER BY id ASC", PROFILE_COLUMNS);
        sqlx::query_as::<_, Profile>(&sql).fetch_all(&self.pool).await
    }

    /// Insert a profile record
    ///
    /// Fails with a unique violation when the user already has a profile.
    pub async fn create(&self, profile: &Profile) -> Result<Profile, sqlx::Error> {
        let sql = format!(
            "INSERT INTO profiles ({0}) VALUES ($1, $2, $3, $4, $5) RETURNING {0}",
            PROFILE_COLUMNS
        );
        sqlx::query_as::<_, Profile>(&sql)
            .bind(profile.id)
            .bind(profile.is_male)
            .bind(profile.year_of_birth)
            .bind(profile.user_id)
            .bind(profile.member_type_id)
            .fetch_one(&self.pool)
            .await
    }

    /// Apply the present fields of `changes` to one profile
    pub async fn update(
        &self,
        profile_id: Uuid,
        changes: &ChangeProfileInput,
    ) -> Result<Option<Profile>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE profiles
            SET is_male = COALESCE($2, is_male),
                year_of_birth = COALESCE($3, year_of_birth),
                member_type_id = COALESCE($4, member_type_id)
            WHERE id = $1
            RETURNING {}
            "#,
            PROFILE_COLUMNS
        );
        sqlx::query_as::<_, Profile>(&sql)
            .bind(profile_id)
            .bind(changes.is_male)
            .bind(changes.year_of_birth)
            .bind(changes.member_type_id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Delete a profile, returning whether it existed
    pub async fn delete(&self, profile_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM profiles WHERE id = $1")
            .bind(profile_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
