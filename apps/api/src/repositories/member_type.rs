//! Membership tier repository

use sqlx::PgPool;

use super::utils::MEMBER_TYPE_COLUMNS;
use crate::models::{MemberType, MemberTypeId};

/// Repository for member type database operations
#[derive(Clone)]
pub struct MemberTypeRepository {
    pool: PgPool,
}

impl MemberTypeRepository {
    /// Create a new MemberTypeRepository instance
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a membership tier by its identifier
    pub async fn find_by_id(&self, id: MemberTypeId) -> Result<Option<MemberType>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM member_types WHERE id = $1",
            MEMBER_TYPE_COLUMNS
        );
        sqlx::query_as::<_, MemberType>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Find every tier in `ids`
    ///
    /// Compared as text so the key set binds as a plain `text[]`.
    pub async fn find_by_ids(&self, ids: &[MemberTypeId]) -> Result<Vec<MemberType>, sqlx::Error> {
        let ids: Vec<&str> = ids.iter().map(MemberTypeId::as_str).collect();
        let sql = format!(
            "SELECT {} FROM member_types WHERE id::text = ANY($1)",
            MEMBER_TYPE_COLUMNS
        );
        sqlx::query_as::<_, MemberType>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await
    }

    /// List all tiers
    pub async fn find_all(&self) -> Result<Vec<MemberType>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM member_types ORDER BY id ASC",
            MEMBER_TYPE_COLUMNS
        );
        sqlx::query_as::<_, MemberType>(&sql)
            .fetch_all(&self.pool)
            .await
    }
}
