//! Post repository for centralized database operations

use sqlx::PgPool;
use uuid::Uuid;

use super::utils::POST_COLUMNS;
use crate::models::{ChangePostInput, Post};

/// Repository for post database operations
#[derive(Clone)]
pub struct PostRepository {
    pool: PgPool,
}

impl PostRepository {
    /// Create a new PostRepository instance
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a post by its unique ID
    pub async fn find_by_id(&self, post_id: Uuid) -> Result<Option<Post>, sqlx::Error> {
        let sql = format!("SELECT {} FROM posts WHERE id = $1", POST_COLUMNS);
        sqlx::query_as::<_, Post>(&sql)
            .bind(post_id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Find every post whose ID is in `ids`
    pub async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Post>, sqlx::Error> {
        let sql = format!("SELECT {} FROM posts WHERE id = ANY($1)", POST_COLUMNS);
        sqlx::query_as::<_, Post>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await
    }

    /// Find the posts written by any of `author_ids`
    pub async fn find_by_authors(&self, author_ids: &[Uuid]) -> Result<Vec<Post>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM posts WHERE author_id = ANY($1) ORDER BY title ASC, id ASC",
            POST_COLUMNS
        );
        sqlx::query_as::<_, Post>(&sql)
            .bind(author_ids)
            .fetch_all(&self.pool)
            .await
    }

    /// List all posts ordered by title
    pub async fn find_all(&self) -> Result<Vec<Post>, sqlx::Error> {
        let sql = format!("SELECT {} FROM posts ORDER BY title ASC, id ASC", POST_COLUMNS);
        sqlx::query_as::<_, Post>(&sql).fetch_all(&self.pool).await
    }

    /// Insert a post record
    pub async fn create(&self, post: &Post) -> Result<Post, sqlx::Error> {
        let sql = format!(
            "INSERT INTO posts ({0}) VALUES ($1, $2, $3, $4) RETURNING {0}",
            POST_COLUMNS
        );
        sqlx::query_as::<_, Post>(&sql)
            .bind(post.id)
            .bind(&post.title)
            .bind(&post.content)
            .bind(post.author_id)
            .fetch_one(&self.pool)
            .await
    }

    /// Apply the present fields of `changes` to one post
    pub async fn update(
        &self,
        post_id: Uuid,
        changes: &ChangePostInput,
    ) -> Result<Option<Post>, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE posts
            SET title = COALESCE($2, title), content = COALESCE($3, content)
            WHERE id = $1
            RETURNING {}
            "#,
            POST_COLUMNS
        );
        sqlx::query_as::<_, Post>(&sql)
            .bind(post_id)
            .bind(changes.title.as_deref())
            .bind(changes.content.as_deref())
            .fetch_optional(&self.pool)
            .await
    }

    /// Delete a post, returning whether it existed
    pub async fn delete(&self, post_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(post_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
