//! Post model

use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Post record from the posts table
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Post {
    /// Unique post identifier
    pub id: Uuid,

    /// Post title
    pub title: String,

    /// Post body
    pub content: String,

    /// User who wrote this post, if any
    pub author_id: Option<Uuid>,
}

impl Post {
    /// Create a post with a fresh random id
    pub fn new(
        author_id: impl Into<Option<Uuid>>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            content: content.into(),
            author_id: author_id.into(),
        }
    }
}
