//! Write access to the durable store, used by mutation root fields

use async_trait::async_trait;
use uuid::Uuid;

use super::fetcher::FetchResult;
use crate::models::{
    ChangePostInput, ChangeProfileInput, ChangeUserInput, CreatePostInput, CreateProfileInput,
    CreateUserInput, Entity, EntityKey, EntityKind,
};

/// One write, fully coerced from the mutation's arguments
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    CreateUser(CreateUserInput),
    ChangeUser(Uuid, ChangeUserInput),
    DeleteUser(Uuid),
    CreatePost(CreatePostInput),
    ChangePost(Uuid, ChangePostInput),
    DeletePost(Uuid),
    CreateProfile(CreateProfileInput),
    ChangeProfile(Uuid, ChangeProfileInput),
    DeleteProfile(Uuid),
    /// `user_id` starts following `author_id`
    SubscribeTo { user_id: Uuid, author_id: Uuid },
    UnsubscribeFrom { user_id: Uuid, author_id: Uuid },
}

impl Write {
    /// Kind of the record written (the subscriber for subscription changes)
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::CreateUser(_)
            | Self::ChangeUser(..)
            | Self::DeleteUser(_)
            | Self::SubscribeTo { .. }
            | Self::UnsubscribeFrom { .. } => EntityKind::User,
            Self::CreatePost(_) | Self::ChangePost(..) | Self::DeletePost(_) => EntityKind::Post,
            Self::CreateProfile(_) | Self::ChangeProfile(..) | Self::DeleteProfile(_) => {
                EntityKind::Profile
            }
        }
    }

    /// Primary key of the existing record the write addresses
    pub fn target(&self) -> Option<EntityKey> {
        match self {
            Self::CreateUser(_) | Self::CreatePost(_) | Self::CreateProfile(_) => None,
            Self::ChangeUser(id, _)
            | Self::DeleteUser(id)
            | Self::ChangePost(id, _)
            | Self::DeletePost(id)
            | Self::ChangeProfile(id, _)
            | Self::DeleteProfile(id) => Some(EntityKey::Id(*id)),
            Self::SubscribeTo { user_id, .. } | Self::UnsubscribeFrom { user_id, .. } => {
                Some(EntityKey::Id(*user_id))
            }
        }
    }

    /// Mutation field this write is issued by
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateUser(_) => "createUser",
            Self::ChangeUser(..) => "changeUser",
            Self::DeleteUser(_) => "deleteUser",
            Self::CreatePost(_) => "createPost",
            Self::ChangePost(..) => "changePost",
            Self::DeletePost(_) => "deletePost",
            Self::CreateProfile(_) => "createProfile",
            Self::ChangeProfile(..) => "changeProfile",
            Self::DeleteProfile(_) => "deleteProfile",
            Self::SubscribeTo { .. } => "subscribeTo",
            Self::UnsubscribeFrom { .. } => "unsubscribeFrom",
        }
    }
}

/// Result of a successful write
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// The record as stored afterwards; `None` when the addressed record does
    /// not exist
    Record(Option<Entity>),
    /// Whether a delete removed anything
    Removed(bool),
}

/// Single-write access to the durable store
///
/// Each call is one write; a failed write leaves the store unchanged.
#[async_trait]
pub trait Mutator: Send + Sync {
    async fn apply(&self, write: &Write) -> FetchResult<WriteOutcome>;
}
