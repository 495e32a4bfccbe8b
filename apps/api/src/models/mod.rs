//! Entity records for Blogroll
//!
//! This module contains SQLx models for:
//! - Users, their posts and profiles
//! - Membership tiers
//! - Subscription edges between users
//!
//! the tagged [`Entity`] / [`EntityKey`] types the query engine moves around,
//! and the write payloads of the mutation root fields.

pub mod entity;
pub mod input;
pub mod member_type;
pub mod post;
pub mod profile;
pub mod subscription;
pub mod user;

pub use entity::{Entity, EntityKey, EntityKind};
pub use input::{
    ChangePostInput, ChangeProfileInput, ChangeUserInput, CreatePostInput, CreateProfileInput,
    CreateUserInput,
};
pub use member_type::{MemberType, MemberTypeId};
pub use post::Post;
pub use profile::Profile;
pub use subscription::Subscription;
pub use user::User;
