//! Write payloads accepted by the mutation root fields
//!
//! Field names follow the GraphQL input objects (`camelCase`). Unknown fields
//! are rejected; every field of a `Change*` payload is optional and an absent
//! field leaves the stored column untouched.

use serde::Deserialize;
use uuid::Uuid;

use super::{MemberTypeId, Post, Profile, User};

/// `CreateUserInput`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateUserInput {
    pub name: String,
    pub balance: f64,
}

impl CreateUserInput {
    pub fn into_user(self) -> User {
        User::new(self.name, self.balance)
    }
}

/// `ChangeUserInput`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ChangeUserInput {
    pub name: Option<String>,
    pub balance: Option<f64>,
}

impl ChangeUserInput {
    pub fn apply(&self, user: &mut User) {
        if let Some(name) = &self.name {
            user.name = name.clone();
        }
        if let Some(balance) = self.balance {
            user.balance = balance;
        }
    }
}

/// `CreatePostInput`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreatePostInput {
    pub title: String,
    pub content: String,
    pub author_id: Uuid,
}

impl CreatePostInput {
    pub fn into_post(self) -> Post {
        Post::new(self.author_id, self.title, self.content)
    }
}

/// `ChangePostInput`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ChangePostInput {
    pub title: Option<String>,
    pub content: Option<String>,
}

impl ChangePostInput {
    pub fn apply(&self, post: &mut Post) {
        if let Some(title) = &self.title {
            post.title = title.clone();
        }
        if let Some(content) = &self.content {
            post.content = content.clone();
        }
    }
}

/// `CreateProfileInput`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateProfileInput {
    pub is_male: bool,
    pub year_of_birth: i32,
    pub user_id: Uuid,
    pub member_type_id: MemberTypeId,
}

impl CreateProfileInput {
    pub fn into_profile(self) -> Profile {
        Profile::new(
            self.user_id,
            self.member_type_id,
            self.is_male,
            self.year_of_birth,
        )
    }
}

/// `ChangeProfileInput`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ChangeProfileInput {
    pub is_male: Option<bool>,
    pub year_of_birth: Option<i32>,
    pub member_type_id: Option<MemberTypeId>,
}

impl ChangeProfileInput {
    pub fn apply(&self, profile: &mut Profile) {
        if let Some(is_male) = self.is_male {
            profile.is_male = is_male;
        }
        if let Some(year_of_birth) = self.year_of_birth {
            profile.year_of_birth = year_of_birth;
        }
        if let Some(member_type_id) = self.member_type_id {
            profile.member_type_id = Some(member_type_id);
        }
    }
}
