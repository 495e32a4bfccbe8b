//! Profile model

use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use super::MemberTypeId;

/// Profile record from the profiles table
///
/// Each user owns at most one profile (`user_id` is unique).
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Profile {
    /// Unique profile identifier
    pub id: Uuid,

    pub is_male: bool,

    pub year_of_birth: i32,

    /// Owning user
    pub user_id: Option<Uuid>,

    /// Membership tier
    pub member_type_id: Option<MemberTypeId>,
}

impl Profile {
    /// Create a profile with a fresh random id
    pub fn new(
        user_id: impl Into<Option<Uuid>>,
        member_type_id: impl Into<Option<MemberTypeId>>,
        is_male: bool,
        year_of_birth: i32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            is_male,
            year_of_birth,
            user_id: user_id.into(),
            member_type_id: member_type_id.into(),
        }
    }
}
