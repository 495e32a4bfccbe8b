//! Membership tier model

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

/// Membership tier identifier matching PostgreSQL member_type_id
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "member_type_id", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MemberTypeId {
    Basic,
    Business,
}

impl MemberTypeId {
    /// Every tier, in declaration order
    pub const ALL: [MemberTypeId; 2] = [Self::Basic, Self::Business];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Business => "business",
        }
    }
}

impl fmt::Display for MemberTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemberTypeId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(Self::Basic),
            "business" => Ok(Self::Business),
            other => Err(format!("unknown member type '{}'", other)),
        }
    }
}

/// Membership tier record from the member_types table
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct MemberType {
    pub id: MemberTypeId,

    /// Discount percentage granted to members of this tier
    pub discount: f64,

    /// How many posts a member may publish per month
    pub posts_limit_per_month: i32,
}

impl MemberType {
    pub fn new(id: MemberTypeId, discount: f64, posts_limit_per_month: i32) -> Self {
        Self {
            id,
            discount,
            posts_limit_per_month,
        }
    }
}
