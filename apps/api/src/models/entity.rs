//! Tagged entity types shared by the query engine and the backing stores

use std::fmt;

use uuid::Uuid;

use super::{MemberType, MemberTypeId, Post, Profile, User};

/// The kinds of record the entity graph knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    User,
    Post,
    Profile,
    MemberType,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [Self::User, Self::Post, Self::Profile, Self::MemberType];

    /// Object type name exposed to queries
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Post => "Post",
            Self::Profile => "Profile",
            Self::MemberType => "MemberType",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Primary or foreign key value
///
/// Users, posts and profiles are keyed by random 128-bit ids; membership
/// tiers are keyed by their closed enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKey {
    Id(Uuid),
    MemberType(MemberTypeId),
}

impl EntityKey {
    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Self::Id(id) => Some(*id),
            Self::MemberType(_) => None,
        }
    }

    pub fn as_member_type(&self) -> Option<MemberTypeId> {
        match self {
            Self::MemberType(id) => Some(*id),
            Self::Id(_) => None,
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{}", id.hyphenated()),
            Self::MemberType(id) => write!(f, "{}", id),
        }
    }
}

impl From<Uuid> for EntityKey {
    fn from(id: Uuid) -> Self {
        Self::Id(id)
    }
}

impl From<MemberTypeId> for EntityKey {
    fn from(id: MemberTypeId) -> Self {
        Self::MemberType(id)
    }
}

/// A record of any kind
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    User(User),
    Post(Post),
    Profile(Profile),
    MemberType(MemberType),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::User(_) => EntityKind::User,
            Self::Post(_) => EntityKind::Post,
            Self::Profile(_) => EntityKind::Profile,
            Self::MemberType(_) => EntityKind::MemberType,
        }
    }

    /// Primary key of this record
    pub fn key(&self) -> EntityKey {
        match self {
            Self::User(user) => user.id.into(),
            Self::Post(post) => post.id.into(),
            Self::Profile(profile) => profile.id.into(),
            Self::MemberType(member_type) => member_type.id.into(),
        }
    }

    pub fn as_user(&self) -> Option<&User> {
        match self {
            Self::User(user) => Some(user),
            _ => None,
        }
    }

    pub fn as_post(&self) -> Option<&Post> {
        match self {
            Self::Post(post) => Some(post),
            _ => None,
        }
    }

    pub fn as_profile(&self) -> Option<&Profile> {
        match self {
            Self::Profile(profile) => Some(profile),
            _ => None,
        }
    }

    pub fn as_member_type(&self) -> Option<&MemberType> {
        match self {
            Self::MemberType(member_type) => Some(member_type),
            _ => None,
        }
    }
}

impl From<User> for Entity {
    fn from(user: User) -> Self {
        Self::User(user)
    }
}

impl From<Post> for Entity {
    fn from(post: Post) -> Self {
        Self::Post(post)
    }
}

impl From<Profile> for Entity {
    fn from(profile: Profile) -> Self {
        Self::Profile(profile)
    }
}

impl From<MemberType> for Entity {
    fn from(member_type: MemberType) -> Self {
        Self::MemberType(member_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_key_renders_canonical_text() {
        let id = Uuid::parse_str("6F1C2C5E-0B8A-4C39-9E3B-2B3C3D4E5F60").unwrap();
        assert_eq!(
            EntityKey::from(id).to_string(),
            "6f1c2c5e-0b8a-4c39-9e3b-2b3c3d4e5f60"
        );
    }

    #[test]
    fn test_entity_key_matches_record_id() {
        let user = User::new("alice", 10.0);
        let entity = Entity::from(user.clone());
        assert_eq!(entity.kind(), EntityKind::User);
        assert_eq!(entity.key(), EntityKey::Id(user.id));
        assert!(entity.as_post().is_none());
    }

    #[test]
    fn test_key_domains_do_not_cross() {
        let key = EntityKey::from(MemberTypeId::Basic);
        assert_eq!(key.as_uuid(), None);
        assert_eq!(key.as_member_type(), Some(MemberTypeId::Basic));
    }
}
