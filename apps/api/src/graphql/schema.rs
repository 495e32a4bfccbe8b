//! Entity graph descriptor
//!
//! Static declaration of every entity kind the engine can serve: its object
//! type name, scalar fields, and relation edges, plus the root fields of the
//! query and mutation types. Planning, batching and resolution only ever
//! consult this table, so adding or renaming a kind or a relation is a change
//! here (plus the backing stores), not in the engine.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use serde_json::{json, Value};

use crate::models::{Entity, EntityKey, EntityKind};

/// Object type name of the query root
pub const ROOT_TYPE_NAME: &str = "Query";

/// Object type name of the mutation root
pub const MUTATION_TYPE_NAME: &str = "Mutation";

static ENTITY_GRAPH: Lazy<EntityGraph> = Lazy::new(EntityGraph::build);

/// The process-wide, read-only entity graph
pub fn entity_graph() -> &'static EntityGraph {
    &ENTITY_GRAPH
}

/// Leaf value types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Uuid,
    String,
    Float,
    Int,
    Boolean,
    MemberTypeId,
}

impl ScalarKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Uuid => "UUID",
            Self::String => "String",
            Self::Float => "Float",
            Self::Int => "Int",
            Self::Boolean => "Boolean",
            Self::MemberTypeId => "MemberTypeId",
        }
    }
}

/// A scalar field and how to read it off an entity
pub struct ScalarField {
    pub name: &'static str,
    pub kind: ScalarKind,
    pub read: fn(&Entity) -> Value,
}

impl fmt::Debug for ScalarField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScalarField")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Identifier of a relation edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeId {
    PostAuthor,
    UserPosts,
    UserProfile,
    ProfileUser,
    ProfileMemberType,
    UserSubscribedTo,
    SubscribedToUser,
}

impl EdgeId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PostAuthor => "Post.author",
            Self::UserPosts => "User.posts",
            Self::UserProfile => "User.profile",
            Self::ProfileUser => "Profile.user",
            Self::ProfileMemberType => "Profile.memberType",
            Self::UserSubscribedTo => "User.userSubscribedTo",
            Self::SubscribedToUser => "User.subscribedToUser",
        }
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    Single,
    List,
}

/// Whether a missing related record is an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Existence {
    /// A miss resolves to null
    Optional,
    /// A miss is a NotFound error scoped to the field
    Required,
}

/// Foreign key columns the backing stores can be queried by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForeignKey {
    /// `posts.author_id`
    PostAuthor,
    /// `profiles.user_id`
    ProfileUser,
}

impl ForeignKey {
    pub fn column(&self) -> &'static str {
        match self {
            Self::PostAuthor => "author_id",
            Self::ProfileUser => "user_id",
        }
    }

    /// Read this foreign key off a record of the owning kind
    ///
    /// `None` for records of another kind and for records whose column is null.
    pub fn read(&self, entity: &Entity) -> Option<EntityKey> {
        match self {
            Self::PostAuthor => entity.as_post()?.author_id.map(EntityKey::from),
            Self::ProfileUser => entity.as_profile()?.user_id.map(EntityKey::from),
        }
    }
}

/// Direction of a traversal through the subscription join table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinDirection {
    /// Keys are subscribers, results are the authors they follow
    SubscribedTo,
    /// Keys are authors, results are their subscribers
    Subscribers,
}

/// How a backing store answers a batched key lookup for an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// Target records whose primary key is in the key set
    PrimaryKey,
    /// Target records whose foreign key column is in the key set
    ForeignKey(ForeignKey),
    /// Users reached through the subscription join table
    Subscription(JoinDirection),
}

/// A named, directed link between two entity kinds
pub struct RelationEdge {
    pub id: EdgeId,
    /// Field name on the source object type
    pub field: &'static str,
    pub source: EntityKind,
    pub target: EntityKind,
    pub cardinality: Cardinality,
    pub existence: Existence,
    pub lookup: Lookup,
    /// Reads the join key off a source entity
    pub source_key: fn(&Entity) -> Option<EntityKey>,
}

impl RelationEdge {
    pub fn is_list(&self) -> bool {
        self.cardinality == Cardinality::List
    }

    pub fn is_required(&self) -> bool {
        self.existence == Existence::Required
    }
}

impl fmt::Debug for RelationEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationEdge")
            .field("id", &self.id)
            .field("target", &self.target)
            .field("cardinality", &self.cardinality)
            .field("existence", &self.existence)
            .field("lookup", &self.lookup)
            .finish()
    }
}

/// Declaration of one entity kind
#[derive(Debug)]
pub struct EntityDescriptor {
    pub kind: EntityKind,
    pub scalars: Vec<ScalarField>,
    pub relations: Vec<EdgeId>,
}

/// A field of an object type, as found by name
#[derive(Debug, Clone, Copy)]
pub enum FieldDef<'a> {
    Scalar(&'a ScalarField),
    Relation(&'a RelationEdge),
}

/// How a root field reaches its records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootAccess {
    /// Unfiltered fetch of every record
    All,
    /// Direct fetch by the `id` argument
    ById(Existence),
}

#[derive(Debug, Clone)]
pub struct RootField {
    pub name: &'static str,
    pub kind: EntityKind,
    pub access: RootAccess,
}

impl RootField {
    /// Scalar kind of the `id` argument for by-id lookups
    pub fn id_kind(&self) -> ScalarKind {
        match self.kind {
            EntityKind::MemberType => ScalarKind::MemberTypeId,
            _ => ScalarKind::Uuid,
        }
    }
}

/// A field of a mutation input object
#[derive(Debug, PartialEq, Eq)]
pub struct InputField {
    pub name: &'static str,
    pub kind: ScalarKind,
}

/// Shape of a mutation payload argument
#[derive(Debug, PartialEq, Eq)]
pub struct InputObject {
    pub name: &'static str,
    pub fields: &'static [InputField],
}

impl InputObject {
    pub fn field(&self, name: &str) -> Option<&InputField> {
        self.fields.iter().find(|field| field.name == name)
    }
}

const fn input(name: &'static str, kind: ScalarKind) -> InputField {
    InputField { name, kind }
}

pub static CREATE_USER_INPUT: InputObject = InputObject {
    name: "CreateUserInput",
    fields: &[input("name", ScalarKind::String), input("balance", ScalarKind::Float)],
};

pub static CHANGE_USER_INPUT: InputObject = InputObject {
    name: "ChangeUserInput",
    fields: &[input("name", ScalarKind::String), input("balance", ScalarKind::Float)],
};

pub static CREATE_POST_INPUT: InputObject = InputObject {
    name: "CreatePostInput",
    fields: &[
        input("title", ScalarKind::String),
        input("content", ScalarKind::String),
        input("authorId", ScalarKind::Uuid),
    ],
};

pub static CHANGE_POST_INPUT: InputObject = InputObject {
    name: "ChangePostInput",
    fields: &[input("title", ScalarKind::String), input("content", ScalarKind::String)],
};

pub static CREATE_PROFILE_INPUT: InputObject = InputObject {
    name: "CreateProfileInput",
    fields: &[
        input("isMale", ScalarKind::Boolean),
        input("yearOfBirth", ScalarKind::Int),
        input("userId", ScalarKind::Uuid),
        input("memberTypeId", ScalarKind::MemberTypeId),
    ],
};

pub static CHANGE_PROFILE_INPUT: InputObject = InputObject {
    name: "ChangeProfileInput",
    fields: &[
        input("isMale", ScalarKind::Boolean),
        input("yearOfBirth", ScalarKind::Int),
        input("memberTypeId", ScalarKind::MemberTypeId),
    ],
};

/// Declared type of a mutation argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentType {
    Scalar(ScalarKind),
    Input(&'static InputObject),
}

impl ArgumentType {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Scalar(kind) => kind.type_name(),
            Self::Input(input) => input.name,
        }
    }
}

/// A required argument of a mutation root field
#[derive(Debug, Clone, Copy)]
pub struct ArgumentDef {
    pub name: &'static str,
    pub ty: ArgumentType,
}

/// The single write a mutation root field performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOp {
    CreateUser,
    ChangeUser,
    DeleteUser,
    CreatePost,
    ChangePost,
    DeletePost,
    CreateProfile,
    ChangeProfile,
    DeleteProfile,
    SubscribeTo,
    UnsubscribeFrom,
}

#[derive(Debug, Clone)]
pub struct MutationField {
    pub name: &'static str,
    pub op: MutationOp,
    /// Object type of the result; `None` for `Boolean` results
    pub returns: Option<EntityKind>,
    pub arguments: Vec<ArgumentDef>,
}

impl MutationField {
    pub fn argument(&self, name: &str) -> Option<&ArgumentDef> {
        self.arguments.iter().find(|argument| argument.name == name)
    }
}

/// Entity kinds, relation edges and root fields
#[derive(Debug)]
pub struct EntityGraph {
    entities: HashMap<EntityKind, EntityDescriptor>,
    edges: HashMap<EdgeId, RelationEdge>,
    roots: Vec<RootField>,
    mutations: Vec<MutationField>,
}

impl EntityGraph {
    pub fn entity(&self, kind: EntityKind) -> &EntityDescriptor {
        // every kind is registered in build()
        &self.entities[&kind]
    }

    pub fn edge(&self, id: EdgeId) -> &RelationEdge {
        &self.edges[&id]
    }

    pub fn edges(&self) -> impl Iterator<Item = &RelationEdge> {
        self.edges.values()
    }

    pub fn root(&self, name: &str) -> Option<&RootField> {
        self.roots.iter().find(|root| root.name == name)
    }

    pub fn mutation(&self, name: &str) -> Option<&MutationField> {
        self.mutations.iter().find(|mutation| mutation.name == name)
    }

    /// Find a field of an object type by name
    pub fn field(&self, kind: EntityKind, name: &str) -> Option<FieldDef<'_>> {
        let descriptor = self.entity(kind);
        if let Some(scalar) = descriptor.scalars.iter().find(|s| s.name == name) {
            return Some(FieldDef::Scalar(scalar));
        }
        descriptor
            .relations
            .iter()
            .map(|id| self.edge(*id))
            .find(|edge| edge.field == name)
            .map(FieldDef::Relation)
    }

    fn build() -> Self {
        let entities = [
            EntityDescriptor {
                kind: EntityKind::User,
                scalars: vec![
                    scalar("id", ScalarKind::Uuid, |e| key_value(e.key())),
                    scalar("name", ScalarKind::String, |e| {
                        e.as_user().map_or(Value::Null, |u| json!(u.name))
                    }),
                    scalar("balance", ScalarKind::Float, |e| {
                        e.as_user().map_or(Value::Null, |u| json!(u.balance))
                    }),
                ],
                relations: vec![
                    EdgeId::UserProfile,
                    EdgeId::UserPosts,
                    EdgeId::UserSubscribedTo,
                    EdgeId::SubscribedToUser,
                ],
            },
            EntityDescriptor {
                kind: EntityKind::Post,
                scalars: vec![
                    scalar("id", ScalarKind::Uuid, |e| key_value(e.key())),
                    scalar("title", ScalarKind::String, |e| {
                        e.as_post().map_or(Value::Null, |p| json!(p.title))
                    }),
                    scalar("content", ScalarKind::String, |e| {
                        e.as_post().map_or(Value::Null, |p| json!(p.content))
                    }),
                    scalar("authorId", ScalarKind::Uuid, |e| {
                        optional_key(e.as_post().and_then(|p| p.author_id))
                    }),
                ],
                relations: vec![EdgeId::PostAuthor],
            },
            EntityDescriptor {
                kind: EntityKind::Profile,
                scalars: vec![
                    scalar("id", ScalarKind::Uuid, |e| key_value(e.key())),
                    scalar("isMale", ScalarKind::Boolean, |e| {
                        e.as_profile().map_or(Value::Null, |p| json!(p.is_male))
                    }),
                    scalar("yearOfBirth", ScalarKind::Int, |e| {
                        e.as_profile().map_or(Value::Null, |p| json!(p.year_of_birth))
                    }),
                    scalar("userId", ScalarKind::Uuid, |e| {
                        optional_key(e.as_profile().and_then(|p| p.user_id))
                    }),
                    scalar("memberTypeId", ScalarKind::MemberTypeId, |e| {
                        optional_key(e.as_profile().and_then(|p| p.member_type_id))
                    }),
                ],
                relations: vec![EdgeId::ProfileUser, EdgeId::ProfileMemberType],
            },
            EntityDescriptor {
                kind: EntityKind::MemberType,
                scalars: vec![
                    scalar("id", ScalarKind::MemberTypeId, |e| key_value(e.key())),
                    scalar("discount", ScalarKind::Float, |e| {
                        e.as_member_type().map_or(Value::Null, |m| json!(m.discount))
                    }),
                    scalar("postsLimitPerMonth", ScalarKind::Int, |e| {
                        e.as_member_type()
                            .map_or(Value::Null, |m| json!(m.posts_limit_per_month))
                    }),
                ],
                relations: vec![],
            },
        ];

        let edges = [
            RelationEdge {
                id: EdgeId::PostAuthor,
                field: "author",
                source: EntityKind::Post,
                target: EntityKind::User,
                cardinality: Cardinality::Single,
                existence: Existence::Optional,
                lookup: Lookup::PrimaryKey,
                source_key: |e| ForeignKey::PostAuthor.read(e),
            },
            RelationEdge {
                id: EdgeId::UserPosts,
                field: "posts",
                source: EntityKind::User,
                target: EntityKind::Post,
                cardinality: Cardinality::List,
                existence: Existence::Optional,
                lookup: Lookup::ForeignKey(ForeignKey::PostAuthor),
                source_key: |e| Some(e.key()),
            },
            RelationEdge {
                id: EdgeId::UserProfile,
                field: "profile",
                source: EntityKind::User,
                target: EntityKind::Profile,
                cardinality: Cardinality::Single,
                existence: Existence::Optional,
                lookup: Lookup::ForeignKey(ForeignKey::ProfileUser),
                source_key: |e| Some(e.key()),
            },
            RelationEdge {
                id: EdgeId::ProfileUser,
                field: "user",
                source: EntityKind::Profile,
                target: EntityKind::User,
                cardinality: Cardinality::Single,
                existence: Existence::Required,
                lookup: Lookup::PrimaryKey,
                source_key: |e| ForeignKey::ProfileUser.read(e),
            },
            RelationEdge {
                id: EdgeId::ProfileMemberType,
                field: "memberType",
                source: EntityKind::Profile,
                target: EntityKind::MemberType,
                cardinality: Cardinality::Single,
                existence: Existence::Optional,
                lookup: Lookup::PrimaryKey,
                source_key: |e| e.as_profile()?.member_type_id.map(EntityKey::from),
            },
            RelationEdge {
                id: EdgeId::UserSubscribedTo,
                field: "userSubscribedTo",
                source: EntityKind::User,
                target: EntityKind::User,
                cardinality: Cardinality::List,
                existence: Existence::Optional,
                lookup: Lookup::Subscription(JoinDirection::SubscribedTo),
                source_key: |e| Some(e.key()),
            },
            RelationEdge {
                id: EdgeId::SubscribedToUser,
                field: "subscribedToUser",
                source: EntityKind::User,
                target: EntityKind::User,
                cardinality: Cardinality::List,
                existence: Existence::Optional,
                lookup: Lookup::Subscription(JoinDirection::Subscribers),
                source_key: |e| Some(e.key()),
            },
        ];

        let roots = vec![
            root("users", EntityKind::User, RootAccess::All),
            root("user", EntityKind::User, RootAccess::ById(Existence::Optional)),
            root("posts", EntityKind::Post, RootAccess::All),
            root("post", EntityKind::Post, RootAccess::ById(Existence::Optional)),
            root("profiles", EntityKind::Profile, RootAccess::All),
            root(
                "profile",
                EntityKind::Profile,
                RootAccess::ById(Existence::Optional),
            ),
            root("memberTypes", EntityKind::MemberType, RootAccess::All),
            root(
                "memberType",
                EntityKind::MemberType,
                RootAccess::ById(Existence::Required),
            ),
        ];

        let uuid = |name: &'static str| argument(name, ArgumentType::Scalar(ScalarKind::Uuid));
        let dto = |input: &'static InputObject| argument("dto", ArgumentType::Input(input));
        let user = Some(EntityKind::User);
        let post = Some(EntityKind::Post);
        let profile = Some(EntityKind::Profile);
        let mutations = vec![
            mutation("createUser", MutationOp::CreateUser, user, vec![dto(&CREATE_USER_INPUT)]),
            mutation(
                "changeUser",
                MutationOp::ChangeUser,
                user,
                vec![uuid("id"), dto(&CHANGE_USER_INPUT)],
            ),
            mutation("deleteUser", MutationOp::DeleteUser, None, vec![uuid("id")]),
            mutation("createPost", MutationOp::CreatePost, post, vec![dto(&CREATE_POST_INPUT)]),
            mutation(
                "changePost",
                MutationOp::ChangePost,
                post,
                vec![uuid("id"), dto(&CHANGE_POST_INPUT)],
            ),
            mutation("deletePost", MutationOp::DeletePost, None, vec![uuid("id")]),
            mutation(
                "createProfile",
                MutationOp::CreateProfile,
                profile,
                vec![dto(&CREATE_PROFILE_INPUT)],
            ),
            mutation(
                "changeProfile",
                MutationOp::ChangeProfile,
                profile,
                vec![uuid("id"), dto(&CHANGE_PROFILE_INPUT)],
            ),
            mutation("deleteProfile", MutationOp::DeleteProfile, None, vec![uuid("id")]),
            mutation(
                "subscribeTo",
                MutationOp::SubscribeTo,
                user,
                vec![uuid("userId"), uuid("authorId")],
            ),
            mutation(
                "unsubscribeFrom",
                MutationOp::UnsubscribeFrom,
                None,
                vec![uuid("userId"), uuid("authorId")],
            ),
        ];

        Self {
            entities: entities.into_iter().map(|d| (d.kind, d)).collect(),
            edges: edges.into_iter().map(|e| (e.id, e)).collect(),
            roots,
            mutations,
        }
    }
}

fn scalar(name: &'static str, kind: ScalarKind, read: fn(&Entity) -> Value) -> ScalarField {
    ScalarField { name, kind, read }
}

fn root(name: &'static str, kind: EntityKind, access: RootAccess) -> RootField {
    RootField { name, kind, access }
}

fn argument(name: &'static str, ty: ArgumentType) -> ArgumentDef {
    ArgumentDef { name, ty }
}

fn mutation(
    name: &'static str,
    op: MutationOp,
    returns: Option<EntityKind>,
    arguments: Vec<ArgumentDef>,
) -> MutationField {
    MutationField {
        name,
        op,
        returns,
        arguments,
    }
}

fn key_value(key: EntityKey) -> Value {
    Value::String(key.to_string())
}

fn optional_key<K: Into<EntityKey>>(key: Option<K>) -> Value {
    key.map_or(Value::Null, |key| key_value(key.into()))
}
