//! Data access layer for Blogroll
//!
//! The query engine reads through the [`Fetcher`] trait and writes through
//! [`Mutator`]. Two implementations of both live here:
//! - [`PgFetcher`]: PostgreSQL, composed of the per-table repositories
//! - [`MemoryStore`]: in-process tables for tests and the `memory` backend

pub mod fetcher;
pub mod member_type;
pub mod memory;
pub mod mutator;
pub mod post;
pub mod postgres;
pub mod profile;
pub mod subscription;
pub mod user;
pub mod utils;

pub use fetcher::{FetchError, FetchResult, Fetcher, KeyedEntities};
pub use member_type::MemberTypeRepository;
pub use memory::{FetchCall, MemoryStore};
pub use mutator::{Mutator, Write, WriteOutcome};
pub use post::PostRepository;
pub use postgres::PgFetcher;
pub use profile::ProfileRepository;
pub use subscription::SubscriptionRepository;
pub use user::UserRepository;
