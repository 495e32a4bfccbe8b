//! Shared helpers for the PostgreSQL repositories

// ============================================================================
// SQL Column Constants
//
// SELECT column lists for each table, kept in one place so every query of a
// repository reads the same shape.
// ============================================================================

/// SQL columns for user queries
pub const USER_COLUMNS: &str = "id, name, balance";

/// SQL columns for post queries
pub const POST_COLUMNS: &str = "id, title, content, author_id";

/// SQL columns for profile queries
pub const PROFILE_COLUMNS: &str = "id, is_male, year_of_birth, user_id, member_type_id";

/// SQL columns for member type queries
pub const MEMBER_TYPE_COLUMNS: &str = "id, discount, posts_limit_per_month";

/// Prefix every column of a column list with a table alias
///
/// # Example
/// ```
/// use blogroll_api::repositories::utils::qualify_columns;
///
/// assert_eq!(qualify_columns("u", "id, name"), "u.id, u.name");
/// ```
pub fn qualify_columns(alias: &str, columns: &str) -> String {
    columns
        .split(',')
        .map(|column| format!("{}.{}", alias, column.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}
