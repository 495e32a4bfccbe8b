//! Query error taxonomy
//!
//! - [`ValidationError`]: the query is rejected before any resolution starts
//!   and the response carries no data.
//! - [`FieldError`]: a single output position failed; siblings still resolve.

use std::sync::Arc;

use thiserror::Error;

use crate::models::{EntityKey, EntityKind};
use crate::repositories::FetchError;

/// Stable error codes surfaced as `extensions.code`
pub mod codes {
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const FETCH_FAILURE: &str = "FETCH_FAILURE";
    pub const WRITE_FAILURE: &str = "WRITE_FAILURE";
    pub const CANCELLED: &str = "CANCELLED";
}

/// Reasons a query is rejected as a whole
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("{0} operations are not supported")]
    UnsupportedOperation(&'static str),

    #[error("unknown operation named \"{0}\"")]
    UnknownOperation(String),

    #[error("operation name required in request")]
    OperationNameRequired,

    #[error("Cannot query field \"{field}\" on type \"{type_name}\"")]
    UnknownField {
        type_name: &'static str,
        field: String,
    },

    #[error("Unknown argument \"{argument}\" on field \"{type_name}.{field}\"")]
    UnknownArgument {
        type_name: &'static str,
        field: String,
        argument: String,
    },

    #[error("Field \"{field}\" argument \"{argument}\" of type \"{type_name}!\" is required")]
    MissingArgument {
        field: String,
        argument: &'static str,
        type_name: &'static str,
    },

    #[error("Invalid value for argument \"{argument}\" of field \"{field}\": {reason}")]
    InvalidArgument {
        field: String,
        argument: String,
        reason: String,
    },

    #[error("Variable \"${0}\" is not defined")]
    UndefinedVariable(String),

    #[error("Variable \"${variable}\" of type \"{declared}\" used in position expecting type \"{expected}\"")]
    VariableTypeMismatch {
        variable: String,
        declared: String,
        expected: &'static str,
    },

    #[error("Unknown fragment \"{0}\"")]
    UnknownFragment(String),

    #[error("Cannot spread fragment \"{0}\" within itself")]
    FragmentCycle(String),

    #[error("Fragment cannot be spread here as objects of type \"{type_name}\" can never be of type \"{condition}\"")]
    TypeConditionMismatch {
        condition: String,
        type_name: &'static str,
    },

    #[error("Field \"{field}\" of type \"{type_name}\" must have a selection of subfields")]
    MissingSelection {
        field: String,
        type_name: &'static str,
    },

    #[error("Field \"{field}\" must not have a selection since type \"{type_name}\" has no subfields")]
    UnexpectedSelection {
        field: String,
        type_name: &'static str,
    },

    #[error("Fields \"{0}\" conflict because they select different fields or arguments")]
    FieldConflict(String),

    #[error("'{operation}' exceeds maximum operation depth of {max_depth}")]
    DepthExceeded { operation: String, max_depth: usize },
}

impl ValidationError {
    pub fn error_code(&self) -> &'static str {
        codes::VALIDATION_ERROR
    }
}

/// Failure of one output position
#[derive(Error, Debug, Clone)]
pub enum FieldError {
    /// A required-existence lookup had no match
    #[error("{kind} not found: {key}")]
    NotFound { kind: EntityKind, key: EntityKey },

    /// The backing fetch feeding this position failed
    #[error("failed to load {target}: {source}")]
    Fetch {
        target: String,
        source: Arc<FetchError>,
    },

    /// The backing store refused or failed a mutation's write
    #[error("{mutation} failed: {source}")]
    Write {
        mutation: &'static str,
        source: Arc<FetchError>,
    },

    /// The execution was aborted before this position settled
    #[error("query execution was cancelled")]
    Cancelled,
}

impl FieldError {
    pub fn not_found(kind: EntityKind, key: EntityKey) -> Self {
        Self::NotFound { kind, key }
    }

    pub fn fetch(target: impl Into<String>, source: impl Into<Arc<FetchError>>) -> Self {
        Self::Fetch {
            target: target.into(),
            source: source.into(),
        }
    }

    pub fn write(mutation: &'static str, source: FetchError) -> Self {
        Self::Write {
            mutation,
            source: Arc::new(source),
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => codes::NOT_FOUND,
            Self::Fetch { .. } => codes::FETCH_FAILURE,
            Self::Write { .. } => codes::WRITE_FAILURE,
            Self::Cancelled => codes::CANCELLED,
        }
    }

    /// Log the error with a severity matching its kind
    pub fn log(&self) {
        match self {
            Self::Fetch { .. } => tracing::warn!(error = %self, code = self.error_code(), "Field fetch failed"),
            Self::Write { .. } => tracing::warn!(error = %self, code = self.error_code(), "Mutation write failed"),
            Self::NotFound { .. } | Self::Cancelled => {
                tracing::debug!(error = %self, code = self.error_code(), "Field resolution error")
            }
        }
    }
}
