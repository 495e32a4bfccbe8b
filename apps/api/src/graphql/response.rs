//! Response shape of a query execution
//!
//! `data` mirrors the query's selection structure and is absent only when the
//! query was rejected; `errors` is always present and empty on success.

use async_graphql_parser::{Pos, Positioned};
use serde::Serialize;
use serde_json::Value;

use super::error::{codes, FieldError, ValidationError};

/// One step of a path into the response tree
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

pub type ResponsePath = Vec<PathSegment>;

/// Extend a path by one segment
pub(crate) fn child_path(path: &[PathSegment], segment: PathSegment) -> ResponsePath {
    let mut child = Vec::with_capacity(path.len() + 1);
    child.extend_from_slice(path);
    child.push(segment);
    child
}

/// Line/column of a node in the query text (1-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl From<Pos> for Location {
    fn from(pos: Pos) -> Self {
        Self {
            line: pos.line,
            column: pos.column,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorExtensions {
    pub code: &'static str,
}

/// An entry of the response's `errors` list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionError {
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<ResponsePath>,
    pub extensions: ErrorExtensions,
}

impl ExecutionError {
    pub fn code(&self) -> &'static str {
        self.extensions.code
    }

    /// Error scoped to one output position
    pub fn field(error: &FieldError, path: ResponsePath, pos: Pos) -> Self {
        Self {
            message: error.to_string(),
            locations: vec![pos.into()],
            path: Some(path),
            extensions: ErrorExtensions {
                code: error.error_code(),
            },
        }
    }

    /// Error rejecting the whole query
    pub fn validation(error: &ValidationError, pos: Option<Pos>) -> Self {
        Self {
            message: error.to_string(),
            locations: pos.map(Location::from).into_iter().collect(),
            path: None,
            extensions: ErrorExtensions {
                code: error.error_code(),
            },
        }
    }
}

impl From<Positioned<ValidationError>> for ExecutionError {
    fn from(error: Positioned<ValidationError>) -> Self {
        Self::validation(&error.node, Some(error.pos))
    }
}

impl From<ValidationError> for ExecutionError {
    fn from(error: ValidationError) -> Self {
        Self::validation(&error, None)
    }
}

/// Result of one execution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub errors: Vec<ExecutionError>,
}

impl ExecutionResponse {
    /// Response for a query that was (partially) executed
    pub fn new(data: Value, mut errors: Vec<ExecutionError>) -> Self {
        // resolution order is not deterministic, output order is
        errors.sort_by(|a, b| a.path.cmp(&b.path));
        Self {
            data: Some(data),
            errors,
        }
    }

    /// Response for a query that was not executed at all
    pub fn rejected<E>(errors: impl IntoIterator<Item = E>) -> Self
    where
        E: Into<ExecutionError>,
    {
        Self {
            data: None,
            errors: errors.into_iter().map(Into::into).collect(),
        }
    }

    /// Response for an execution aborted by its caller
    pub fn cancelled() -> Self {
        Self {
            data: None,
            errors: vec![ExecutionError {
                message: FieldError::Cancelled.to_string(),
                locations: Vec::new(),
                path: None,
                extensions: ErrorExtensions {
                    code: codes::CANCELLED,
                },
            }],
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_error_code(&self, code: &str) -> bool {
        self.errors.iter().any(|error| error.code() == code)
    }

    /// Follow a dotted path (`"user.posts.0.title"`) into `data`
    pub fn pointer(&self, path: &str) -> Option<&Value> {
        let pointer = format!("/{}", path.replace('.', "/"));
        self.data.as_ref()?.pointer(&pointer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rejected_response_omits_data() {
        let response = ExecutionResponse::rejected([ValidationError::OperationNameRequired]);
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("data").is_none());
        assert_eq!(json["errors"][0]["extensions"]["code"], "VALIDATION_ERROR");
    }

    #[test]
    fn test_successful_response_has_empty_errors() {
        let response = ExecutionResponse::new(json!({"users": []}), Vec::new());
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json, json!({"data": {"users": []}, "errors": []}));
        assert!(response.is_ok());
    }

    #[test]
    fn test_path_serializes_fields_and_indices() {
        let error = ExecutionError::field(
            &FieldError::Cancelled,
            vec![
                PathSegment::Field("users".into()),
                PathSegment::Index(2),
                PathSegment::Field("profile".into()),
            ],
            Pos { line: 1, column: 9 },
        );
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["path"], json!(["users", 2, "profile"]));
        assert_eq!(json["locations"], json!([{"line": 1, "column": 9}]));
    }

    #[test]
    fn test_errors_are_ordered_by_path() {
        let at = |index| {
            ExecutionError::field(
                &FieldError::Cancelled,
                vec![PathSegment::Field("users".into()), PathSegment::Index(index)],
                Pos { line: 1, column: 1 },
            )
        };
        let response = ExecutionResponse::new(Value::Null, vec![at(3), at(1)]);
        assert_eq!(
            response.errors[0].path.as_ref().unwrap()[1],
            PathSegment::Index(1)
        );
    }

    #[test]
    fn test_pointer() {
        let response = ExecutionResponse::new(json!({"user": {"posts": [{"id": "a"}]}}), vec![]);
        assert_eq!(response.pointer("user.posts.0.id"), Some(&json!("a")));
        assert_eq!(response.pointer("user.profile"), None);
    }
}
