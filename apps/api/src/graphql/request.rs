//! Inbound query request

use async_graphql::Variables;
use tokio_util::sync::CancellationToken;

/// A query to execute: text, optional operation name and variables
#[derive(Debug, Clone, Default)]
pub struct ExecutionRequest {
    pub query: String,
    pub operation_name: Option<String>,
    pub variables: Variables,
    /// Aborts the execution when cancelled
    pub cancel: Option<CancellationToken>,
}

impl ExecutionRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    /// Select which operation of the document to run
    pub fn operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    pub fn variables(mut self, variables: Variables) -> Self {
        self.variables = variables;
        self
    }

    /// Abandon the execution once `token` is cancelled
    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

impl From<async_graphql::Request> for ExecutionRequest {
    fn from(request: async_graphql::Request) -> Self {
        Self {
            query: request.query,
            operation_name: request.operation_name,
            variables: request.variables,
            cancel: None,
        }
    }
}

impl From<&str> for ExecutionRequest {
    fn from(query: &str) -> Self {
        Self::new(query)
    }
}

impl From<String> for ExecutionRequest {
    fn from(query: String) -> Self {
        Self::new(query)
    }
}
