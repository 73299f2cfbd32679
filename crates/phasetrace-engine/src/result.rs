//! Execution results and query errors.

use std::fmt;

use futures::future::{BoxFuture, FutureExt};
use phasetrace_core::{PathSegment, TraceError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Line and column in the query text, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// An error reported in `ExecutionResult.errors`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<PathSegment>>,
}

/// Error raised by a resolver; the engine fills in its path.
pub type FieldError = QueryError;

/// Error produced by the validator.
pub type ValidationError = QueryError;

impl QueryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: Vec::new(),
            path: None,
        }
    }

    pub fn at(mut self, location: Location) -> Self {
        self.locations.push(location);
        self
    }

    pub fn with_path(mut self, path: Vec<PathSegment>) -> Self {
        self.path = Some(path);
        self
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for QueryError {}

impl From<&str> for QueryError {
    fn from(message: &str) -> Self {
        QueryError::new(message)
    }
}

impl From<String> for QueryError {
    fn from(message: String) -> Self {
        QueryError::new(message)
    }
}

/// Outcome of running a query.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<QueryError>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub extensions: Map<String, Value>,
    /// Set when validation short-circuited execution.
    #[serde(skip)]
    pub invalid: bool,
    /// Set when the tracing layer failed to render its report.
    #[serde(skip)]
    pub trace_error: Option<TraceError>,
}

impl ExecutionResult {
    pub fn new(data: Value, errors: Vec<QueryError>) -> Self {
        Self {
            data: Some(data),
            errors,
            ..Default::default()
        }
    }

    /// Result of a query rejected by validation.
    pub fn invalid(errors: Vec<ValidationError>) -> Self {
        Self {
            errors,
            invalid: true,
            ..Default::default()
        }
    }

    pub fn is_ok(&self) -> bool {
        !self.invalid && self.errors.is_empty()
    }

    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// An execution that has either finished or will finish later.
pub enum Execution {
    Ready(ExecutionResult),
    Pending(BoxFuture<'static, ExecutionResult>),
}

impl Execution {
    pub fn is_pending(&self) -> bool {
        matches!(self, Execution::Pending(_))
    }

    /// Apply `f` to the settled result, immediately or once it settles.
    pub fn map<F>(self, f: F) -> Execution
    where
        F: FnOnce(ExecutionResult) -> ExecutionResult + Send + 'static,
    {
        match self {
            Execution::Ready(result) => Execution::Ready(f(result)),
            Execution::Pending(pending) => Execution::Pending(pending.map(f).boxed()),
        }
    }

    /// Wait for the result.
    pub async fn resolve(self) -> ExecutionResult {
        match self {
            Execution::Ready(result) => result,
            Execution::Pending(pending) => pending.await,
        }
    }

    /// The result if it was produced synchronously.
    pub fn into_ready(self) -> Option<ExecutionResult> {
        match self {
            Execution::Ready(result) => Some(result),
            Execution::Pending(_) => None,
        }
    }
}

impl fmt::Debug for Execution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Execution::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            Execution::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_omits_empty_members() {
        let result = ExecutionResult::new(json!({"hello": "World"}), vec![]);
        assert_eq!(result.to_json().unwrap(), json!({"data": {"hello": "World"}}));
    }

    #[test]
    fn test_invalid_result_has_no_data() {
        let result = ExecutionResult::invalid(vec![QueryError::new("nope").at(Location::new(1, 3))]);
        assert!(result.invalid);
        assert!(!result.is_ok());
        assert_eq!(
            result.to_json().unwrap(),
            json!({"errors": [{"message": "nope", "locations": [{"line": 1, "column": 3}]}]})
        );
    }

    #[tokio::test]
    async fn test_map_applies_after_settlement() {
        let pending = Execution::Pending(
            async { ExecutionResult::new(json!(1), vec![]) }.boxed(),
        );
        let mapped = pending.map(|mut result| {
            result.extensions.insert("seen".to_string(), json!(true));
            result
        });
        assert!(mapped.is_pending());
        let result = mapped.resolve().await;
        assert_eq!(result.extensions["seen"], json!(true));
    }
}
