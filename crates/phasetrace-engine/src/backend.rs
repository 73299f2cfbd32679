//! Collaborator traits driven by the orchestrator.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::ast::Document;
use crate::resolver::Middleware;
use crate::result::{Execution, Location, ValidationError};
use crate::schema::Schema;

/// Malformed query text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Syntax Error: {message} ({}:{})", .location.line, .location.column)]
pub struct SyntaxError {
    pub message: String,
    pub location: Location,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, location: Location) -> Self {
        Self {
            message: message.into(),
            location,
        }
    }
}

impl From<SyntaxError> for phasetrace_core::Error {
    fn from(err: SyntaxError) -> Self {
        phasetrace_core::Error::Syntax {
            message: err.message,
            line: err.location.line,
            column: err.location.column,
        }
    }
}

/// Turns query text into a [`Document`].
pub trait Parser: Send + Sync {
    fn parse(&self, source: &str) -> Result<Document, SyntaxError>;

    /// Render a document back to query text.
    fn print(&self, document: &Document) -> String;
}

/// Checks a document against a schema. An empty list means valid.
pub trait Validator: Send + Sync {
    fn validate(&self, schema: &Schema, document: &Document) -> Vec<ValidationError>;
}

/// Walks a document against a schema, invoking resolvers through the
/// middleware chain in `options`.
///
/// Resolver errors are collected into the result, never raised.
pub trait ExecutionEngine: Send + Sync {
    fn execute(
        &self,
        schema: Arc<Schema>,
        document: Arc<Document>,
        options: ExecuteOptions,
    ) -> Execution;
}

/// Per-request execution options.
#[derive(Clone)]
pub struct ExecuteOptions {
    /// Run validation before execution.
    pub validate: bool,
    /// Per-field hooks, outermost first.
    pub middleware: Vec<Arc<dyn Middleware>>,
    /// Parent value handed to root field resolvers.
    pub root_value: Value,
    pub operation_name: Option<String>,
}

impl ExecuteOptions {
    pub fn new() -> Self {
        Self {
            validate: true,
            middleware: Vec::new(),
            root_value: Value::Null,
            operation_name: None,
        }
    }

    pub fn without_validation(mut self) -> Self {
        self.validate = false;
        self
    }

    pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    pub fn with_root_value(mut self, root_value: Value) -> Self {
        self.root_value = root_value;
        self
    }

    pub fn with_operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ExecuteOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecuteOptions")
            .field("validate", &self.validate)
            .field("middleware", &self.middleware.len())
            .field("root_value", &self.root_value)
            .field("operation_name", &self.operation_name)
            .finish()
    }
}
