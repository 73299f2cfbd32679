//! Collaborator interfaces for phasetrace.
//!
//! This crate defines the three services the orchestrator drives (the
//! [`Parser`], the [`Validator`] and the [`ExecutionEngine`]) together with
//! the values that flow between them. The [`native`] module provides a small
//! reference implementation of all three.

pub mod ast;
pub mod backend;
pub mod native;
pub mod resolver;
pub mod result;
pub mod schema;

pub use ast::{Document, Field, OperationDefinition, SelectionSet};
pub use backend::{ExecuteOptions, ExecutionEngine, Parser, SyntaxError, Validator};
pub use native::{NativeEngine, NativeParser, NativeValidator};
pub use resolver::{
    AsyncFnResolver, FieldResult, FnResolver, Middleware, Next, PropertyResolver, ResolveInfo,
    Resolved, Resolver,
};
pub use result::{Execution, ExecutionResult, FieldError, Location, QueryError, ValidationError};
pub use schema::{FieldDefinition, ObjectType, Schema, TypeRef};
