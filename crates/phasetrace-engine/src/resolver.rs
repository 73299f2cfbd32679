//! Field resolvers and the per-field middleware chain.

use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use phasetrace_core::PathSegment;
use serde_json::{Map, Value};

use crate::result::FieldError;
use crate::schema::TypeRef;

pub type FieldResult = Result<Value, FieldError>;

/// Value produced by a resolver: settled now, or settling later.
pub enum Resolved {
    Ready(FieldResult),
    Pending(BoxFuture<'static, FieldResult>),
}

impl Resolved {
    pub fn value(value: impl Into<Value>) -> Self {
        Resolved::Ready(Ok(value.into()))
    }

    pub fn error(error: impl Into<FieldError>) -> Self {
        Resolved::Ready(Err(error.into()))
    }

    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = FieldResult> + Send + 'static,
    {
        Resolved::Pending(future.boxed())
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Resolved::Pending(_))
    }

    pub fn into_future(self) -> BoxFuture<'static, FieldResult> {
        match self {
            Resolved::Ready(result) => futures::future::ready(result).boxed(),
            Resolved::Pending(pending) => pending,
        }
    }
}

impl std::fmt::Debug for Resolved {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resolved::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            Resolved::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

/// Schema location and inputs of one field-resolution invocation.
#[derive(Debug, Clone)]
pub struct ResolveInfo {
    pub path: Vec<PathSegment>,
    pub parent_type: String,
    pub field_name: String,
    pub return_type: TypeRef,
    pub parent_value: Value,
    pub arguments: Map<String, Value>,
}

impl ResolveInfo {
    pub fn argument(&self, name: &str) -> Option<&Value> {
        self.arguments.get(name)
    }
}

/// Produces the value of one field.
pub trait Resolver: Send + Sync {
    fn resolve(&self, info: &ResolveInfo) -> Resolved;
}

/// Resolver backed by a synchronous closure.
pub struct FnResolver<F>(pub F);

impl<F> Resolver for FnResolver<F>
where
    F: Fn(&ResolveInfo) -> FieldResult + Send + Sync,
{
    fn resolve(&self, info: &ResolveInfo) -> Resolved {
        Resolved::Ready((self.0)(info))
    }
}

/// Resolver backed by a closure returning a future.
pub struct AsyncFnResolver<F>(pub F);

impl<F, Fut> Resolver for AsyncFnResolver<F>
where
    F: Fn(&ResolveInfo) -> Fut + Send + Sync,
    Fut: Future<Output = FieldResult> + Send + 'static,
{
    fn resolve(&self, info: &ResolveInfo) -> Resolved {
        Resolved::pending((self.0)(info))
    }
}

/// Reads the field from the parent object. Used when a field has no resolver.
#[derive(Debug, Clone, Copy, Default)]
pub struct PropertyResolver;

impl Resolver for PropertyResolver {
    fn resolve(&self, info: &ResolveInfo) -> Resolved {
        let value = info
            .parent_value
            .get(&info.field_name)
            .cloned()
            .unwrap_or(Value::Null);
        Resolved::value(value)
    }
}

/// Per-field instrumentation hook.
///
/// A middleware wraps the rest of the chain: it may act before and after
/// calling [`Next::run`], and must return what the chain produced unless it
/// deliberately replaces it.
pub trait Middleware: Send + Sync {
    fn resolve(&self, info: &ResolveInfo, next: Next<'_>) -> Resolved;
}

/// The remainder of a middleware chain, ending in the field's resolver.
pub struct Next<'a> {
    middleware: &'a [Arc<dyn Middleware>],
    resolver: &'a dyn Resolver,
}

impl<'a> Next<'a> {
    pub fn new(middleware: &'a [Arc<dyn Middleware>], resolver: &'a dyn Resolver) -> Self {
        Self {
            middleware,
            resolver,
        }
    }

    pub fn run(self, info: &ResolveInfo) -> Resolved {
        match self.middleware.split_first() {
            Some((head, rest)) => head.resolve(info, Next::new(rest, self.resolver)),
            None => self.resolver.resolve(info),
        }
    }
}
