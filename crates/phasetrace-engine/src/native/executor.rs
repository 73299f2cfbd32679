use std::sync::Arc;

use futures::future::{self, BoxFuture, FutureExt};
use parking_lot::Mutex;
use phasetrace_core::PathSegment;
use serde_json::{Map, Value};
use tracing::debug;

use crate::ast::{Document, Field, SelectionSet};
use crate::backend::{ExecuteOptions, ExecutionEngine};
use crate::resolver::{FieldResult, Middleware, Next, PropertyResolver, ResolveInfo, Resolved, Resolver};
use crate::result::{Execution, ExecutionResult, QueryError};
use crate::schema::{ObjectType, Schema, TypeRef};

/// Executes query operations against a [`Schema`].
///
/// Every resolver of a selection set is invoked before any of them is
/// awaited, so asynchronous fields of one object settle concurrently. The
/// result is [`Execution::Ready`] when every resolver settled synchronously.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeEngine;

impl ExecutionEngine for NativeEngine {
    fn execute(
        &self,
        schema: Arc<Schema>,
        document: Arc<Document>,
        options: ExecuteOptions,
    ) -> Execution {
        let Some(operation) = document.operation(options.operation_name.as_deref()) else {
            let message = match &options.operation_name {
                Some(name) => format!("Unknown operation named \"{name}\"."),
                None => "Must provide operation name if query contains multiple operations."
                    .to_string(),
            };
            return Execution::Ready(ExecutionResult {
                errors: vec![QueryError::new(message)],
                ..Default::default()
            });
        };

        debug!(
            operation = operation.name.as_deref().unwrap_or("<anonymous>"),
            middleware = options.middleware.len(),
            "executing operation"
        );

        let ctx = Arc::new(ExecutionContext {
            schema: schema.clone(),
            middleware: options.middleware,
            errors: Mutex::new(Vec::new()),
        });

        match execute_selection(
            &ctx,
            schema.query_type(),
            &operation.selection_set,
            &options.root_value,
            &[],
        ) {
            Completed::Ready(data) => Execution::Ready(ctx.finish(data)),
            Completed::Pending(pending) => Execution::Pending(
                async move {
                    let data = pending.await;
                    ctx.finish(data)
                }
                .boxed(),
            ),
        }
    }
}

struct ExecutionContext {
    schema: Arc<Schema>,
    middleware: Vec<Arc<dyn Middleware>>,
    errors: Mutex<Vec<QueryError>>,
}

impl ExecutionContext {
    fn record(&self, error: QueryError) {
        self.errors.lock().push(error);
    }

    fn finish(&self, data: Value) -> ExecutionResult {
        ExecutionResult::new(data, std::mem::take(&mut *self.errors.lock()))
    }
}

/// A completed value, possibly still waiting on pending resolvers.
enum Completed {
    Ready(Value),
    Pending(BoxFuture<'static, Value>),
}

impl Completed {
    fn is_ready(&self) -> bool {
        matches!(self, Completed::Ready(_))
    }

    fn into_future(self) -> BoxFuture<'static, Value> {
        match self {
            Completed::Ready(value) => future::ready(value).boxed(),
            Completed::Pending(pending) => pending,
        }
    }
}

fn execute_selection(
    ctx: &Arc<ExecutionContext>,
    parent: &ObjectType,
    selection_set: &SelectionSet,
    parent_value: &Value,
    path: &[PathSegment],
) -> Completed {
    let entries = selection_set
        .fields
        .iter()
        .map(|field| {
            let key = field.response_key().to_string();
            let mut field_path = path.to_vec();
            field_path.push(PathSegment::Key(key.clone()));
            (key, execute_field(ctx, parent, field, parent_value, field_path))
        })
        .collect();
    collect_object(entries)
}

fn execute_field(
    ctx: &Arc<ExecutionContext>,
    parent: &ObjectType,
    field: &Field,
    parent_value: &Value,
    path: Vec<PathSegment>,
) -> Completed {
    let Some(definition) = parent.get(&field.name) else {
        ctx.record(
            QueryError::new(format!(
                "Cannot query field \"{}\" on type \"{}\".",
                field.name, parent.name
            ))
            .at(field.location)
            .with_path(path),
        );
        return Completed::Ready(Value::Null);
    };

    let info = ResolveInfo {
        path: path.clone(),
        parent_type: parent.name.clone(),
        field_name: field.name.clone(),
        return_type: definition.ty.clone(),
        parent_value: parent_value.clone(),
        arguments: field.arguments.clone(),
    };
    let fallback: &dyn Resolver = &PropertyResolver;
    let resolver = definition.resolver.as_deref().unwrap_or(fallback);

    match Next::new(&ctx.middleware, resolver).run(&info) {
        Resolved::Ready(result) => complete_value(ctx, &definition.ty, field, result, path),
        Resolved::Pending(pending) => {
            let ctx = ctx.clone();
            let ty = definition.ty.clone();
            let field = field.clone();
            Completed::Pending(
                async move {
                    let result = pending.await;
                    complete_value(&ctx, &ty, &field, result, path)
                        .into_future()
                        .await
                }
                .boxed(),
            )
        }
    }
}

fn complete_value(
    ctx: &Arc<ExecutionContext>,
    ty: &TypeRef,
    field: &Field,
    result: FieldResult,
    path: Vec<PathSegment>,
) -> Completed {
    let value = match result {
        Ok(value) => value,
        Err(error) => {
            ctx.record(error.at(field.location).with_path(path));
            return Completed::Ready(Value::Null);
        }
    };

    match ty {
        TypeRef::NonNull(inner) => {
            if value.is_null() {
                ctx.record(
                    QueryError::new(format!(
                        "Cannot return null for non-nullable field \"{}\".",
                        field.name
                    ))
                    .at(field.location)
                    .with_path(path),
                );
                return Completed::Ready(Value::Null);
            }
            complete_value(ctx, inner, field, Ok(value), path)
        }
        _ if value.is_null() => Completed::Ready(Value::Null),
        TypeRef::List(inner) => match value {
            Value::Array(items) => {
                let entries = items
                    .into_iter()
                    .enumerate()
                    .map(|(index, item)| {
                        let mut item_path = path.clone();
                        item_path.push(PathSegment::Index(index));
                        complete_value(ctx, inner, field, Ok(item), item_path)
                    })
                    .collect();
                collect_list(entries)
            }
            _ => {
                ctx.record(
                    QueryError::new(format!(
                        "Expected a list for field \"{}\" of type \"{}\".",
                        field.name, ty
                    ))
                    .at(field.location)
                    .with_path(path),
                );
                Completed::Ready(Value::Null)
            }
        },
        TypeRef::Named(name) => match ctx.schema.object(name) {
            Some(object) => execute_selection(ctx, object, &field.selection_set, &value, &path),
            None => Completed::Ready(value),
        },
    }
}

fn collect_object(entries: Vec<(String, Completed)>) -> Completed {
    if entries.iter().all(|(_, completed)| completed.is_ready()) {
        let object = entries
            .into_iter()
            .map(|(key, completed)| match completed {
                Completed::Ready(value) => (key, value),
                Completed::Pending(_) => (key, Value::Null),
            })
            .collect::<Map<String, Value>>();
        return Completed::Ready(Value::Object(object));
    }

    let (keys, pending): (Vec<_>, Vec<_>) = entries
        .into_iter()
        .map(|(key, completed)| (key, completed.into_future()))
        .unzip();
    Completed::Pending(
        async move {
            let values = future::join_all(pending).await;
            Value::Object(keys.into_iter().zip(values).collect())
        }
        .boxed(),
    )
}

fn collect_list(entries: Vec<Completed>) -> Completed {
    if entries.iter().all(Completed::is_ready) {
        let items = entries
            .into_iter()
            .map(|completed| match completed {
                Completed::Ready(value) => value,
                Completed::Pending(_) => Value::Null,
            })
            .collect();
        return Completed::Ready(Value::Array(items));
    }

    let pending: Vec<_> = entries.into_iter().map(Completed::into_future).collect();
    Completed::Pending(async move { Value::Array(future::join_all(pending).await) }.boxed())
}
