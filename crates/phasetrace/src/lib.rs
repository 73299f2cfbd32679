//! Phasetrace: per-phase and per-resolver timing for GraphQL-style queries.
//!
//! This is the main entry point for user applications. It re-exports the
//! report model, the engine interfaces and the traced executor.

pub use phasetrace_core as core;
pub use phasetrace_engine as engine;

pub use phasetrace_runtime::{
    DocumentSource, Executor, ExecutorConfig, NoTracing, PhaseTracer, PreparedDocument,
    ResolverTimer, TracerFactory, Tracing,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::{
        Clock, Error, ManualClock, PathSegment, ResolverRecord, Result, SystemClock, Timestamp,
        TraceError, TraceReport,
    };

    pub use crate::engine::{
        ExecuteOptions, Execution, ExecutionResult, FieldDefinition, FieldError, FieldResult,
        Middleware, Next, ObjectType, ResolveInfo, Resolved, Schema, TypeRef,
    };

    pub use crate::{DocumentSource, Executor, ExecutorConfig, PreparedDocument};
}
