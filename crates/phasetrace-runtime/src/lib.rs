//! Traced query execution for phasetrace.
//!
//! This crate provides:
//! - The phase tracer that records one request's lifecycle timestamps
//! - The resolver timer installed as a per-field middleware
//! - The executor that sequences parse, validate and execute
//! - Executor configuration

pub mod config;
pub mod executor;
pub mod timer;
pub mod tracer;

pub use config::ExecutorConfig;
pub use executor::{DocumentSource, Executor, PreparedDocument};
pub use timer::ResolverTimer;
pub use tracer::{Instrumentation, NoOpTracer, NoTracing, PhaseTracer, TracerFactory, Tracing};
