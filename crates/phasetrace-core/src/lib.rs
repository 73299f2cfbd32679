//! Core types and report assembly for phasetrace.
//!
//! This crate defines the data shared by every phasetrace crate: the
//! injected clock, the per-request [`TraceSession`] with its resolver
//! records, the rendered [`TraceReport`] and the error taxonomy. The only
//! logic it carries is the pure session-to-report transformation in
//! [`report`].

pub mod clock;
pub mod error;
pub mod report;
pub mod trace;

pub use clock::{Clock, ManualClock, SystemClock, Timestamp};
pub use error::{Error, Result, TraceError};
pub use report::{ExecutionTiming, PhaseTiming, ReportBuilder, TraceReport, REPORT_VERSION};
pub use trace::{PathSegment, Phase, ResolverRecord, TraceSession};
