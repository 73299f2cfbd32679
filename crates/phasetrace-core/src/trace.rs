//! Trace session types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;
use crate::error::TraceError;

/// The timed stages that precede execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Parsing,
    Validation,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Parsing => f.write_str("parsing"),
            Phase::Validation => f.write_str("validation"),
        }
    }
}

/// One segment of a field's position in the response tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(s: &str) -> Self {
        PathSegment::Key(s.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(s: String) -> Self {
        PathSegment::Key(s)
    }
}

impl From<usize> for PathSegment {
    fn from(i: usize) -> Self {
        PathSegment::Index(i)
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => f.write_str(key),
            PathSegment::Index(index) => write!(f, "{index}"),
        }
    }
}

/// Timing of a single field-resolution invocation.
///
/// Serializes directly as a resolver entry of the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverRecord {
    pub path: Vec<PathSegment>,
    pub parent_type: String,
    pub field_name: String,
    pub return_type: String,
    /// Nanoseconds from session start to invocation start.
    pub start_offset: u64,
    /// Nanoseconds the invocation took to produce its value.
    pub duration: u64,
}

/// Snapshot of one request's trace.
///
/// Produced by the runtime's phase tracer and consumed by
/// [`ReportBuilder`](crate::report::ReportBuilder).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraceSession {
    pub start_time: Option<Timestamp>,
    pub end_time: Option<Timestamp>,
    /// Wall-clock time at `start_time`.
    pub wall_start: Option<DateTime<Utc>>,
    pub parsing_start: Option<Timestamp>,
    pub parsing_end: Option<Timestamp>,
    pub validation_start: Option<Timestamp>,
    pub validation_end: Option<Timestamp>,
    /// Append order, not tree order.
    pub resolver_records: Vec<ResolverRecord>,
}

impl TraceSession {
    pub fn start(&self) -> Result<Timestamp, TraceError> {
        self.start_time.ok_or(TraceError::NotStarted)
    }

    /// Total nanoseconds between start and end.
    pub fn duration(&self) -> Result<u64, TraceError> {
        let start = self.start()?;
        let end = self.end_time.ok_or(TraceError::NotFinished)?;
        end.duration_since(start)
    }

    pub fn is_finished(&self) -> bool {
        self.start_time.is_some() && self.end_time.is_some()
    }

    /// Offset of `at` from the session start.
    pub fn offset_of(&self, at: Timestamp) -> Result<u64, TraceError> {
        at.duration_since(self.start()?)
    }
}
