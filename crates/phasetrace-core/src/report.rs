//! Report assembly.
//!
//! Turns a finished [`TraceSession`] into the tracing document attached at
//! `extensions.tracing`. The transformation is pure: it never touches the
//! clock and never reorders, sorts or deduplicates resolver records.

use serde::{Deserialize, Serialize};

use crate::clock::nanos;
use crate::error::TraceError;
use crate::trace::{Phase, ResolverRecord, TraceSession};

pub const REPORT_VERSION: u32 = 1;

/// ISO-8601 UTC with microsecond precision.
const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Offset and duration of a phase, in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseTiming {
    pub start_offset: u64,
    pub duration: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionTiming {
    pub resolvers: Vec<ResolverRecord>,
}

/// Immutable rendering of a trace session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceReport {
    pub version: u32,
    pub start_time: String,
    pub end_time: String,
    pub duration: u64,
    pub parsing: PhaseTiming,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<PhaseTiming>,
    pub execution: ExecutionTiming,
}

impl TraceReport {
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// Renders trace reports from finished sessions.
pub struct ReportBuilder<'a> {
    session: &'a TraceSession,
}

impl<'a> ReportBuilder<'a> {
    pub fn new(session: &'a TraceSession) -> Self {
        Self { session }
    }

    /// Render the report.
    ///
    /// Fails with [`TraceError::NotFinished`] if the session was never ended
    /// and with [`TraceError::PhaseNotRecorded`] if parsing was not bracketed.
    pub fn build(&self) -> Result<TraceReport, TraceError> {
        let session = self.session;
        let duration = session.duration()?;
        let wall_start = session.wall_start.ok_or(TraceError::NotStarted)?;
        let wall_end = wall_start + nanos(duration);

        let parsing = match (session.parsing_start, session.parsing_end) {
            (Some(start), Some(end)) => PhaseTiming {
                start_offset: session.offset_of(start)?,
                duration: end.duration_since(start)?,
            },
            _ => return Err(TraceError::PhaseNotRecorded(Phase::Parsing)),
        };

        let validation = match (session.validation_start, session.validation_end) {
            (Some(start), Some(end)) => Some(PhaseTiming {
                start_offset: session.offset_of(start)?,
                duration: end.duration_since(start)?,
            }),
            _ => None,
        };

        Ok(TraceReport {
            version: REPORT_VERSION,
            start_time: wall_start.format(DATETIME_FORMAT).to_string(),
            end_time: wall_end.format(DATETIME_FORMAT).to_string(),
            duration,
            parsing,
            validation,
            execution: ExecutionTiming {
                resolvers: session.resolver_records.clone(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Timestamp;
    use chrono::{DateTime, Utc};

    fn record(field: &str, start_offset: u64, duration: u64) -> ResolverRecord {
        ResolverRecord {
            path: vec![field.into()],
            parent_type: "Query".to_string(),
            field_name: field.to_string(),
            return_type: "String".to_string(),
            start_offset,
            duration,
        }
    }

    fn finished_session() -> TraceSession {
        TraceSession {
            start_time: Some(Timestamp(1_000)),
            end_time: Some(Timestamp(9_000)),
            wall_start: Some(DateTime::<Utc>::UNIX_EPOCH),
            parsing_start: Some(Timestamp(1_100)),
            parsing_end: Some(Timestamp(1_600)),
            validation_start: Some(Timestamp(2_000)),
            validation_end: Some(Timestamp(2_500)),
            resolver_records: vec![record("b", 4_000, 100), record("a", 3_000, 200)],
        }
    }

    #[test]
    fn test_build_complete_report() {
        let report = ReportBuilder::new(&finished_session()).build().unwrap();

        assert_eq!(report.version, 1);
        assert_eq!(report.duration, 8_000);
        assert_eq!(report.start_time, "1970-01-01T00:00:00.000000Z");
        assert_eq!(report.end_time, "1970-01-01T00:00:00.000008Z");
        assert_eq!(
            report.parsing,
            PhaseTiming {
                start_offset: 100,
                duration: 500
            }
        );
        assert_eq!(
            report.validation,
            Some(PhaseTiming {
                start_offset: 1_000,
                duration: 500
            })
        );
    }

    #[test]
    fn test_resolvers_keep_append_order() {
        let report = ReportBuilder::new(&finished_session()).build().unwrap();
        let names: Vec<_> = report
            .execution
            .resolvers
            .iter()
            .map(|r| r.field_name.as_str())
            .collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_validation_block_omitted_when_half_recorded() {
        let mut session = finished_session();
        session.validation_end = None;
        let report = ReportBuilder::new(&session).build().unwrap();
        assert!(report.validation.is_none());

        let json = report.to_json().unwrap();
        assert!(json.get("validation").is_none());
        assert!(json.get("parsing").is_some());
    }

    #[test]
    fn test_unfinished_session_fails() {
        let mut session = finished_session();
        session.end_time = None;
        assert_eq!(
            ReportBuilder::new(&session).build(),
            Err(TraceError::NotFinished)
        );
    }

    #[test]
    fn test_missing_parsing_fails() {
        let mut session = finished_session();
        session.parsing_end = None;
        assert_eq!(
            ReportBuilder::new(&session).build(),
            Err(TraceError::PhaseNotRecorded(Phase::Parsing))
        );
    }

    #[test]
    fn test_oversized_duration_saturates_end_time() {
        let session = TraceSession {
            start_time: Some(Timestamp(0)),
            end_time: Some(Timestamp(u64::MAX)),
            wall_start: Some(DateTime::<Utc>::UNIX_EPOCH),
            parsing_start: Some(Timestamp(0)),
            parsing_end: Some(Timestamp(10)),
            ..Default::default()
        };
        let report = ReportBuilder::new(&session).build().unwrap();
        assert_eq!(report.duration, u64::MAX);
        // i64::MAX nanoseconds past the epoch
        assert_eq!(report.end_time, "2262-04-11T23:47:16.854775Z");
    }

    #[test]
    fn test_json_shape() {
        let json = ReportBuilder::new(&finished_session())
            .build()
            .unwrap()
            .to_json()
            .unwrap();
        assert_eq!(json["parsing"]["startOffset"], 100);
        assert_eq!(json["validation"]["duration"], 500);
        assert_eq!(json["execution"]["resolvers"][1]["fieldName"], "a");
        assert_eq!(json["startTime"], "1970-01-01T00:00:00.000000Z");
    }
}
