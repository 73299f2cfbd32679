//! Phase tracing for a single request.
//!
//! [`Instrumentation`] is the capability set the executor drives. It has two
//! variants, chosen once when the executor is built through its
//! [`TracerFactory`]: [`PhaseTracer`], which records everything, and
//! [`NoOpTracer`], whose every operation is a pass-through.

use std::sync::Arc;

use parking_lot::Mutex;
use phasetrace_core::{
    Clock, Phase, ReportBuilder, ResolverRecord, SystemClock, Timestamp, TraceError, TraceReport,
    TraceSession,
};
use phasetrace_engine::{Execution, ExecutionResult, Middleware};
use tracing::{debug, error, trace};

use crate::timer::ResolverTimer;

/// Key of the report in `ExecutionResult.extensions`.
pub const EXTENSION_KEY: &str = "tracing";

/// Lifecycle hooks the executor calls around each phase of one request.
pub trait Instrumentation: Send + Sync {
    fn start(&self);

    fn end(&self);

    fn phase_start(&self, phase: Phase);

    fn phase_end(&self, phase: Phase);

    /// Per-field hook to append to the engine's middleware, if any.
    fn resolver_hook(self: Arc<Self>) -> Option<Arc<dyn Middleware>>;

    /// End the session and attach the report once `execution` settles.
    fn attach(self: Arc<Self>, execution: Execution) -> Execution;

    /// Render the report; `None` when this variant records nothing.
    fn report(&self) -> Result<Option<TraceReport>, TraceError>;
}

/// Creates one [`Instrumentation`] per request.
pub trait TracerFactory: Send + Sync {
    fn create(&self) -> Arc<dyn Instrumentation>;
}

/// Tracing disabled: every request shares one [`NoOpTracer`].
#[derive(Debug, Clone, Default)]
pub struct NoTracing {
    tracer: Arc<NoOpTracer>,
}

impl TracerFactory for NoTracing {
    fn create(&self) -> Arc<dyn Instrumentation> {
        self.tracer.clone()
    }
}

/// Tracing enabled: every request gets a fresh [`PhaseTracer`].
#[derive(Debug, Clone)]
pub struct Tracing {
    clock: Arc<dyn Clock>,
}

impl Tracing {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Tracing on the process-wide [`SystemClock`].
    pub fn system() -> Self {
        Self::new(Arc::new(SystemClock::global().clone()))
    }
}

impl TracerFactory for Tracing {
    fn create(&self) -> Arc<dyn Instrumentation> {
        Arc::new(PhaseTracer::new(self.clock.clone()))
    }
}

/// Pass-through variant used when tracing is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpTracer;

impl Instrumentation for NoOpTracer {
    #[inline]
    fn start(&self) {}

    #[inline]
    fn end(&self) {}

    #[inline]
    fn phase_start(&self, _phase: Phase) {}

    #[inline]
    fn phase_end(&self, _phase: Phase) {}

    #[inline]
    fn resolver_hook(self: Arc<Self>) -> Option<Arc<dyn Middleware>> {
        None
    }

    #[inline]
    fn attach(self: Arc<Self>, execution: Execution) -> Execution {
        execution
    }

    fn report(&self) -> Result<Option<TraceReport>, TraceError> {
        Ok(None)
    }
}

#[derive(Debug, Default)]
struct Marks {
    start: Option<Timestamp>,
    end: Option<Timestamp>,
    wall_start: Option<chrono::DateTime<chrono::Utc>>,
    parsing_start: Option<Timestamp>,
    parsing_end: Option<Timestamp>,
    validation_start: Option<Timestamp>,
    validation_end: Option<Timestamp>,
}

#[derive(Debug, Clone, Copy)]
enum Boundary {
    Start,
    End,
}

/// Records the lifecycle timestamps and resolver timings of one request.
///
/// Lock order is `marks` before `records`.
#[derive(Debug)]
pub struct PhaseTracer {
    clock: Arc<dyn Clock>,
    marks: Mutex<Marks>,
    records: Mutex<Vec<ResolverRecord>>,
    failure: Mutex<Option<TraceError>>,
}

impl PhaseTracer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            marks: Mutex::new(Marks::default()),
            records: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
        }
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Reset every mark and record, then set the start time.
    ///
    /// Calling it again restarts the session.
    pub fn start(&self) {
        let now = self.clock.now();
        let mut marks = self.marks.lock();
        *marks = Marks {
            start: Some(now),
            wall_start: Some(self.clock.wall_time(now)),
            ..Marks::default()
        };
        self.records.lock().clear();
        *self.failure.lock() = None;
        debug!(start = %now, "trace session started");
    }

    pub fn end(&self) -> Result<(), TraceError> {
        let now = self.clock.now();
        let mut marks = self.marks.lock();
        let start = marks.start.ok_or(TraceError::NotStarted)?;
        if marks.end.is_some() {
            return Err(TraceError::AlreadyFinished);
        }
        let duration = now.duration_since(start)?;
        marks.end = Some(now);
        debug!(duration_ns = duration, "trace session ended");
        Ok(())
    }

    pub fn parsing_start(&self) -> Result<(), TraceError> {
        self.mark(Phase::Parsing, Boundary::Start)
    }

    pub fn parsing_end(&self) -> Result<(), TraceError> {
        self.mark(Phase::Parsing, Boundary::End)
    }

    pub fn validation_start(&self) -> Result<(), TraceError> {
        self.mark(Phase::Validation, Boundary::Start)
    }

    pub fn validation_end(&self) -> Result<(), TraceError> {
        self.mark(Phase::Validation, Boundary::End)
    }

    fn mark(&self, phase: Phase, boundary: Boundary) -> Result<(), TraceError> {
        let now = self.clock.now();
        let mut marks = self.marks.lock();
        let start = marks.start.ok_or(TraceError::NotStarted)?;
        if marks.end.is_some() {
            return Err(TraceError::AlreadyFinished);
        }
        let offset = now.duration_since(start)?;
        let slot = match (phase, boundary) {
            (Phase::Parsing, Boundary::Start) => &mut marks.parsing_start,
            (Phase::Parsing, Boundary::End) => &mut marks.parsing_end,
            (Phase::Validation, Boundary::Start) => &mut marks.validation_start,
            (Phase::Validation, Boundary::End) => &mut marks.validation_end,
        };
        *slot = Some(now);
        debug!(%phase, ?boundary, offset_ns = offset, "phase boundary");
        Ok(())
    }

    /// Nanoseconds from session start to `at`.
    pub fn offset(&self, at: Timestamp) -> Result<u64, TraceError> {
        let start = self.marks.lock().start.ok_or(TraceError::NotStarted)?;
        at.duration_since(start)
    }

    /// Append a resolver record. Rejected once the session has ended.
    pub fn push_record(&self, record: ResolverRecord) -> Result<(), TraceError> {
        let marks = self.marks.lock();
        if marks.start.is_none() {
            return Err(TraceError::NotStarted);
        }
        if marks.end.is_some() {
            return Err(TraceError::AlreadyFinished);
        }
        trace!(
            field = %record.field_name,
            parent = %record.parent_type,
            start_offset_ns = record.start_offset,
            duration_ns = record.duration,
            "resolver timed"
        );
        self.records.lock().push(record);
        Ok(())
    }

    /// Total duration; fails until [`end`](Self::end) has been called.
    pub fn duration(&self) -> Result<u64, TraceError> {
        self.session().duration()
    }

    /// Snapshot of the current state.
    pub fn session(&self) -> TraceSession {
        let marks = self.marks.lock();
        TraceSession {
            start_time: marks.start,
            end_time: marks.end,
            wall_start: marks.wall_start,
            parsing_start: marks.parsing_start,
            parsing_end: marks.parsing_end,
            validation_start: marks.validation_start,
            validation_end: marks.validation_end,
            resolver_records: self.records.lock().clone(),
        }
    }

    /// Keep the first bookkeeping failure so the report can surface it.
    pub(crate) fn note_failure(&self, err: TraceError) {
        error!(error = %err, "tracer state violation");
        self.failure.lock().get_or_insert(err);
    }

    fn note(&self, result: Result<(), TraceError>) {
        if let Err(err) = result {
            self.note_failure(err);
        }
    }

    /// Render the report of a finished session.
    pub fn build_report(&self) -> Result<TraceReport, TraceError> {
        if let Some(err) = self.failure.lock().clone() {
            return Err(err);
        }
        ReportBuilder::new(&self.session()).build()
    }

    /// End the session and attach the report to `result`.
    ///
    /// On failure the result is left untouched apart from `trace_error`.
    fn finish(&self, result: &mut ExecutionResult) {
        self.note(self.end());
        let rendered = self.build_report().and_then(|report| {
            serde_json::to_value(&report).map_err(|e| TraceError::Render(e.to_string()))
        });
        match rendered {
            Ok(value) => {
                result.extensions.insert(EXTENSION_KEY.to_string(), value);
            }
            Err(err) => {
                error!(error = %err, "trace report not attached");
                result.trace_error = Some(err);
            }
        }
    }
}

impl Instrumentation for PhaseTracer {
    fn start(&self) {
        PhaseTracer::start(self);
    }

    fn end(&self) {
        self.note(PhaseTracer::end(self));
    }

    fn phase_start(&self, phase: Phase) {
        self.note(self.mark(phase, Boundary::Start));
    }

    fn phase_end(&self, phase: Phase) {
        self.note(self.mark(phase, Boundary::End));
    }

    fn resolver_hook(self: Arc<Self>) -> Option<Arc<dyn Middleware>> {
        Some(Arc::new(ResolverTimer::new(self)))
    }

    fn attach(self: Arc<Self>, execution: Execution) -> Execution {
        execution.map(move |mut result| {
            self.finish(&mut result);
            result
        })
    }

    fn report(&self) -> Result<Option<TraceReport>, TraceError> {
        self.build_report().map(Some)
    }
}
