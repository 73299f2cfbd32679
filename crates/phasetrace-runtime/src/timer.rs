//! Per-field timing middleware.

use std::sync::Arc;

use phasetrace_core::{PathSegment, ResolverRecord, Timestamp, TraceError};
use phasetrace_engine::{Middleware, Next, ResolveInfo, Resolved};

use crate::tracer::PhaseTracer;

/// Times every resolver invocation it wraps and appends one
/// [`ResolverRecord`] to its tracer once the value is available.
///
/// The resolver's outcome is forwarded unchanged, errors included. A pending
/// value that is dropped before it settles leaves no record.
#[derive(Debug, Clone)]
pub struct ResolverTimer {
    tracer: Arc<PhaseTracer>,
}

impl ResolverTimer {
    pub fn new(tracer: Arc<PhaseTracer>) -> Self {
        Self { tracer }
    }
}

impl Middleware for ResolverTimer {
    fn resolve(&self, info: &ResolveInfo, next: Next<'_>) -> Resolved {
        let invocation = Invocation::begin(&self.tracer, info);
        match next.run(info) {
            Resolved::Ready(result) => {
                invocation.finish(&self.tracer);
                Resolved::Ready(result)
            }
            Resolved::Pending(pending) => {
                let tracer = self.tracer.clone();
                Resolved::pending(async move {
                    let result = pending.await;
                    invocation.finish(&tracer);
                    result
                })
            }
        }
    }
}

/// Field identity captured before the resolver runs.
struct Invocation {
    started: Timestamp,
    path: Vec<PathSegment>,
    parent_type: String,
    field_name: String,
    return_type: String,
}

impl Invocation {
    fn begin(tracer: &PhaseTracer, info: &ResolveInfo) -> Self {
        Self {
            started: tracer.now(),
            path: info.path.clone(),
            parent_type: info.parent_type.clone(),
            field_name: info.field_name.clone(),
            return_type: info.return_type.to_string(),
        }
    }

    fn finish(self, tracer: &PhaseTracer) {
        let finished = tracer.now();
        if let Err(err) = self.record(tracer, finished) {
            tracer.note_failure(err);
        }
    }

    fn record(self, tracer: &PhaseTracer, finished: Timestamp) -> Result<(), TraceError> {
        let record = ResolverRecord {
            start_offset: tracer.offset(self.started)?,
            duration: finished.duration_since(self.started)?,
            path: self.path,
            parent_type: self.parent_type,
            field_name: self.field_name,
            return_type: self.return_type,
        };
        tracer.push_record(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phasetrace_core::ManualClock;
    use phasetrace_engine::{FieldError, FieldResult, FnResolver, Resolver, TypeRef};
    use serde_json::{json, Map, Value};

    fn info(path: Vec<PathSegment>, field: &str) -> ResolveInfo {
        ResolveInfo {
            path,
            parent_type: "Query".to_string(),
            field_name: field.to_string(),
            return_type: TypeRef::non_null(TypeRef::named("String")),
            parent_value: Value::Null,
            arguments: Map::new(),
        }
    }

    fn started_tracer() -> (Arc<ManualClock>, Arc<PhaseTracer>) {
        let clock = Arc::new(ManualClock::default());
        let tracer = Arc::new(PhaseTracer::new(clock.clone()));
        tracer.start();
        (clock, tracer)
    }

    fn chain(timer: ResolverTimer) -> Vec<Arc<dyn Middleware>> {
        vec![Arc::new(timer)]
    }

    #[test]
    fn test_ready_value_is_recorded() {
        let (clock, tracer) = started_tracer();
        clock.advance(100);

        let resolver_clock = clock.clone();
        let resolver = FnResolver(move |_: &ResolveInfo| -> FieldResult {
            resolver_clock.advance(40);
            Ok(json!("world"))
        });
        let middleware = chain(ResolverTimer::new(tracer.clone()));

        let resolved = Next::new(&middleware, &resolver).run(&info(vec!["hello".into()], "hello"));
        match resolved {
            Resolved::Ready(Ok(value)) => assert_eq!(value, json!("world")),
            other => panic!("unexpected {other:?}"),
        }

        let records = tracer.session().resolver_records;
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.path, vec![PathSegment::from("hello")]);
        assert_eq!(record.parent_type, "Query");
        assert_eq!(record.field_name, "hello");
        assert_eq!(record.return_type, "String!");
        assert_eq!(record.start_offset, 100);
        assert_eq!(record.duration, 40);
    }

    #[test]
    fn test_error_is_forwarded_and_recorded() {
        let (_, tracer) = started_tracer();
        let resolver =
            FnResolver(|_: &ResolveInfo| -> FieldResult { Err(FieldError::new("boom")) });
        let middleware = chain(ResolverTimer::new(tracer.clone()));

        let resolved = Next::new(&middleware, &resolver).run(&info(vec!["fail".into()], "fail"));
        match resolved {
            Resolved::Ready(Err(err)) => assert_eq!(err.message, "boom"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(tracer.session().resolver_records.len(), 1);
    }

    struct Deferred {
        clock: Arc<ManualClock>,
    }

    impl Resolver for Deferred {
        fn resolve(&self, _info: &ResolveInfo) -> Resolved {
            let clock = self.clock.clone();
            Resolved::pending(async move {
                tokio::task::yield_now().await;
                clock.advance(250);
                Ok(json!("later"))
            })
        }
    }

    #[tokio::test]
    async fn test_pending_value_is_recorded_on_settle() {
        let (clock, tracer) = started_tracer();
        clock.advance(10);
        let resolver = Deferred {
            clock: clock.clone(),
        };
        let middleware = chain(ResolverTimer::new(tracer.clone()));

        let resolved =
            Next::new(&middleware, &resolver).run(&info(vec!["asyncHello".into()], "asyncHello"));
        assert!(resolved.is_pending());
        assert!(tracer.session().resolver_records.is_empty());

        let value = resolved.into_future().await.unwrap();
        assert_eq!(value, json!("later"));

        let records = tracer.session().resolver_records;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].start_offset, 10);
        assert_eq!(records[0].duration, 250);
    }

    struct DeferredFailure {
        clock: Arc<ManualClock>,
    }

    impl Resolver for DeferredFailure {
        fn resolve(&self, _info: &ResolveInfo) -> Resolved {
            let clock = self.clock.clone();
            Resolved::pending(async move {
                tokio::task::yield_now().await;
                clock.advance(70);
                Err(FieldError::new("late boom"))
            })
        }
    }

    #[tokio::test]
    async fn test_pending_error_is_forwarded_and_recorded() {
        let (clock, tracer) = started_tracer();
        clock.advance(5);
        let resolver = DeferredFailure {
            clock: clock.clone(),
        };
        let middleware = chain(ResolverTimer::new(tracer.clone()));

        let resolved = Next::new(&middleware, &resolver).run(&info(vec!["slow".into()], "slow"));
        assert!(resolved.is_pending());

        let err = resolved.into_future().await.unwrap_err();
        assert_eq!(err, FieldError::new("late boom"));

        let records = tracer.session().resolver_records;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].field_name, "slow");
        assert_eq!(records[0].start_offset, 5);
        assert_eq!(records[0].duration, 70);
    }

    #[test]
    fn test_dropped_pending_value_leaves_no_record() {
        let (clock, tracer) = started_tracer();
        let resolver = Deferred { clock };
        let middleware = chain(ResolverTimer::new(tracer.clone()));

        let resolved = Next::new(&middleware, &resolver).run(&info(vec!["x".into()], "x"));
        drop(resolved);
        assert!(tracer.session().resolver_records.is_empty());
    }

    #[test]
    fn test_record_after_end_is_noted() {
        let (_, tracer) = started_tracer();
        let resolver = FnResolver(|_: &ResolveInfo| -> FieldResult { Ok(Value::Null) });
        let middleware = chain(ResolverTimer::new(tracer.clone()));
        tracer.end().unwrap();

        let resolved = Next::new(&middleware, &resolver).run(&info(vec!["late".into()], "late"));
        assert!(matches!(resolved, Resolved::Ready(Ok(Value::Null))));
        assert_eq!(tracer.build_report(), Err(TraceError::AlreadyFinished));
    }
}
