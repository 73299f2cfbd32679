//! Traced query orchestration.
//!
//! [`Executor::document_from_string`] starts the trace and parses;
//! [`PreparedDocument::execute`] validates, installs the resolver timer and
//! runs the engine. The report is attached at `extensions.tracing` once the
//! execution settles.

use std::fmt;
use std::sync::Arc;

use phasetrace_core::{Clock, Phase, Result};
use phasetrace_engine::{
    Document, ExecuteOptions, Execution, ExecutionEngine, ExecutionResult, NativeEngine,
    NativeParser, NativeValidator, Parser, Schema, Validator,
};
use tracing::debug;

use crate::config::ExecutorConfig;
use crate::tracer::{Instrumentation, NoTracing, TracerFactory, Tracing};

/// Query text, or a document that was already parsed.
#[derive(Debug, Clone)]
pub enum DocumentSource {
    Text(String),
    Parsed(Document),
}

impl From<&str> for DocumentSource {
    fn from(text: &str) -> Self {
        DocumentSource::Text(text.to_string())
    }
}

impl From<String> for DocumentSource {
    fn from(text: String) -> Self {
        DocumentSource::Text(text)
    }
}

impl From<Document> for DocumentSource {
    fn from(document: Document) -> Self {
        DocumentSource::Parsed(document)
    }
}

/// Brackets a phase: `phase_start` on entry, `phase_end` on drop.
///
/// The end mark is recorded on every exit path, early returns and unwinding
/// included.
struct PhaseGuard<'a> {
    tracer: &'a dyn Instrumentation,
    phase: Phase,
}

impl<'a> PhaseGuard<'a> {
    fn enter(tracer: &'a dyn Instrumentation, phase: Phase) -> Self {
        tracer.phase_start(phase);
        Self { tracer, phase }
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.tracer.phase_end(self.phase);
    }
}

/// Runs queries through parse, validate and execute.
///
/// Tracing is chosen once, here: every request then gets its own tracer from
/// the configured [`TracerFactory`].
#[derive(Clone)]
pub struct Executor {
    parser: Arc<dyn Parser>,
    validator: Arc<dyn Validator>,
    engine: Arc<dyn ExecutionEngine>,
    tracing: Arc<dyn TracerFactory>,
    validate: bool,
}

impl Executor {
    /// Executor with tracing disabled.
    pub fn new(
        parser: Arc<dyn Parser>,
        validator: Arc<dyn Validator>,
        engine: Arc<dyn ExecutionEngine>,
    ) -> Self {
        Self {
            parser,
            validator,
            engine,
            tracing: Arc::new(NoTracing::default()),
            validate: true,
        }
    }

    /// Executor backed by the native parser, validator and engine.
    pub fn native() -> Self {
        Self::new(
            Arc::new(NativeParser),
            Arc::new(NativeValidator),
            Arc::new(NativeEngine),
        )
    }

    pub fn from_config(config: &ExecutorConfig) -> Self {
        let executor = Self::native().with_validation(config.validate);
        if config.tracing {
            executor.with_tracer_factory(Arc::new(Tracing::system()))
        } else {
            executor
        }
    }

    /// Enable tracing with timestamps from `clock`.
    pub fn with_tracing(self, clock: Arc<dyn Clock>) -> Self {
        self.with_tracer_factory(Arc::new(Tracing::new(clock)))
    }

    pub fn with_tracer_factory(mut self, tracing: Arc<dyn TracerFactory>) -> Self {
        self.tracing = tracing;
        self
    }

    /// Default for requests that do not opt out of validation themselves.
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// Start a trace and parse `source`.
    ///
    /// A pre-parsed document is printed back to text for
    /// [`PreparedDocument::source`]; the printing is timed as parsing.
    /// Syntax errors are returned as [`phasetrace_core::Error::Syntax`] and
    /// produce no report.
    pub fn document_from_string(
        &self,
        schema: Arc<Schema>,
        source: impl Into<DocumentSource>,
    ) -> Result<PreparedDocument> {
        let tracer = self.tracing.create();
        tracer.start();

        let (source, document) = {
            let _parsing = PhaseGuard::enter(&*tracer, Phase::Parsing);
            match source.into() {
                DocumentSource::Text(text) => {
                    let document = self.parser.parse(&text).map_err(|err| {
                        debug!(error = %err, "query failed to parse");
                        err
                    })?;
                    (text, document)
                }
                DocumentSource::Parsed(document) => (self.parser.print(&document), document),
            }
        };

        Ok(PreparedDocument {
            schema,
            source,
            document: Arc::new(document),
            tracer,
            validator: self.validator.clone(),
            engine: self.engine.clone(),
            validate: self.validate,
        })
    }

    /// Parse and execute in one step.
    pub fn execute(
        &self,
        schema: Arc<Schema>,
        source: impl Into<DocumentSource>,
        options: ExecuteOptions,
    ) -> Result<Execution> {
        Ok(self.document_from_string(schema, source)?.execute(options))
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::native()
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("validate", &self.validate)
            .finish_non_exhaustive()
    }
}

/// A parsed document bound to its schema and to the trace started for it.
pub struct PreparedDocument {
    schema: Arc<Schema>,
    source: String,
    document: Arc<Document>,
    tracer: Arc<dyn Instrumentation>,
    validator: Arc<dyn Validator>,
    engine: Arc<dyn ExecutionEngine>,
    validate: bool,
}

impl PreparedDocument {
    /// The query text, printed from the document if it arrived pre-parsed.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Validate and execute.
    ///
    /// An invalid document yields an `invalid` result with the validation
    /// errors, no data and no report. Otherwise the report is attached when
    /// the returned [`Execution`] settles.
    pub fn execute(self, mut options: ExecuteOptions) -> Execution {
        if self.validate && options.validate {
            let errors = {
                let _validation = PhaseGuard::enter(&*self.tracer, Phase::Validation);
                self.validator.validate(&self.schema, &self.document)
            };
            if !errors.is_empty() {
                debug!(errors = errors.len(), "document failed validation");
                return Execution::Ready(ExecutionResult::invalid(errors));
            }
        }

        // Caller middleware stays outermost; the timer wraps only the resolver.
        if let Some(timer) = self.tracer.clone().resolver_hook() {
            options.middleware.push(timer);
        }

        let execution = self.engine.execute(self.schema, self.document, options);
        self.tracer.attach(execution)
    }
}

impl fmt::Debug for PreparedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedDocument")
            .field("source", &self.source)
            .field("validate", &self.validate)
            .finish_non_exhaustive()
    }
}
