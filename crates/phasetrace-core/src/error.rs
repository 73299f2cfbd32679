use thiserror::Error;

use crate::trace::Phase;

/// Tracer-state failures.
///
/// These are internal invariant violations: a correctly sequenced request
/// never produces one. They are reported loudly instead of being rendered as
/// zero durations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TraceError {
    #[error("tracing has not started yet")]
    NotStarted,

    #[error("tracing has not ended yet: incomplete session")]
    NotFinished,

    #[error("tracing has already ended")]
    AlreadyFinished,

    #[error("{0} phase was not recorded")]
    PhaseNotRecorded(Phase),

    #[error("clock went backwards: {later} < {earlier}")]
    ClockWentBackwards { earlier: u64, later: u64 },

    #[error("failed to render trace report: {0}")]
    Render(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Syntax error: {message} ({line}:{column})")]
    Syntax {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("Tracing error: {0}")]
    Trace(#[from] TraceError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error came from the parse phase rather than the tracer.
    pub fn is_syntax(&self) -> bool {
        matches!(self, Error::Syntax { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
