//! Error types for the etlflow framework.
//!
//! Stages fail with a structured [`StageError`]. The orchestrator attributes
//! each failure to the stage it escaped from ([`StageFailure`]), and the job
//! guard classifies it exactly once into a [`PipelineError`], the only error
//! kind visible to callers of a pipeline run.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Stable tag describing what kind of failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing, ambiguous or out-of-range configuration.
    Config,
    /// File system or socket failure.
    Io,
    /// Malformed source data.
    Parse,
    /// Non-success HTTP exchange.
    Http,
    /// The sink could not be reached.
    Connection,
    /// The sink rejected the data.
    Constraint,
    /// The operation did not finish in time.
    Timeout,
    /// Anything else.
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config => write!(f, "ConfigError"),
            Self::Io => write!(f, "IOError"),
            Self::Parse => write!(f, "ParseError"),
            Self::Http => write!(f, "HttpError"),
            Self::Connection => write!(f, "ConnectionError"),
            Self::Constraint => write!(f, "ConstraintError"),
            Self::Timeout => write!(f, "TimeoutError"),
            Self::Other => write!(f, "Error"),
        }
    }
}

/// The failure returned by every stage and collaborator.
#[derive(Debug, Error)]
pub enum StageError {
    /// Configuration is missing or ambiguous. Never retried.
    #[error("{0}")]
    Config(String),

    /// An I/O operation failed.
    #[error("{context}: {source}")]
    Io {
        /// What was being attempted.
        context: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Source data could not be parsed.
    #[error("{0}")]
    Parse(String),

    /// An HTTP request failed or returned a non-success status.
    #[error("{0}")]
    Http(String),

    /// The sink is unavailable.
    #[error("{0}")]
    Connection(String),

    /// The sink refused a batch.
    #[error("{0}")]
    Constraint(String),

    /// The operation timed out.
    #[error("{0}")]
    Timeout(String),

    /// An unclassified failure.
    #[error("{0}")]
    Other(String),
}

impl StageError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an I/O error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Creates a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Creates a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Creates a constraint error.
    pub fn constraint(message: impl Into<String>) -> Self {
        Self::Constraint(message.into())
    }

    /// Creates a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout(message.into())
    }

    /// Creates an error of the given kind.
    ///
    /// `Io` errors get a synthetic [`std::io::Error`] carrying the message.
    pub fn of_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::Config => Self::Config(message),
            ErrorKind::Io => Self::Io {
                source: std::io::Error::other(message.clone()),
                context: message,
            },
            ErrorKind::Parse => Self::Parse(message),
            ErrorKind::Http => Self::Http(message),
            ErrorKind::Connection => Self::Connection(message),
            ErrorKind::Constraint => Self::Constraint(message),
            ErrorKind::Timeout => Self::Timeout(message),
            ErrorKind::Other => Self::Other(message),
        }
    }

    /// Returns the kind tag of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::Io { .. } => ErrorKind::Io,
            Self::Parse(_) => ErrorKind::Parse,
            Self::Http(_) => ErrorKind::Http,
            Self::Connection(_) => ErrorKind::Connection,
            Self::Constraint(_) => ErrorKind::Constraint,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Other(_) => ErrorKind::Other,
        }
    }
}

/// A stage error attributed to the stage it escaped from.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct StageFailure {
    /// Name of the failing stage, when attributable.
    pub stage: Option<String>,
    /// The original error.
    #[source]
    pub error: StageError,
}

impl StageFailure {
    /// Attributes an error to a stage.
    pub fn at(stage: impl Into<String>, error: StageError) -> Self {
        Self {
            stage: Some(stage.into()),
            error,
        }
    }
}

impl From<StageError> for StageFailure {
    fn from(error: StageError) -> Self {
        Self { stage: None, error }
    }
}

/// Extension for attributing stage results.
pub trait StageResultExt<T> {
    /// Attributes an error, if any, to the named stage.
    fn in_stage(self, stage: &str) -> Result<T, StageFailure>;
}

impl<T> StageResultExt<T> for Result<T, StageError> {
    fn in_stage(self, stage: &str) -> Result<T, StageFailure> {
        self.map_err(|error| StageFailure::at(stage, error))
    }
}

/// The classified, terminal error of a pipeline run.
///
/// Only the job guard constructs this type. It keeps the original
/// [`StageError`] as its `source()` so the full cause chain stays available
/// for diagnostics.
#[derive(Debug, Error)]
#[error("ETL JOB FAILED: {job} | stage: {stage} | {kind}: {message}")]
pub struct PipelineError {
    job: String,
    stage: String,
    kind: ErrorKind,
    message: String,
    #[source]
    cause: StageError,
}

impl PipelineError {
    pub(crate) fn classify(job: &str, failure: StageFailure) -> Self {
        let StageFailure { stage, error } = failure;
        Self {
            job: job.to_string(),
            stage: stage.unwrap_or_else(|| job.to_string()),
            kind: error.kind(),
            message: error.to_string(),
            cause: error,
        }
    }

    /// Name of the guarded job.
    #[must_use]
    pub fn job(&self) -> &str {
        &self.job
    }

    /// Name of the stage the failure escaped from.
    ///
    /// Falls back to the job name when the failure was not attributable.
    #[must_use]
    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Kind of the original failure.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Message of the original failure.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The original failure.
    #[must_use]
    pub fn cause(&self) -> &StageError {
        &self.cause
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A configuration source could not be read or deserialized.
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    /// A value is out of its allowed range.
    #[error("invalid configuration: {field} {reason}")]
    Invalid {
        /// The offending key.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

impl From<ConfigError> for StageError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Renders an error and its full `source()` chain, one cause per line.
#[must_use]
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut current = err.source();
    while let Some(cause) = current {
        rendered.push_str("\n  caused by: ");
        rendered.push_str(&cause.to_string());
        current = cause.source();
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::Config.to_string(), "ConfigError");
        assert_eq!(ErrorKind::Io.to_string(), "IOError");
        assert_eq!(ErrorKind::Connection.to_string(), "ConnectionError");
    }

    #[test]
    fn test_stage_error_kind() {
        let err = StageError::io(
            "reading orders.csv",
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        );
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(err.to_string(), "reading orders.csv: no such file");
        assert_eq!(StageError::timeout("slow").kind(), ErrorKind::Timeout);
    }

    #[test]
    fn test_of_kind_round_trips_kind() {
        for kind in [
            ErrorKind::Config,
            ErrorKind::Io,
            ErrorKind::Parse,
            ErrorKind::Http,
            ErrorKind::Connection,
            ErrorKind::Constraint,
            ErrorKind::Timeout,
            ErrorKind::Other,
        ] {
            assert_eq!(StageError::of_kind(kind, "x").kind(), kind);
        }
    }

    #[test]
    fn test_in_stage_attributes_failure() {
        let result: Result<(), StageError> = Err(StageError::parse("bad row"));
        let failure = result.in_stage("extract").unwrap_err();
        assert_eq!(failure.stage.as_deref(), Some("extract"));
        assert_eq!(failure.error.kind(), ErrorKind::Parse);
    }

    #[test]
    fn test_classify_keeps_original_cause() {
        let failure = StageFailure::at("load", StageError::connection("sink down"));
        let err = PipelineError::classify("run_etl", failure);

        assert_eq!(err.job(), "run_etl");
        assert_eq!(err.stage(), "load");
        assert_eq!(err.kind(), ErrorKind::Connection);
        assert_eq!(err.message(), "sink down");
        assert!(matches!(err.cause(), StageError::Connection(_)));
        assert_eq!(
            err.to_string(),
            "ETL JOB FAILED: run_etl | stage: load | ConnectionError: sink down"
        );
    }

    #[test]
    fn test_classify_unattributed_falls_back_to_job() {
        let err = PipelineError::classify("run_etl", StageError::Other("boom".into()).into());
        assert_eq!(err.stage(), "run_etl");
    }

    #[test]
    fn test_error_chain_includes_sources() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let failure = StageFailure::at("extract", StageError::io("GET /orders", io));
        let err = PipelineError::classify("run_etl", failure);

        let chain = error_chain(&err);
        assert!(chain.starts_with("ETL JOB FAILED"));
        assert!(chain.contains("caused by: GET /orders: refused"));
        assert!(chain.contains("caused by: refused"));
    }
}
