//! Event sink trait and implementations.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Severity of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Progress and timing information.
    Info,
    /// Recoverable trouble: retries, rejected records.
    Warning,
    /// Exhausted retries and job failures.
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A structured log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// When the record was created.
    pub timestamp: DateTime<Utc>,
    /// Severity.
    pub level: LogLevel,
    /// The stage or job that emitted the record.
    pub component: String,
    /// Human-readable message.
    pub message: String,
    /// Elapsed time in seconds, for timing records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_secs: Option<f64>,
    /// Pipeline run the record belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<Uuid>,
    /// Extra diagnostic context, such as an error cause chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl LogRecord {
    /// Creates a record at the given level.
    pub fn new(level: LogLevel, component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            component: component.into(),
            message: message.into(),
            elapsed_secs: None,
            run_id: None,
            detail: None,
        }
    }

    /// Creates an info record.
    pub fn info(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, component, message)
    }

    /// Creates a warning record.
    pub fn warning(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warning, component, message)
    }

    /// Creates an error record.
    pub fn error(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, component, message)
    }

    /// Attaches an elapsed duration.
    #[must_use]
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed_secs = Some(elapsed.as_secs_f64());
        self
    }

    /// Attaches a run ID.
    #[must_use]
    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = Some(run_id);
        self
    }

    /// Attaches diagnostic detail.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Trait for the structured logging collaborator.
///
/// Implementations must accept concurrent writers: several pipeline runs may
/// share one sink. Emitting must never fail or block on I/O the caller can
/// observe.
pub trait EventSink: Send + Sync {
    /// Emits a record.
    fn emit(&self, record: LogRecord);
}

/// A no-op event sink that discards all records.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn emit(&self, _record: LogRecord) {}
}

/// An event sink that forwards records to the `tracing` framework.
///
/// The subscriber installed by the application decides where records end up.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, record: LogRecord) {
        let run_id = record.run_id.map(|id| id.to_string());
        match record.level {
            LogLevel::Info => info!(
                component = %record.component,
                elapsed_secs = record.elapsed_secs,
                run_id = run_id.as_deref(),
                "{}", record.message
            ),
            LogLevel::Warning => warn!(
                component = %record.component,
                run_id = run_id.as_deref(),
                "{}", record.message
            ),
            LogLevel::Error => error!(
                component = %record.component,
                run_id = run_id.as_deref(),
                detail = record.detail.as_deref(),
                "{}", record.message
            ),
        }
    }
}

/// Stamps every record with a run ID before forwarding it.
pub struct RunScopedSink {
    inner: Arc<dyn EventSink>,
    run_id: Uuid,
}

impl RunScopedSink {
    /// Creates a sink scoped to one pipeline run.
    #[must_use]
    pub fn new(inner: Arc<dyn EventSink>, run_id: Uuid) -> Self {
        Self { inner, run_id }
    }

    /// Returns the run ID.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }
}

impl EventSink for RunScopedSink {
    fn emit(&self, mut record: LogRecord) {
        record.run_id.get_or_insert(self.run_id);
        self.inner.emit(record);
    }
}

/// A collecting event sink for testing purposes.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    records: RwLock<Vec<LogRecord>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected records.
    #[must_use]
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.read().clone()
    }

    /// Returns records at the given level.
    #[must_use]
    pub fn at_level(&self, level: LogLevel) -> Vec<LogRecord> {
        self.records
            .read()
            .iter()
            .filter(|r| r.level == level)
            .cloned()
            .collect()
    }

    /// Returns records emitted by a component.
    #[must_use]
    pub fn from_component(&self, component: &str) -> Vec<LogRecord> {
        self.records
            .read()
            .iter()
            .filter(|r| r.component == component)
            .cloned()
            .collect()
    }

    /// Returns the number of collected records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if nothing has been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Clears all collected records.
    pub fn clear(&self) {
        self.records.write().clear();
    }
}

impl EventSink for CollectingEventSink {
    fn emit(&self, record: LogRecord) {
        self.records.write().push(record);
    }
}
