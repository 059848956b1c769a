//! Structured logging collaborator.
//!
//! Every wrapper and stage in the framework reports through an injected
//! [`EventSink`] instead of a process-wide logger, so concurrent pipeline
//! runs can share one sink and tests can inspect exactly what was emitted.

mod sink;

pub use sink::{
    CollectingEventSink, EventSink, LogLevel, LogRecord, NoOpEventSink, RunScopedSink,
    TracingEventSink,
};
