//! # Etlflow
//!
//! Resilient extract-transform-load pipelines.
//!
//! Etlflow runs a strictly sequential three-stage pipeline with:
//!
//! - **Composable reliability wrappers**: timing and retry are stages that
//!   wrap other stages, so composition order is explicit
//! - **Deterministic retry**: geometric backoff without jitter, original
//!   errors returned on exhaustion
//! - **Batch loading**: ordered fixed-size batches, each retried on its own
//! - **Job-level classification**: one error type, built in one place, with
//!   the full cause chain preserved
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use etlflow::prelude::*;
//!
//! let pipeline = EtlPipeline::builder(Arc::new(JsonLinesSink::new("data")))
//!     .schema(RecordSchema::orders())
//!     .config(load_config(None, &ConfigOverrides::default())?)
//!     .build()?;
//!
//! let report = pipeline.run(&SourceSelector::file("orders.csv")).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod extract;
pub mod interceptors;
pub mod load;
pub mod observability;
pub mod pipeline;
pub mod stages;
pub mod testing;
pub mod transform;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{load_config, ConfigOverrides, EtlConfig};
    pub use crate::core::{LoadReport, PipelineReport, Record, StageKind};
    pub use crate::errors::{ConfigError, ErrorKind, PipelineError, StageError};
    pub use crate::events::{EventSink, LogRecord, NoOpEventSink, TracingEventSink};
    pub use crate::extract::{Extractor, SourceDescriptor, SourceSelector};
    pub use crate::interceptors::{Instrumented, Retried};
    pub use crate::load::{BatchLoader, JsonLinesSink, LoadMode, MemorySink, Sink};
    pub use crate::pipeline::{EtlPipeline, JobGuard, RetryConfig};
    pub use crate::stages::Stage;
    pub use crate::transform::RecordSchema;
    pub use std::sync::Arc;
}
