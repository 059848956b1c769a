//! Job-level failure classification.

use crate::errors::{error_chain, PipelineError, StageFailure};
use crate::events::{EventSink, LogRecord};
use std::future::Future;
use std::sync::Arc;

/// The outermost boundary of a pipeline run.
///
/// Any failure escaping the guarded future is classified exactly once into a
/// [`PipelineError`] and logged at error severity with its full cause chain.
/// Success values pass through untouched. The guard never exits the process;
/// callers decide what a failed run means.
pub struct JobGuard {
    job: String,
    events: Arc<dyn EventSink>,
}

impl JobGuard {
    /// Creates a guard for the named job.
    pub fn new(job: impl Into<String>, events: Arc<dyn EventSink>) -> Self {
        Self {
            job: job.into(),
            events,
        }
    }

    /// The guarded job name.
    #[must_use]
    pub fn job(&self) -> &str {
        &self.job
    }

    /// Awaits `job`, classifying its failure.
    pub async fn run<T, F>(&self, job: F) -> Result<T, PipelineError>
    where
        F: Future<Output = Result<T, StageFailure>>,
    {
        job.await.map_err(|failure| {
            let err = PipelineError::classify(&self.job, failure);
            self.events
                .emit(LogRecord::error(&self.job, err.to_string()).with_detail(error_chain(&err)));
            err
        })
    }
}
