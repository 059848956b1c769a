//! Retry wrapper for stages.

use crate::errors::StageError;
use crate::events::EventSink;
use crate::pipeline::{with_retry, RetryConfig};
use crate::stages::Stage;
use async_trait::async_trait;
use std::sync::Arc;

/// Wraps a stage and re-invokes it on failure with geometric backoff.
///
/// Each call gets fresh retry state. Retried stages receive a clone of the
/// original input on every attempt. After the final attempt the wrapped
/// stage's own error is returned, not a wrapped one.
pub struct Retried<S> {
    inner: S,
    policy: RetryConfig,
    events: Arc<dyn EventSink>,
}

impl<S> Retried<S> {
    /// Wraps `inner` with `policy`.
    pub fn new(inner: S, policy: RetryConfig, events: Arc<dyn EventSink>) -> Self {
        Self {
            inner,
            policy,
            events,
        }
    }
}

#[async_trait]
impl<I, O, S> Stage<I, O> for Retried<S>
where
    I: Clone + Send + Sync + 'static,
    O: Send + 'static,
    S: Stage<I, O>,
{
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn execute(&self, input: I) -> Result<O, StageError> {
        with_retry(&self.policy, self.inner.name(), self.events.as_ref(), || {
            self.inner.execute(input.clone())
        })
        .await
    }
}
