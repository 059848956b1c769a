//! Timing wrapper for stages.

use crate::errors::StageError;
use crate::events::{EventSink, LogRecord};
use crate::observability::SpanTimer;
use crate::stages::Stage;
use async_trait::async_trait;
use std::sync::Arc;

/// Wraps a stage and reports how long each invocation took.
///
/// The wrapped stage's output or error is returned untouched. Each wrapper
/// times only its own invocation span, so nesting wrappers yields one record
/// per layer, outer spans enclosing inner ones.
pub struct Instrumented<S> {
    inner: S,
    events: Arc<dyn EventSink>,
}

impl<S> Instrumented<S> {
    /// Wraps `inner`, reporting to `events`.
    pub fn new(inner: S, events: Arc<dyn EventSink>) -> Self {
        Self { inner, events }
    }
}

#[async_trait]
impl<I, O, S> Stage<I, O> for Instrumented<S>
where
    I: Send + 'static,
    O: Send + 'static,
    S: Stage<I, O>,
{
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn execute(&self, input: I) -> Result<O, StageError> {
        let timer = SpanTimer::start(self.inner.name());
        let result = self.inner.execute(input).await;
        let elapsed = timer.finish();

        let name = self.inner.name();
        let message = match &result {
            Ok(_) => format!("{name} executed in {:.4}s", elapsed.as_secs_f64()),
            Err(_) => format!("{name} failed after {:.4}s", elapsed.as_secs_f64()),
        };
        self.events
            .emit(LogRecord::info(name, message).with_elapsed(elapsed));

        result
    }
}
