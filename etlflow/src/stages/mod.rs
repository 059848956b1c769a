//! Stage trait and implementations.
//!
//! Stages are the fundamental units of work in an etlflow pipeline. Each
//! stage consumes an input and produces an output or a [`StageError`].
//! Reliability behaviors (timing, retry) are themselves stages that wrap
//! another stage, so composition order is explicit at construction time.

use crate::errors::StageError;
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

/// Trait for pipeline stages.
#[async_trait]
pub trait Stage<I: Send, O: Send>: Send + Sync {
    /// Returns the name of the stage.
    fn name(&self) -> &str;

    /// Executes the stage.
    ///
    /// # Arguments
    ///
    /// * `input` - The stage input, owned for the duration of the call
    ///
    /// # Returns
    ///
    /// The stage output, or the failure that stopped it.
    async fn execute(&self, input: I) -> Result<O, StageError>;
}

#[async_trait]
impl<I, O, S> Stage<I, O> for Arc<S>
where
    I: Send + 'static,
    O: Send + 'static,
    S: Stage<I, O> + ?Sized,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn execute(&self, input: I) -> Result<O, StageError> {
        (**self).execute(input).await
    }
}

/// A simple function-based stage.
pub struct FnStage<F> {
    name: String,
    func: F,
}

impl<F> FnStage<F> {
    /// Creates a new function-based stage.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnStage<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage")
            .field("name", &self.name)
            .finish()
    }
}

#[async_trait]
impl<I, O, F> Stage<I, O> for FnStage<F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(I) -> Result<O, StageError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, input: I) -> Result<O, StageError> {
        (self.func)(input)
    }
}
