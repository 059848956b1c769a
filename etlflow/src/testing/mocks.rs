//! Scripted collaborators for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::core::Record;
use crate::errors::{ErrorKind, StageError};
use crate::extract::{Extractor, SourceDescriptor};
use crate::stages::Stage;

/// A passthrough stage that fails its first `failures` calls.
#[derive(Debug)]
pub struct FlakyStage {
    name: String,
    failures: u32,
    kind: ErrorKind,
    calls: AtomicU32,
}

impl FlakyStage {
    /// Creates a stage failing `failures` times with errors of `kind`.
    #[must_use]
    pub fn new(name: impl Into<String>, failures: u32, kind: ErrorKind) -> Self {
        Self {
            name: name.into(),
            failures,
            kind,
            calls: AtomicU32::new(0),
        }
    }

    /// Returns the number of times the stage was called.
    #[must_use]
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<I: Send + 'static> Stage<I, I> for FlakyStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, input: I) -> Result<I, StageError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            return Err(StageError::of_kind(
                self.kind,
                format!("{} transient failure {call}", self.name),
            ));
        }
        Ok(input)
    }
}

/// An extractor returning fixed records after `failures` failed calls.
#[derive(Debug)]
pub struct ScriptedExtractor {
    records: Vec<Record>,
    failures: u32,
    kind: ErrorKind,
    calls: AtomicU32,
}

impl ScriptedExtractor {
    /// Creates an extractor that always returns `records`.
    #[must_use]
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records,
            failures: 0,
            kind: ErrorKind::Io,
            calls: AtomicU32::new(0),
        }
    }

    /// Makes the first `times` calls fail with `kind`.
    #[must_use]
    pub fn failing(mut self, times: u32, kind: ErrorKind) -> Self {
        self.failures = times;
        self.kind = kind;
        self
    }

    /// Returns the number of times the extractor was called.
    #[must_use]
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Extractor for ScriptedExtractor {
    async fn extract(&self, source: &SourceDescriptor) -> Result<Vec<Record>, StageError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            return Err(StageError::of_kind(
                self.kind,
                format!("{source} unavailable (call {call})"),
            ));
        }
        Ok(self.records.clone())
    }
}
