//! In-process sink.

use super::{Batch, Sink};
use crate::core::Record;
use crate::errors::{ErrorKind, StageError};
use crate::transform::RecordSchema;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

/// A sink operation, as recorded by [`MemorySink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkCall {
    /// `ensure_schema` for a table.
    EnsureSchema(String),
    /// `truncate` of a table.
    Truncate(String),
    /// `insert` of a batch: table, batch ordinal, row count.
    Insert(String, usize, usize),
    /// `flush`.
    Flush,
}

/// Operation selector for failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkOp {
    /// `ensure_schema`.
    EnsureSchema,
    /// `truncate`.
    Truncate,
    /// `insert`, any batch.
    Insert,
    /// `insert` of one batch ordinal.
    InsertBatch(usize),
    /// `flush`.
    Flush,
}

#[derive(Debug, Default)]
struct MemoryState {
    tables: HashMap<String, Vec<Record>>,
    calls: Vec<SinkCall>,
    failures: HashMap<SinkOp, (u32, ErrorKind)>,
}

impl MemoryState {
    fn take_failure(&mut self, op: SinkOp) -> Option<StageError> {
        let (remaining, kind) = self.failures.get_mut(&op)?;
        if *remaining == 0 {
            return None;
        }
        *remaining -= 1;
        Some(StageError::of_kind(*kind, format!("injected {op:?} failure")))
    }
}

/// An ordered in-memory sink.
///
/// Safe for concurrent use: each call takes one short lock. Every call is
/// recorded, including failed ones, so tests can count attempts.
#[derive(Debug, Default)]
pub struct MemorySink {
    state: Mutex<MemoryState>,
}

impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `times` calls of `op` fail with `kind`.
    #[must_use]
    pub fn failing(self, op: SinkOp, times: u32, kind: ErrorKind) -> Self {
        self.inject(op, times, kind);
        self
    }

    /// Makes the next `times` calls of `op` fail with `kind`.
    pub fn inject(&self, op: SinkOp, times: u32, kind: ErrorKind) {
        self.state.lock().failures.insert(op, (times, kind));
    }

    /// Rows currently stored in `table`.
    #[must_use]
    pub fn rows(&self, table: &str) -> Vec<Record> {
        self.state
            .lock()
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Every call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<SinkCall> {
        self.state.lock().calls.clone()
    }

    /// Number of `insert` calls, failed ones included.
    #[must_use]
    pub fn insert_calls(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, SinkCall::Insert(..)))
            .count()
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn ensure_schema(&self, schema: &RecordSchema) -> Result<(), StageError> {
        let mut state = self.state.lock();
        state
            .calls
            .push(SinkCall::EnsureSchema(schema.table().to_string()));
        if let Some(err) = state.take_failure(SinkOp::EnsureSchema) {
            return Err(err);
        }
        state.tables.entry(schema.table().to_string()).or_default();
        Ok(())
    }

    async fn truncate(&self, table: &str) -> Result<(), StageError> {
        let mut state = self.state.lock();
        state.calls.push(SinkCall::Truncate(table.to_string()));
        if let Some(err) = state.take_failure(SinkOp::Truncate) {
            return Err(err);
        }
        state.tables.entry(table.to_string()).or_default().clear();
        Ok(())
    }

    async fn insert(&self, table: &str, batch: &Batch) -> Result<(), StageError> {
        let mut state = self.state.lock();
        state.calls.push(SinkCall::Insert(
            table.to_string(),
            batch.ordinal(),
            batch.len(),
        ));
        if let Some(err) = state
            .take_failure(SinkOp::InsertBatch(batch.ordinal()))
            .or_else(|| state.take_failure(SinkOp::Insert))
        {
            return Err(err);
        }
        state
            .tables
            .entry(table.to_string())
            .or_default()
            .extend(batch.rows().iter().cloned());
        Ok(())
    }

    async fn flush(&self) -> Result<(), StageError> {
        let mut state = self.state.lock();
        state.calls.push(SinkCall::Flush);
        match state.take_failure(SinkOp::Flush) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
