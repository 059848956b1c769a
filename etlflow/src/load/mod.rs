//! Batch loading.
//!
//! The [`BatchLoader`] splits validated records into fixed-size batches and
//! sends them to a [`Sink`] strictly in order. Every batch insert is timed
//! and retried on its own: a failure of batch `k` retries only batch `k`,
//! and exhaustion aborts the load with batches `1..k-1` left committed.

mod batch;
mod jsonl;
mod memory;
mod sink;
mod state;

pub use batch::{split_batches, Batch};
pub use jsonl::JsonLinesSink;
pub use memory::{MemorySink, SinkCall, SinkOp};
#[cfg(test)]
pub use sink::MockSink;
pub use sink::Sink;
pub use state::{LoaderState, LoaderTracker};

use crate::core::{LoadReport, Record, StageKind};
use crate::errors::StageError;
use crate::events::{EventSink, LogRecord};
use crate::interceptors::{Instrumented, Retried};
use crate::pipeline::RetryConfig;
use crate::stages::Stage;
use crate::transform::RecordSchema;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Default number of records per batch.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// What happens to existing rows before loading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadMode {
    /// Keep existing rows.
    #[default]
    Append,
    /// Truncate the table once before batch 1, only if there is data to load.
    ReplaceAll,
}

impl fmt::Display for LoadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Append => write!(f, "append"),
            Self::ReplaceAll => write!(f, "replace_all"),
        }
    }
}

/// Prepares the sink for a schema.
pub struct EnsureSchemaStage {
    sink: Arc<dyn Sink>,
}

impl EnsureSchemaStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(sink: Arc<dyn Sink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl Stage<Arc<RecordSchema>, ()> for EnsureSchemaStage {
    fn name(&self) -> &str {
        "ensure_schema"
    }

    async fn execute(&self, schema: Arc<RecordSchema>) -> Result<(), StageError> {
        self.sink.ensure_schema(&schema).await
    }
}

struct TruncateStage {
    sink: Arc<dyn Sink>,
    table: String,
}

#[async_trait]
impl Stage<(), ()> for TruncateStage {
    fn name(&self) -> &str {
        "truncate"
    }

    async fn execute(&self, _input: ()) -> Result<(), StageError> {
        self.sink.truncate(&self.table).await
    }
}

/// One insert attempt. Each attempt moves the tracker into `Sending` and a
/// failed one into `Retrying`.
struct InsertBatchStage {
    sink: Arc<dyn Sink>,
    table: String,
    tracker: Arc<LoaderTracker>,
}

#[async_trait]
impl Stage<Batch, ()> for InsertBatchStage {
    fn name(&self) -> &str {
        "load_batch"
    }

    async fn execute(&self, batch: Batch) -> Result<(), StageError> {
        if self.tracker.state() == LoaderState::Retrying(batch.ordinal()) {
            self.tracker.advance(LoaderState::Sending(batch.ordinal()))?;
        }
        let result = self.sink.insert(&self.table, &batch).await;
        if result.is_err() {
            self.tracker.advance(LoaderState::Retrying(batch.ordinal()))?;
        }
        result
    }
}

/// Sends validated records to a sink in ordered batches.
pub struct BatchLoader {
    sink: Arc<dyn Sink>,
    table: String,
    batch_size: NonZeroUsize,
    mode: LoadMode,
    policy: RetryConfig,
    events: Arc<dyn EventSink>,
}

impl BatchLoader {
    /// Creates an appending loader with default batch size and retry policy.
    pub fn new(sink: Arc<dyn Sink>, table: impl Into<String>, events: Arc<dyn EventSink>) -> Self {
        Self {
            sink,
            table: table.into(),
            batch_size: NonZeroUsize::new(DEFAULT_BATCH_SIZE).unwrap_or(NonZeroUsize::MIN),
            mode: LoadMode::Append,
            policy: RetryConfig::default(),
            events,
        }
    }

    /// Sets the batch size.
    #[must_use]
    pub fn with_batch_size(mut self, size: NonZeroUsize) -> Self {
        self.batch_size = size;
        self
    }

    /// Sets the load mode.
    #[must_use]
    pub fn with_mode(mut self, mode: LoadMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the retry policy applied to each batch and to the truncate.
    #[must_use]
    pub fn with_retry(mut self, policy: RetryConfig) -> Self {
        self.policy = policy;
        self
    }

    /// Loads `records`.
    ///
    /// An empty input makes no sink calls at all.
    pub async fn load(&self, records: Vec<Record>) -> Result<LoadReport, StageError> {
        self.load_tracked(records, Arc::new(LoaderTracker::new()))
            .await
    }

    /// Loads `records`, reporting progress through `tracker`.
    pub async fn load_tracked(
        &self,
        records: Vec<Record>,
        tracker: Arc<LoaderTracker>,
    ) -> Result<LoadReport, StageError> {
        tracker.advance(LoaderState::Splitting)?;
        if records.is_empty() {
            tracker.advance(LoaderState::AllSent)?;
            return Ok(LoadReport::default());
        }
        let batches = split_batches(records, self.batch_size);

        if self.mode == LoadMode::ReplaceAll {
            let truncate = self.wrap(TruncateStage {
                sink: self.sink.clone(),
                table: self.table.clone(),
            });
            if let Err(err) = truncate.execute(()).await {
                tracker.advance(LoaderState::Failed(0))?;
                return Err(err);
            }
            self.events.emit(LogRecord::info(
                StageKind::Load.as_str(),
                format!("Table {} truncated", self.table),
            ));
        }

        let insert = self.wrap(InsertBatchStage {
            sink: self.sink.clone(),
            table: self.table.clone(),
            tracker: tracker.clone(),
        });

        let mut report = LoadReport::default();
        let mut last = 0;
        for batch in batches {
            let ordinal = batch.ordinal();
            let rows = batch.len();
            tracker.advance(LoaderState::Sending(ordinal))?;

            if let Err(err) = insert.execute(batch).await {
                tracker.advance(LoaderState::Failed(ordinal))?;
                return Err(err);
            }

            last = ordinal;
            report.batches += 1;
            report.rows += rows;
            self.events.emit(LogRecord::info(
                StageKind::Load.as_str(),
                format!("Loaded batch {ordinal}: {rows} rows"),
            ));
        }

        if let Err(err) = self.sink.flush().await {
            tracker.advance(LoaderState::Failed(last))?;
            return Err(err);
        }
        tracker.advance(LoaderState::AllSent)?;
        Ok(report)
    }

    fn wrap<S>(&self, stage: S) -> Instrumented<Retried<S>> {
        Instrumented::new(
            Retried::new(stage, self.policy.clone(), self.events.clone()),
            self.events.clone(),
        )
    }
}

#[async_trait]
impl Stage<Vec<Record>, LoadReport> for BatchLoader {
    fn name(&self) -> &str {
        StageKind::Load.as_str()
    }

    async fn execute(&self, records: Vec<Record>) -> Result<LoadReport, StageError> {
        self.load(records).await
    }
}
