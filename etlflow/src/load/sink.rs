//! The sink collaborator.

use super::Batch;
use crate::errors::StageError;
use crate::transform::RecordSchema;
use async_trait::async_trait;

/// Trait for durable record destinations.
///
/// The framework treats `insert` as an opaque, retryable operation. A sink
/// shared by concurrent pipeline runs must serialize internally or be safe
/// for concurrent appends. Failures are expected to be `Connection`,
/// `Constraint` or `Timeout` errors.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Sink: Send + Sync {
    /// Prepares the target for `schema`. Must be idempotent.
    async fn ensure_schema(&self, schema: &RecordSchema) -> Result<(), StageError>;

    /// Removes every row from `table`.
    async fn truncate(&self, table: &str) -> Result<(), StageError>;

    /// Writes one batch to `table`.
    async fn insert(&self, table: &str, batch: &Batch) -> Result<(), StageError>;

    /// Makes accepted batches durable.
    async fn flush(&self) -> Result<(), StageError>;
}
