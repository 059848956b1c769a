//! Run summaries.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What the batch loader delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    /// Batches accepted by the sink.
    pub batches: usize,
    /// Rows accepted by the sink.
    pub rows: usize,
}

/// Summary of a successful pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    /// Run identifier, also stamped on every log record of the run.
    pub run_id: Uuid,
    /// The source that was extracted.
    pub source: String,
    /// Records returned by extraction.
    pub extracted: usize,
    /// Records that passed validation.
    pub valid: usize,
    /// Records rejected by validation.
    pub rejected: usize,
    /// Batches loaded.
    pub batches: usize,
    /// Rows loaded.
    pub loaded: usize,
    /// Wall time of the whole run, in seconds.
    pub elapsed_secs: f64,
}
