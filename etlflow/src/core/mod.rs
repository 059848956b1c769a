//! Core types for etlflow.
//!
//! This module contains the fundamental data types:
//! - `Record` - an ordered field/value mapping flowing between stages
//! - `StageKind` - the identity of each pipeline stage
//! - `PipelineReport` / `LoadReport` - run summaries

mod record;
mod report;
mod status;

pub use record::{column_set, normalize_column, Record};
pub use report::{LoadReport, PipelineReport};
pub use status::StageKind;
