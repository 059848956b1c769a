//! Testing utilities for etlflow pipelines.
//!
//! This module provides:
//! - Stages and extractors that fail a scripted number of times
//! - Record fixtures

mod fixtures;
mod mocks;

pub use fixtures::{order, orders_csv, record};
pub use mocks::{FlakyStage, ScriptedExtractor};
