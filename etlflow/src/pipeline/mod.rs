//! Pipeline execution.
//!
//! This module provides:
//! - The retry engine with geometric backoff
//! - The job guard classifying run failures
//! - The extract → transform → load orchestrator

mod guard;
mod orchestrator;
mod retry;

mod integration_tests;

pub use guard::JobGuard;
pub use orchestrator::{EtlPipeline, EtlPipelineBuilder, DEFAULT_JOB_NAME};
pub use retry::{with_retry, RetryConfig, RetryDecision, RetryState, RetryableError};
