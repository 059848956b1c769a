//! Loader progress tracking.

use crate::errors::StageError;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// Where a single load invocation is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "batch", rename_all = "snake_case")]
pub enum LoaderState {
    /// Nothing has happened yet.
    Idle,
    /// Records are being cut into batches.
    Splitting,
    /// A batch insert attempt is in flight.
    Sending(usize),
    /// The last attempt for a batch failed; the outcome is pending.
    Retrying(usize),
    /// Every batch was accepted.
    AllSent,
    /// A batch failed for good; `0` when the truncate before batch 1 failed.
    /// Earlier batches stay in the sink.
    Failed(usize),
}

impl LoaderState {
    /// Returns true if the state is final.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::AllSent | Self::Failed(_))
    }

    /// Returns true if `next` may follow `self`.
    #[must_use]
    pub fn can_transition_to(&self, next: &Self) -> bool {
        use LoaderState::{AllSent, Failed, Idle, Retrying, Sending, Splitting};

        match (*self, *next) {
            (Idle, Splitting) => true,
            (Splitting, Sending(1) | AllSent | Failed(0)) => true,
            (Sending(n), Sending(m)) => m == n + 1,
            (Sending(n), Retrying(m) | Failed(m)) => m == n,
            (Sending(_), AllSent) => true,
            (Retrying(n), Sending(m) | Failed(m)) => m == n,
            _ => false,
        }
    }
}

impl fmt::Display for LoaderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Splitting => write!(f, "splitting"),
            Self::Sending(n) => write!(f, "sending batch {n}"),
            Self::Retrying(n) => write!(f, "retrying batch {n}"),
            Self::AllSent => write!(f, "all sent"),
            Self::Failed(n) => write!(f, "failed at batch {n}"),
        }
    }
}

/// Tracks the state of one load invocation.
///
/// Owned by a single invocation; concurrent loads each get their own.
#[derive(Debug)]
pub struct LoaderTracker {
    inner: Mutex<Vec<LoaderState>>,
}

impl Default for LoaderTracker {
    fn default() -> Self {
        Self {
            inner: Mutex::new(vec![LoaderState::Idle]),
        }
    }
}

impl LoaderTracker {
    /// Creates a tracker in the `Idle` state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> LoaderState {
        let history = self.inner.lock();
        history.last().copied().unwrap_or(LoaderState::Idle)
    }

    /// Every state visited, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<LoaderState> {
        self.inner.lock().clone()
    }

    /// Moves to `next`, rejecting transitions the loader never makes.
    pub fn advance(&self, next: LoaderState) -> Result<(), StageError> {
        let mut history = self.inner.lock();
        let current = history.last().copied().unwrap_or(LoaderState::Idle);
        if !current.can_transition_to(&next) {
            return Err(StageError::Other(format!(
                "invalid loader transition: {current} -> {next}"
            )));
        }
        debug!(from = %current, to = %next, "loader state transition");
        history.push(next);
        Ok(())
    }
}
