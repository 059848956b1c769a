//! Stage wrappers.
//!
//! Wrappers implement [`Stage`](crate::stages::Stage) themselves, so
//! reliability behaviors compose by construction:
//! `Instrumented::new(Retried::new(stage, policy, events), events)` times the
//! whole retry span, while `Retried::new(Instrumented::new(stage, ..), ..)`
//! times each attempt separately.

mod retry;
mod timing;

pub use retry::Retried;
pub use timing::Instrumented;
