//! Stage identities.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The three stages of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Acquires raw records from a source.
    Extract,
    /// Coerces and validates records against a schema.
    Transform,
    /// Writes validated records to a sink in batches.
    Load,
}

impl StageKind {
    /// Returns the stage name used in logs and errors.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Extract => "extract",
            Self::Transform => "transform",
            Self::Load => "load",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
