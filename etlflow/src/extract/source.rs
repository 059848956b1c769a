//! Source selection.

use crate::errors::StageError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Where records come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceDescriptor {
    /// A delimited text file with a header row.
    File(PathBuf),
    /// An HTTP endpoint returning a JSON array of objects.
    Api(String),
}

impl fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "file:{}", path.display()),
            Self::Api(url) => write!(f, "api:{url}"),
        }
    }
}

/// Raw, possibly ambiguous source selection as given by a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSelector {
    /// Path of a file source.
    pub file: Option<PathBuf>,
    /// URL of an API source.
    pub api: Option<String>,
}

impl SourceSelector {
    /// Selects a file source.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            file: Some(path.into()),
            api: None,
        }
    }

    /// Selects an API source.
    pub fn api(url: impl Into<String>) -> Self {
        Self {
            file: None,
            api: Some(url.into()),
        }
    }

    /// Resolves the selection to exactly one source.
    ///
    /// Fails with a `Config` error when both or neither selector is set.
    pub fn resolve(&self) -> Result<SourceDescriptor, StageError> {
        match (&self.file, &self.api) {
            (Some(path), None) => Ok(SourceDescriptor::File(path.clone())),
            (None, Some(url)) => Ok(SourceDescriptor::Api(url.clone())),
            (Some(_), Some(_)) => Err(StageError::config(
                "--file and --api are mutually exclusive; provide exactly one",
            )),
            (None, None) => Err(StageError::config("Must provide --file or --api")),
        }
    }
}
