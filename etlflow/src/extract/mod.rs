//! Source acquisition.
//!
//! An [`Extractor`] turns a [`SourceDescriptor`] into raw records. The
//! [`ExtractStage`] adapts any extractor into a pipeline stage that reports
//! what it extracted; the orchestrator wraps it with timing and retry.

mod csv;
#[cfg(feature = "http")]
mod http;
mod source;

pub use csv::CsvFileExtractor;
#[cfg(feature = "http")]
pub use http::HttpJsonExtractor;
pub use source::{SourceDescriptor, SourceSelector};

use crate::core::{column_set, Record, StageKind};
use crate::errors::StageError;
use crate::events::{EventSink, LogRecord};
use crate::stages::Stage;
use async_trait::async_trait;
use std::sync::Arc;

/// Trait for record sources.
///
/// Implementations fail with `Config`, `Io`, `Parse` (or, for network
/// sources, `Http`/`Timeout`) errors. A source that cannot be read must fail;
/// it must never report an empty result instead.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Reads every record from `source`.
    async fn extract(&self, source: &SourceDescriptor) -> Result<Vec<Record>, StageError>;
}

/// Dispatches each descriptor to the matching built-in extractor.
#[derive(Debug, Clone, Default)]
pub struct SourceExtractor {
    csv: CsvFileExtractor,
    #[cfg(feature = "http")]
    http: HttpJsonExtractor,
}

impl SourceExtractor {
    /// Creates an extractor with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the CSV extractor.
    #[must_use]
    pub fn with_csv(mut self, csv: CsvFileExtractor) -> Self {
        self.csv = csv;
        self
    }

    /// Replaces the HTTP extractor.
    #[cfg(feature = "http")]
    #[must_use]
    pub fn with_http(mut self, http: HttpJsonExtractor) -> Self {
        self.http = http;
        self
    }
}

#[async_trait]
impl Extractor for SourceExtractor {
    async fn extract(&self, source: &SourceDescriptor) -> Result<Vec<Record>, StageError> {
        match source {
            SourceDescriptor::File(_) => self.csv.extract(source).await,
            #[cfg(feature = "http")]
            SourceDescriptor::Api(_) => self.http.extract(source).await,
            #[cfg(not(feature = "http"))]
            SourceDescriptor::Api(url) => Err(StageError::config(format!(
                "cannot fetch {url}: built without the `http` feature"
            ))),
        }
    }
}

/// The extract stage.
pub struct ExtractStage {
    extractor: Arc<dyn Extractor>,
    events: Arc<dyn EventSink>,
}

impl ExtractStage {
    /// Creates the stage around an extractor.
    #[must_use]
    pub fn new(extractor: Arc<dyn Extractor>, events: Arc<dyn EventSink>) -> Self {
        Self { extractor, events }
    }
}

#[async_trait]
impl Stage<SourceDescriptor, Vec<Record>> for ExtractStage {
    fn name(&self) -> &str {
        StageKind::Extract.as_str()
    }

    async fn execute(&self, source: SourceDescriptor) -> Result<Vec<Record>, StageError> {
        self.events
            .emit(LogRecord::info(self.name(), format!("Extracting {source}")));

        let records = self.extractor.extract(&source).await?;

        self.events.emit(LogRecord::info(
            self.name(),
            format!(
                "Extracted {} rows | columns: {:?}",
                records.len(),
                column_set(&records)
            ),
        ));
        Ok(records)
    }
}
