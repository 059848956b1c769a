//! The pipeline orchestrator.

use super::{JobGuard, RetryConfig};
use crate::config::EtlConfig;
use crate::core::{PipelineReport, StageKind};
use crate::errors::{ConfigError, PipelineError, StageFailure, StageResultExt};
use crate::events::{EventSink, LogRecord, RunScopedSink, TracingEventSink};
use crate::extract::{ExtractStage, Extractor, SourceExtractor, SourceSelector};
use crate::interceptors::{Instrumented, Retried};
use crate::load::{BatchLoader, EnsureSchemaStage, Sink};
use crate::observability::SpanTimer;
use crate::stages::Stage;
use crate::transform::{RecordSchema, TransformStage};
use std::num::NonZeroUsize;
use std::sync::Arc;
use uuid::Uuid;

/// Default job name, used in failure messages.
pub const DEFAULT_JOB_NAME: &str = "run_etl";

/// An extract → transform → load pipeline.
///
/// Each call to [`run`](Self::run) is an independent invocation with its own
/// run id, retry state and loader state; one pipeline may be run
/// concurrently for several sources.
pub struct EtlPipeline {
    name: String,
    extractor: Arc<dyn Extractor>,
    sink: Arc<dyn Sink>,
    schema: Arc<RecordSchema>,
    batch_size: NonZeroUsize,
    config: EtlConfig,
    events: Arc<dyn EventSink>,
}

impl std::fmt::Debug for EtlPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EtlPipeline")
            .field("name", &self.name)
            .field("schema", &self.schema.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl EtlPipeline {
    /// Starts building a pipeline writing to `sink`.
    pub fn builder(sink: Arc<dyn Sink>) -> EtlPipelineBuilder {
        EtlPipelineBuilder::new(sink)
    }

    /// The job name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The target schema.
    #[must_use]
    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    /// The effective configuration.
    #[must_use]
    pub fn config(&self) -> &EtlConfig {
        &self.config
    }

    /// Runs the pipeline once for `source`.
    ///
    /// Source selection is checked before any I/O, so an ambiguous or
    /// missing source fails without touching the sink. An empty set of
    /// valid records succeeds with nothing loaded.
    pub async fn run(&self, source: &SourceSelector) -> Result<PipelineReport, PipelineError> {
        let run_id = Uuid::new_v4();
        let events: Arc<dyn EventSink> = Arc::new(RunScopedSink::new(self.events.clone(), run_id));
        let guard = JobGuard::new(&self.name, events.clone());
        guard.run(self.execute(source, run_id, events)).await
    }

    async fn execute(
        &self,
        selector: &SourceSelector,
        run_id: Uuid,
        events: Arc<dyn EventSink>,
    ) -> Result<PipelineReport, StageFailure> {
        let timer = SpanTimer::start(&self.name);
        events.emit(LogRecord::info(&self.name, "ETL job start"));

        let source = selector.resolve().in_stage(StageKind::Extract.as_str())?;

        let ensure_schema =
            Instrumented::new(EnsureSchemaStage::new(self.sink.clone()), events.clone());
        ensure_schema
            .execute(self.schema.clone())
            .await
            .in_stage(ensure_schema.name())?;

        let extract = timed_retried(
            ExtractStage::new(self.extractor.clone(), events.clone()),
            self.config.extract_retry.clone(),
            &events,
        );
        let records = extract
            .execute(source.clone())
            .await
            .in_stage(extract.name())?;
        let extracted = records.len();

        let transform = Instrumented::new(
            TransformStage::new(self.schema.clone(), events.clone()),
            events.clone(),
        );
        let set = transform.execute(records).await.in_stage(transform.name())?;

        let mut report = PipelineReport {
            run_id,
            source: source.to_string(),
            extracted,
            valid: set.valid.len(),
            rejected: set.rejected.len(),
            batches: 0,
            loaded: 0,
            elapsed_secs: 0.0,
        };

        if set.valid.is_empty() {
            events.emit(LogRecord::warning(&self.name, "No valid data to load"));
            report.elapsed_secs = timer.elapsed_secs();
            return Ok(report);
        }

        let loader = Instrumented::new(
            BatchLoader::new(self.sink.clone(), self.schema.table(), events.clone())
                .with_batch_size(self.batch_size)
                .with_mode(self.config.load.mode)
                .with_retry(self.config.retry.clone()),
            events.clone(),
        );
        let loaded = loader.execute(set.valid).await.in_stage(loader.name())?;

        report.batches = loaded.batches;
        report.loaded = loaded.rows;
        let elapsed = timer.finish();
        report.elapsed_secs = elapsed.as_secs_f64();
        events.emit(LogRecord::info(&self.name, "ETL job success").with_elapsed(elapsed));
        Ok(report)
    }
}

fn timed_retried<S>(
    stage: S,
    policy: RetryConfig,
    events: &Arc<dyn EventSink>,
) -> Instrumented<Retried<S>> {
    Instrumented::new(Retried::new(stage, policy, events.clone()), events.clone())
}

/// Builder for [`EtlPipeline`].
pub struct EtlPipelineBuilder {
    name: String,
    extractor: Option<Arc<dyn Extractor>>,
    sink: Arc<dyn Sink>,
    schema: RecordSchema,
    config: EtlConfig,
    events: Arc<dyn EventSink>,
}

impl EtlPipelineBuilder {
    /// Creates a builder with the orders schema and default configuration.
    pub fn new(sink: Arc<dyn Sink>) -> Self {
        Self {
            name: DEFAULT_JOB_NAME.to_string(),
            extractor: None,
            sink,
            schema: RecordSchema::orders(),
            config: EtlConfig::default(),
            events: Arc::new(TracingEventSink),
        }
    }

    /// Sets the job name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Replaces the built-in file/API extractor.
    #[must_use]
    pub fn extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Sets the target schema.
    #[must_use]
    pub fn schema(mut self, schema: RecordSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: EtlConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the logging collaborator.
    #[must_use]
    pub fn events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Validates the configuration and builds the pipeline.
    pub fn build(self) -> Result<EtlPipeline, ConfigError> {
        self.config.validate()?;
        let batch_size = self.config.load.batch_size()?;
        if self.schema.fields().is_empty() {
            return Err(ConfigError::invalid("schema", "must declare at least one field"));
        }

        let extractor = match self.extractor {
            Some(extractor) => extractor,
            None => Arc::new(default_extractor(&self.config)),
        };

        Ok(EtlPipeline {
            name: self.name,
            extractor,
            sink: self.sink,
            schema: Arc::new(self.schema),
            batch_size,
            config: self.config,
            events: self.events,
        })
    }
}

#[cfg(feature = "http")]
fn default_extractor(config: &EtlConfig) -> SourceExtractor {
    use crate::extract::HttpJsonExtractor;

    SourceExtractor::new().with_http(HttpJsonExtractor::new().with_timeout(config.http.timeout()))
}

#[cfg(not(feature = "http"))]
fn default_extractor(_config: &EtlConfig) -> SourceExtractor {
    SourceExtractor::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::MemorySink;

    #[test]
    fn test_builder_validates_config() {
        let mut config = EtlConfig::default();
        config.load.batch_size = 0;

        let err = EtlPipeline::builder(Arc::new(MemorySink::new()))
            .config(config)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "load", .. }));
    }

    #[test]
    fn test_builder_rejects_empty_schema() {
        let err = EtlPipeline::builder(Arc::new(MemorySink::new()))
            .schema(RecordSchema::new("empty", "empty"))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "schema", .. }));
    }

    #[test]
    fn test_builder_defaults() {
        let pipeline = EtlPipeline::builder(Arc::new(MemorySink::new()))
            .build()
            .unwrap();
        assert_eq!(pipeline.name(), DEFAULT_JOB_NAME);
        assert_eq!(pipeline.schema().table(), "orders_etl");
        assert_eq!(pipeline.config(), &EtlConfig::default());
    }
}
