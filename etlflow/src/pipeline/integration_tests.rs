//! End-to-end pipeline scenarios.

#[cfg(test)]
mod tests {
    use crate::config::EtlConfig;
    use crate::core::Record;
    use crate::errors::ErrorKind;
    use crate::events::{CollectingEventSink, LogLevel};
    use crate::extract::SourceSelector;
    use crate::load::{JsonLinesSink, LoadMode, MemorySink, SinkCall, SinkOp};
    use crate::pipeline::EtlPipeline;
    use crate::testing::{order, orders_csv, ScriptedExtractor};
    use crate::transform::RecordSchema;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;

    fn valid_orders(n: usize) -> Vec<Record> {
        (1..=n)
            .map(|i| order(&i.to_string(), "7", "10.00", "2024-05-01 12:00:00"))
            .collect()
    }

    fn insert_sizes(sink: &MemorySink) -> Vec<(usize, usize)> {
        sink.calls()
            .into_iter()
            .filter_map(|c| match c {
                SinkCall::Insert(_, ordinal, rows) => Some((ordinal, rows)),
                _ => None,
            })
            .collect()
    }

    fn pipeline(
        extractor: Arc<ScriptedExtractor>,
        sink: Arc<MemorySink>,
        events: Arc<CollectingEventSink>,
        config: EtlConfig,
    ) -> EtlPipeline {
        EtlPipeline::builder(sink)
            .extractor(extractor)
            .events(events)
            .config(config)
            .build()
            .unwrap()
    }

    fn source() -> SourceSelector {
        SourceSelector::file("orders.csv")
    }

    #[tokio::test]
    async fn test_scenario_a_healthy_load_in_three_batches() {
        let extractor = Arc::new(ScriptedExtractor::new(valid_orders(2500)));
        let sink = Arc::new(MemorySink::new());
        let events = Arc::new(CollectingEventSink::new());
        let pipeline = pipeline(extractor, sink.clone(), events.clone(), EtlConfig::default());

        let report = pipeline.run(&source()).await.unwrap();

        assert_eq!(insert_sizes(&sink), vec![(1, 1000), (2, 1000), (3, 500)]);
        assert_eq!(report.extracted, 2500);
        assert_eq!(report.loaded, 2500);
        assert_eq!(report.batches, 3);
        assert_eq!(report.source, "file:orders.csv");
        assert!(events.at_level(LogLevel::Warning).is_empty());
        assert!(events.at_level(LogLevel::Error).is_empty());

        let lifecycle: Vec<_> = events
            .from_component("run_etl")
            .into_iter()
            .map(|r| r.message)
            .collect();
        assert_eq!(lifecycle, vec!["ETL job start", "ETL job success"]);
    }

    #[tokio::test]
    async fn test_scenario_a_five_records_in_batches_of_two() {
        let extractor = Arc::new(ScriptedExtractor::new(valid_orders(5)));
        let sink = Arc::new(MemorySink::new());
        let events = Arc::new(CollectingEventSink::new());
        let mut config = EtlConfig::default();
        config.load.batch_size = 2;
        let pipeline = pipeline(extractor, sink.clone(), events, config);

        let report = pipeline.run(&source()).await.unwrap();

        assert_eq!(insert_sizes(&sink), vec![(1, 2), (2, 2), (3, 1)]);
        assert_eq!(sink.insert_calls(), 3);
        assert_eq!(sink.rows("orders_etl").len(), 5);
        assert_eq!(report.batches, 3);
        assert_eq!(report.loaded, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scenario_b_transient_extract_failures_back_off() {
        let extractor = Arc::new(ScriptedExtractor::new(valid_orders(3)).failing(2, ErrorKind::Io));
        let sink = Arc::new(MemorySink::new());
        let events = Arc::new(CollectingEventSink::new());
        let pipeline = pipeline(
            extractor.clone(),
            sink.clone(),
            events.clone(),
            EtlConfig::default(),
        );

        let start = tokio::time::Instant::now();
        let report = pipeline.run(&source()).await.unwrap();

        assert!(start.elapsed() >= Duration::from_secs(6));
        assert_eq!(extractor.calls(), 3);
        assert_eq!(report.loaded, 3);

        let warnings: Vec<_> = events
            .at_level(LogLevel::Warning)
            .into_iter()
            .map(|r| r.message)
            .collect();
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].starts_with("extract failed (attempt 1/3)"));
        assert!(warnings[0].ends_with("Retrying in 2.00s..."));
        assert!(warnings[1].starts_with("extract failed (attempt 2/3)"));
        assert!(warnings[1].ends_with("Retrying in 4.00s..."));
    }

    #[tokio::test(start_paused = true)]
    async fn test_scenario_c_exhausted_batch_aborts_run() {
        let extractor = Arc::new(ScriptedExtractor::new(valid_orders(2500)));
        let sink = Arc::new(MemorySink::new().failing(
            SinkOp::InsertBatch(2),
            u32::MAX,
            ErrorKind::Connection,
        ));
        let events = Arc::new(CollectingEventSink::new());
        let pipeline = pipeline(extractor, sink.clone(), events.clone(), EtlConfig::default());

        let err = pipeline.run(&source()).await.unwrap_err();

        assert_eq!(err.stage(), "load");
        assert_eq!(err.kind(), ErrorKind::Connection);
        assert_eq!(
            insert_sizes(&sink),
            vec![(1, 1000), (2, 1000), (2, 1000), (2, 1000)]
        );
        assert_eq!(sink.rows("orders_etl").len(), 1000);

        let errors = events.at_level(LogLevel::Error);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].message.starts_with("load_batch failed after 3 attempts"));
        assert!(errors[1]
            .message
            .starts_with("ETL JOB FAILED: run_etl | stage: load | ConnectionError"));
    }

    #[tokio::test]
    async fn test_scenario_d_empty_extract_succeeds_with_nothing_loaded() {
        let extractor = Arc::new(ScriptedExtractor::new(Vec::new()));
        let sink = Arc::new(MemorySink::new());
        let events = Arc::new(CollectingEventSink::new());
        let pipeline = pipeline(extractor, sink.clone(), events.clone(), EtlConfig::default());

        let report = pipeline.run(&source()).await.unwrap();

        assert_eq!(report.loaded, 0);
        assert_eq!(report.batches, 0);
        assert_eq!(sink.calls(), vec![SinkCall::EnsureSchema("orders_etl".into())]);

        let warnings = events.at_level(LogLevel::Warning);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].message, "No valid data to load");
    }

    #[tokio::test]
    async fn test_scenario_e_ambiguous_source_fails_before_io() {
        let extractor = Arc::new(ScriptedExtractor::new(valid_orders(1)));
        let sink = Arc::new(MemorySink::new());
        let events = Arc::new(CollectingEventSink::new());
        let pipeline = pipeline(extractor.clone(), sink.clone(), events, EtlConfig::default());

        let both = SourceSelector {
            file: Some("orders.csv".into()),
            api: Some("http://localhost/orders".into()),
        };
        let err = pipeline.run(&both).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Config);
        assert_eq!(err.stage(), "extract");
        assert_eq!(extractor.calls(), 0);
        assert!(sink.calls().is_empty());

        let neither = pipeline.run(&SourceSelector::default()).await.unwrap_err();
        assert_eq!(neither.message(), "Must provide --file or --api");
    }

    #[tokio::test]
    async fn test_rejected_rows_are_reported_not_loaded() {
        let mut rows = valid_orders(3);
        rows.insert(1, order("0", "7", "10.00", "2024-05-01"));
        rows.push(order("9", "7", "abc", "2024-05-01"));
        let extractor = Arc::new(ScriptedExtractor::new(rows));
        let sink = Arc::new(MemorySink::new());
        let events = Arc::new(CollectingEventSink::new());
        let pipeline = pipeline(extractor, sink.clone(), events.clone(), EtlConfig::default());

        let report = pipeline.run(&source()).await.unwrap();

        assert_eq!((report.extracted, report.valid, report.rejected), (5, 3, 2));
        assert_eq!(sink.rows("orders_etl").len(), 3);
        let warnings = events.at_level(LogLevel::Warning);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.starts_with("Invalid rows rejected: 2"));
    }

    #[tokio::test]
    async fn test_replace_all_skips_truncate_without_valid_rows() {
        let extractor = Arc::new(ScriptedExtractor::new(vec![order("x", "7", "1", "2024-01-01")]));
        let sink = Arc::new(MemorySink::new());
        let events = Arc::new(CollectingEventSink::new());
        let mut config = EtlConfig::default();
        config.load.mode = LoadMode::ReplaceAll;
        let pipeline = pipeline(extractor, sink.clone(), events, config);

        pipeline.run(&source()).await.unwrap();

        assert!(!sink.calls().iter().any(|c| matches!(c, SinkCall::Truncate(_))));
    }

    #[tokio::test]
    async fn test_concurrent_runs_are_independent() {
        let extractor = Arc::new(ScriptedExtractor::new(valid_orders(5)));
        let sink = Arc::new(MemorySink::new());
        let events = Arc::new(CollectingEventSink::new());
        let mut config = EtlConfig::default();
        config.load.batch_size = 2;
        let pipeline = pipeline(extractor, sink.clone(), events.clone(), config);

        let first = SourceSelector::file("a.csv");
        let second = SourceSelector::file("b.csv");
        let (a, b) = futures::join!(pipeline.run(&first), pipeline.run(&second));
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_ne!(a.run_id, b.run_id);
        assert_eq!(a.batches, 3);
        assert_eq!(b.batches, 3);
        assert_eq!(sink.rows("orders_etl").len(), 10);

        let records = events.records();
        assert!(records.iter().all(|r| r.run_id.is_some()));
        let for_a = records.iter().filter(|r| r.run_id == Some(a.run_id)).count();
        let for_b = records.iter().filter(|r| r.run_id == Some(b.run_id)).count();
        assert_eq!(for_a + for_b, records.len());
        assert_eq!(for_a, for_b);
    }

    #[tokio::test]
    async fn test_csv_file_to_json_lines_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("orders.csv");
        std::fs::write(&input, orders_csv(4, 1)).unwrap();
        let out = dir.path().join("out");

        let mut config = EtlConfig::default();
        config.load.batch_size = 3;
        config.load.mode = LoadMode::ReplaceAll;
        let pipeline = EtlPipeline::builder(Arc::new(JsonLinesSink::new(&out)))
            .events(Arc::new(CollectingEventSink::new()))
            .schema(RecordSchema::orders())
            .config(config)
            .build()
            .unwrap();

        for _ in 0..2 {
            let report = pipeline.run(&SourceSelector::file(&input)).await.unwrap();
            assert_eq!((report.valid, report.rejected, report.batches), (4, 1, 2));
        }

        let written = std::fs::read_to_string(out.join("orders_etl.jsonl")).unwrap();
        assert_eq!(written.lines().count(), 4);
        let first: serde_json::Value =
            serde_json::from_str(written.lines().next().unwrap()).unwrap();
        assert_eq!(first["order_id"], serde_json::json!(1));
        assert_eq!(first["amount"], serde_json::json!(1.5));
        assert!(first["etl_timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_missing_file_fails_in_extract_after_retries() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = EtlConfig::default();
        config.extract_retry = config
            .extract_retry
            .with_base_delay(Duration::from_millis(1));
        let sink = Arc::new(MemorySink::new());
        let events = Arc::new(CollectingEventSink::new());
        let pipeline = EtlPipeline::builder(sink.clone())
            .events(events.clone())
            .config(config)
            .build()
            .unwrap();

        let err = pipeline
            .run(&SourceSelector::file(dir.path().join("absent.csv")))
            .await
            .unwrap_err();

        assert_eq!(err.stage(), "extract");
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(events.at_level(LogLevel::Warning).len(), 2);
        assert_eq!(sink.insert_calls(), 0);
    }
}
