//! JSON-lines file sink.

use super::{Batch, Sink};
use crate::errors::StageError;
use crate::transform::RecordSchema;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

const ETL_TIMESTAMP: &str = "etl_timestamp";

/// Appends accepted batches to `<dir>/<table>.jsonl`.
///
/// Each row gets an `etl_timestamp` field with the time its batch was
/// written. Writes are serialized, so one sink may be shared by concurrent
/// pipeline runs.
#[derive(Debug)]
pub struct JsonLinesSink {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLinesSink {
    /// Creates a sink writing under `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// The file backing `table`.
    #[must_use]
    pub fn table_path(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{table}.jsonl"))
    }

    async fn append(&self, path: &Path, content: &[u8]) -> Result<(), StageError> {
        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| StageError::io(format!("opening {}", path.display()), e))?;
        file.write_all(content)
            .await
            .map_err(|e| StageError::io(format!("writing {}", path.display()), e))?;
        file.flush()
            .await
            .map_err(|e| StageError::io(format!("flushing {}", path.display()), e))
    }
}

#[async_trait]
impl Sink for JsonLinesSink {
    async fn ensure_schema(&self, schema: &RecordSchema) -> Result<(), StageError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StageError::io(format!("creating {}", self.dir.display()), e))?;
        self.append(&self.table_path(schema.table()), b"").await
    }

    async fn truncate(&self, table: &str) -> Result<(), StageError> {
        let path = self.table_path(table);
        let _guard = self.write_lock.lock().await;
        tokio::fs::write(&path, b"")
            .await
            .map_err(|e| StageError::io(format!("truncating {}", path.display()), e))
    }

    async fn insert(&self, table: &str, batch: &Batch) -> Result<(), StageError> {
        let stamp = Value::String(Utc::now().format("%Y-%m-%d %H:%M:%S").to_string());
        let mut content = Vec::new();
        for row in batch.rows() {
            let mut row = row.clone();
            row.insert(ETL_TIMESTAMP.to_string(), stamp.clone());
            serde_json::to_writer(&mut content, &row).map_err(|e| {
                StageError::constraint(format!(
                    "batch {}: unserializable row: {e}",
                    batch.ordinal()
                ))
            })?;
            content.push(b'\n');
        }
        self.append(&self.table_path(table), &content).await
    }

    /// Inserts are written through; nothing is buffered.
    async fn flush(&self) -> Result<(), StageError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Record;
    use crate::errors::ErrorKind;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn batch(ordinal: usize, ids: &[i64]) -> Batch {
        let rows = ids
            .iter()
            .map(|id| {
                let mut r = Record::new();
                r.insert("order_id".into(), json!(id));
                r
            })
            .collect();
        Batch::new(ordinal, rows)
    }

    async fn read_lines(path: &Path) -> Vec<Value> {
        tokio::fs::read_to_string(path)
            .await
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_ensure_schema_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonLinesSink::new(dir.path().join("out"));

        sink.ensure_schema(&RecordSchema::orders()).await.unwrap();
        sink.ensure_schema(&RecordSchema::orders()).await.unwrap();

        let path = sink.table_path("orders_etl");
        assert!(path.exists());
        assert!(read_lines(&path).await.is_empty());
    }

    #[tokio::test]
    async fn test_insert_appends_rows_with_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonLinesSink::new(dir.path());

        sink.insert("orders_etl", &batch(1, &[1, 2])).await.unwrap();
        sink.insert("orders_etl", &batch(2, &[3])).await.unwrap();

        let lines = read_lines(&sink.table_path("orders_etl")).await;
        let ids: Vec<_> = lines.iter().map(|l| l["order_id"].clone()).collect();
        assert_eq!(ids, vec![json!(1), json!(2), json!(3)]);
        assert!(lines.iter().all(|l| l[ETL_TIMESTAMP].is_string()));

        let keys: Vec<_> = lines[0].as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["order_id", ETL_TIMESTAMP]);
    }

    #[tokio::test]
    async fn test_truncate_empties_table() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonLinesSink::new(dir.path());

        sink.insert("expenses", &batch(1, &[1])).await.unwrap();
        sink.truncate("expenses").await.unwrap();
        sink.insert("expenses", &batch(1, &[2])).await.unwrap();

        let lines = read_lines(&sink.table_path("expenses")).await;
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["order_id"], json!(2));
    }

    #[tokio::test]
    async fn test_missing_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonLinesSink::new(dir.path().join("absent"));

        let err = sink.insert("orders_etl", &batch(1, &[1])).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
