//! Delimited text file extraction.

use super::{Extractor, SourceDescriptor};
use crate::core::Record;
use crate::errors::StageError;
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

/// Reads a delimited text file with a header row.
///
/// Quoted fields may span lines. Blank lines are skipped and empty fields
/// become `null`. Rows with fewer fields than the header are padded with
/// `null`; rows with more are a parse error.
#[derive(Debug, Clone)]
pub struct CsvFileExtractor {
    delimiter: u8,
}

impl Default for CsvFileExtractor {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

impl CsvFileExtractor {
    /// Creates a comma-delimited extractor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the field delimiter.
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    async fn read(&self, path: &Path) -> Result<Vec<Record>, StageError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| StageError::io(format!("reading {}", path.display()), e))?;
        self.parse(&content)
            .map_err(|msg| StageError::parse(format!("{}: {msg}", path.display())))
    }

    /// Parses file content into records.
    fn parse(&self, content: &str) -> Result<Vec<Record>, String> {
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(false)
            .flexible(true)
            .from_reader(content.as_bytes());

        let mut rows = reader
            .records()
            .filter(|row| !matches!(row, Ok(row) if is_blank(row)));

        let header = rows
            .next()
            .ok_or("file has no header row")?
            .map_err(|e| e.to_string())?;
        let headers: Vec<String> = header.iter().map(|h| h.trim().to_string()).collect();

        let mut records = Vec::new();
        for row in rows {
            let row = row.map_err(|e| e.to_string())?;
            if row.len() > headers.len() {
                let line = row.position().map_or(0, csv::Position::line);
                return Err(format!(
                    "line {line}: expected {} fields, found {}",
                    headers.len(),
                    row.len()
                ));
            }

            let mut record = Record::new();
            for (i, header) in headers.iter().enumerate() {
                let value = match row.get(i) {
                    Some(field) if !field.is_empty() => Value::String(field.to_string()),
                    _ => Value::Null,
                };
                record.insert(header.clone(), value);
            }
            records.push(record);
        }
        Ok(records)
    }
}

fn is_blank(row: &csv::StringRecord) -> bool {
    row.iter().all(|field| field.trim().is_empty())
}

#[async_trait]
impl Extractor for CsvFileExtractor {
    async fn extract(&self, source: &SourceDescriptor) -> Result<Vec<Record>, StageError> {
        match source {
            SourceDescriptor::File(path) => self.read(path).await,
            other => Err(StageError::config(format!(
                "file extractor cannot read {other}"
            ))),
        }
    }
}
