//! JSON-over-HTTP extraction.

use super::{Extractor, SourceDescriptor};
use crate::core::Record;
use crate::errors::StageError;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetches records from an HTTP endpoint with a `GET` request.
///
/// The body must be a JSON array of objects, or a single object which is
/// treated as one record. Non-2xx statuses fail with an `Http` error.
#[derive(Debug, Clone)]
pub struct HttpJsonExtractor {
    timeout: Duration,
    user_agent: String,
}

impl Default for HttpJsonExtractor {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: concat!("etlflow/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpJsonExtractor {
    /// Creates an extractor with a 10 second request timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn fetch(&self, url: &str) -> Result<Vec<Record>, StageError> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(&self.user_agent)
            .build()
            .map_err(|e| StageError::config(format!("failed to create HTTP client: {e}")))?;

        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StageError::Http(format!("GET {url} returned {status}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| StageError::parse(format!("GET {url}: invalid JSON body: {e}")))?;
        records_from_body(body).map_err(|msg| StageError::parse(format!("GET {url}: {msg}")))
    }
}

fn transport_error(url: &str, err: &reqwest::Error) -> StageError {
    if err.is_builder() {
        StageError::config(format!("invalid request for {url}: {err}"))
    } else if err.is_timeout() {
        StageError::timeout(format!("GET {url} timed out: {err}"))
    } else if err.is_connect() {
        StageError::connection(format!("GET {url}: {err}"))
    } else {
        StageError::Http(format!("GET {url}: {err}"))
    }
}

fn records_from_body(body: Value) -> Result<Vec<Record>, String> {
    match body {
        Value::Object(map) => Ok(vec![map]),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Object(map) => Ok(map),
                other => Err(format!("element {i} is not an object: {other}")),
            })
            .collect(),
        _ => Err("response must be a JSON array of objects or a single object".to_string()),
    }
}

#[async_trait]
impl Extractor for HttpJsonExtractor {
    async fn extract(&self, source: &SourceDescriptor) -> Result<Vec<Record>, StageError> {
        match source {
            SourceDescriptor::Api(url) => self.fetch(url).await,
            other => Err(StageError::config(format!(
                "HTTP extractor cannot read {other}"
            ))),
        }
    }
}
