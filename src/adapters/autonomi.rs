//! HTTP bridge to the Autonomi directory API.
//!
//! The service exposes four routes under its base URL:
//!
//! - `POST /dirs/upload` (multipart: `directory_path`, `public`)
//! - `POST /dirs/download` (multipart: `destination_path`, `data_map` and/or `public_address`)
//! - `GET /dirs/transactions` (query: `date`, `operation_type`)
//! - `GET /dirs/stats` (query: `days`)
//!
//! Every call is a single request. Nothing is retried or cached, and uploading
//! the same directory twice creates two archives.

use crate::config::ArchiveConfig;
use crate::domain::model::{
    ArchiveOperationResult, OperationType, StatsRecord, TransactionRecord,
};
use crate::domain::ports::ArchiveService;
use crate::utils::error::{InvalidArgumentReason, Result, StorageError};
use crate::utils::validation::Validate;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::multipart::Form;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

const UPLOAD_ROUTE: &str = "/dirs/upload";
const DOWNLOAD_ROUTE: &str = "/dirs/download";
const TRANSACTIONS_ROUTE: &str = "/dirs/transactions";
const STATS_ROUTE: &str = "/dirs/stats";

/// Records from a transactions response. A bare array or a `transactions`
/// array is split into records; any other body is passed through as one record.
fn transaction_records(body: Value) -> Vec<TransactionRecord> {
    match body {
        Value::Null => Vec::new(),
        Value::Array(items) => items.into_iter().map(TransactionRecord).collect(),
        Value::Object(mut object) => match object.remove("transactions") {
            Some(Value::Array(items)) => items.into_iter().map(TransactionRecord).collect(),
            Some(other) => {
                object.insert("transactions".to_string(), other);
                vec![TransactionRecord(Value::Object(object))]
            }
            None => vec![TransactionRecord(Value::Object(object))],
        },
        other => vec![TransactionRecord(other)],
    }
}

#[derive(Debug, Clone)]
pub struct AutonomiBridge {
    base_url: String,
    client: Client,
}

impl AutonomiBridge {
    pub fn new(config: &ArchiveConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| StorageError::ConfigError {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, route: &str) -> String {
        format!("{}{}", self.base_url, route)
    }

    /// Send one request and decode its body as JSON. Only a body that is not
    /// JSON at all is a parse error; its shape is left to the caller.
    async fn send(&self, operation: &'static str, request: RequestBuilder) -> Result<Value> {
        let remote = |e| StorageError::RemoteError {
            operation,
            source: e,
        };

        let response = request.send().await.map_err(remote)?;
        tracing::debug!("Autonomi {} responded with {}", operation, response.status());

        let body = response
            .error_for_status()
            .map_err(remote)?
            .text()
            .await
            .map_err(remote)?;

        serde_json::from_str::<Value>(&body).map_err(|e| StorageError::ResponseParseError {
            operation,
            source: e,
        })
    }
}

/// Query pairs for the transactions route; absent filters are left out entirely.
pub fn transaction_query(
    date: Option<NaiveDate>,
    operation_type: Option<OperationType>,
) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if let Some(date) = date {
        query.push(("date", date.format("%Y-%m-%d").to_string()));
    }
    if let Some(operation_type) = operation_type {
        query.push(("operation_type", operation_type.to_string()));
    }
    query
}

#[async_trait]
impl ArchiveService for AutonomiBridge {
    async fn upload_directory(
        &self,
        directory: &Path,
        is_public: bool,
    ) -> Result<ArchiveOperationResult> {
        let is_dir = tokio::fs::metadata(directory)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(StorageError::InvalidArgument {
                reason: InvalidArgumentReason::NotADirectory(directory.display().to_string()),
            });
        }

        tracing::debug!(
            "Uploading {} to Autonomi ({})",
            directory.display(),
            if is_public { "public" } else { "private" }
        );

        let form = Form::new()
            .text("directory_path", directory.display().to_string())
            .text("public", if is_public { "true" } else { "false" });
        let request = self.client.post(self.url(UPLOAD_ROUTE)).multipart(form);

        Ok(self.send("directory upload", request).await?.into())
    }

    async fn download_directory(
        &self,
        destination: &Path,
        data_map: Option<&str>,
        public_address: Option<&str>,
    ) -> Result<ArchiveOperationResult> {
        let data_map = data_map.filter(|key| !key.is_empty());
        let public_address = public_address.filter(|key| !key.is_empty());
        if data_map.is_none() && public_address.is_none() {
            return Err(StorageError::InvalidArgument {
                reason: InvalidArgumentReason::MissingKey,
            });
        }

        tracing::debug!("Downloading Autonomi archive into {}", destination.display());

        let mut form = Form::new().text("destination_path", destination.display().to_string());
        if let Some(data_map) = data_map {
            form = form.text("data_map", data_map.to_string());
        }
        if let Some(public_address) = public_address {
            form = form.text("public_address", public_address.to_string());
        }
        let request = self.client.post(self.url(DOWNLOAD_ROUTE)).multipart(form);

        Ok(self.send("directory download", request).await?.into())
    }

    async fn list_transactions(
        &self,
        date: Option<NaiveDate>,
        operation_type: Option<OperationType>,
    ) -> Result<Vec<TransactionRecord>> {
        let query = transaction_query(date, operation_type);
        let mut request = self.client.get(self.url(TRANSACTIONS_ROUTE));
        if !query.is_empty() {
            request = request.query(&query);
        }

        let body = self.send("transaction listing", request).await?;
        Ok(transaction_records(body))
    }

    async fn stats(&self, days: u32) -> Result<StatsRecord> {
        let request = self
            .client
            .get(self.url(STATS_ROUTE))
            .query(&[("days", days)]);

        Ok(StatsRecord(self.send("directory stats", request).await?))
    }
}
