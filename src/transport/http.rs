//! HTTP transport posting batches to the ingestion endpoint.

use super::{DeliveryFuture, Transport, TransportError};
use crate::config::BufferConfig;
use crate::record::ActionBatch;
use std::time::Duration;
use tracing::debug;

/// POSTs `{"actions": [...]}` as JSON; any non-2xx status is a failure.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    /// `timeout` bounds each request; `None` lets a request hang as long as
    /// the server keeps the connection open.
    pub fn new(endpoint: impl Into<String>, timeout: Option<Duration>) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(HttpTransport {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn from_config(config: &BufferConfig) -> Result<Self, TransportError> {
        let timeout = (!config.delivery_timeout.is_zero()).then_some(config.delivery_timeout);
        Self::new(config.endpoint.clone(), timeout)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Transport for HttpTransport {
    fn deliver<'a>(&'a self, batch: &'a ActionBatch) -> DeliveryFuture<'a> {
        Box::pin(async move {
            let body = batch.to_json_bytes()?;
            let response = self
                .client
                .post(&self.endpoint)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body)
                .send()
                .await
                .map_err(|e| TransportError::Request(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(TransportError::Status(status.as_u16()));
            }
            debug!("Posted {} actions to {} ({})", batch.len(), self.endpoint, status);
            Ok(())
        })
    }
}
