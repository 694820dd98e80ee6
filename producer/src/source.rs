use std::time::Duration;

use async_trait::async_trait;
use reqwest::header;
use tracing::{debug, error};

use crate::error::ProducerError;

/// Where a producer invocation pulls its batch of records from.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetch one batch, returning the raw response body.
    async fn fetch(&self) -> Result<String, ProducerError>;
}

/// A `RecordSource` backed by a single unauthenticated GET request.
pub struct HttpSource {
    url: String,
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(url: &str, request_timeout: Duration) -> Result<Self, reqwest::Error> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent("ingest-producer")
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            url: url.to_owned(),
            client,
        })
    }
}

#[async_trait]
impl RecordSource for HttpSource {
    async fn fetch(&self) -> Result<String, ProducerError> {
        debug!(url = %self.url, "fetching records from source");

        let response = self.client.get(&self.url).send().await.map_err(|e| {
            error!("failed to reach record source: {}", e);
            ProducerError::SourceUnavailable(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            error!("record source responded with {}", status);
            return Err(ProducerError::SourceUnavailable(format!(
                "source responded with {}",
                status
            )));
        }

        response
            .text()
            .await
            .map_err(|e| ProducerError::SourceUnavailable(e.to_string()))
    }
}
