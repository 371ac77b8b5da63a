use std::time::Duration;

use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::config::DashboardSettings;
use crate::queue::{QueuePayload, QueueTree};
use crate::utilization::NodeUtilizationsInfo;

use super::PartitionInfo;

const RETRY_BASE_DELAY_MS: u64 = 250;

#[derive(Debug, thiserror::Error)]
pub enum SchedulerClientError {
    #[error("scheduler request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("scheduler returned HTTP {status}: {body}")]
    HttpStatus { status: StatusCode, body: String },

    #[error("failed to decode {endpoint} response: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl SchedulerClientError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Transport(error) => error.is_timeout() || error.is_connect() || error.is_request(),
            Self::HttpStatus { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
            }
            Self::Decode { .. } | Self::Configuration(_) => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::HttpStatus { status, .. } if *status == StatusCode::NOT_FOUND)
    }
}

/// Read-only client for the scheduler's REST API.
#[derive(Debug, Clone)]
pub struct SchedulerClient {
    http_client: reqwest::Client,
    base_url: String,
    timeout_ms: u64,
    max_retries: u32,
}

impl SchedulerClient {
    pub fn new(settings: &DashboardSettings) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: settings.scheduler_base_url.clone(),
            timeout_ms: settings.request_timeout_ms,
            max_retries: settings.max_retries,
        }
    }

    pub async fn fetch_partitions(&self) -> Result<Vec<PartitionInfo>, SchedulerClientError> {
        self.get_json(&["ws", "v1", "partitions"], "partitions")
            .await
    }

    /// Fetches the queue hierarchy of `partition`; a payload without a root
    /// queue gives an empty tree.
    pub async fn fetch_queue_tree(
        &self,
        partition: &str,
    ) -> Result<QueueTree, SchedulerClientError> {
        let payload: QueuePayload = self
            .get_json(&["ws", "v1", "partition", partition, "queues"], "queues")
            .await?;
        Ok(QueueTree::from_response(&payload))
    }

    pub async fn fetch_node_utilizations(
        &self,
    ) -> Result<Vec<NodeUtilizationsInfo>, SchedulerClientError> {
        self.get_json(
            &["ws", "v1", "scheduler", "node-utilizations"],
            "node-utilizations",
        )
        .await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        endpoint: &'static str,
    ) -> Result<T, SchedulerClientError> {
        let url = self.endpoint_url(segments)?;
        let total_attempts = self.max_retries.saturating_add(1);
        let mut attempt: u32 = 1;

        loop {
            match self.get_once(&url, endpoint).await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    let should_retry = attempt < total_attempts && error.is_retryable();
                    if !should_retry {
                        return Err(error);
                    }

                    let delay_ms = retry_delay_ms(attempt);
                    warn!(
                        endpoint,
                        attempt,
                        total_attempts,
                        delay_ms,
                        error = %error,
                        "scheduler request failed; retrying"
                    );

                    sleep(Duration::from_millis(delay_ms)).await;
                    attempt = attempt.saturating_add(1);
                }
            }
        }
    }

    async fn get_once<T: DeserializeOwned>(
        &self,
        url: &Url,
        endpoint: &'static str,
    ) -> Result<T, SchedulerClientError> {
        let request = async {
            debug!(url = %url, "sending scheduler request");
            let response = self.http_client.get(url.clone()).send().await?;
            let body = ensure_success(response).await?.text().await?;
            serde_json::from_str(&body)
                .map_err(|source| SchedulerClientError::Decode { endpoint, source })
        };

        match timeout(Duration::from_millis(self.timeout_ms), request).await {
            Ok(result) => result,
            Err(_) => Err(SchedulerClientError::Timeout {
                timeout_ms: self.timeout_ms,
            }),
        }
    }

    fn endpoint_url(&self, segments: &[&str]) -> Result<Url, SchedulerClientError> {
        let mut url = Url::parse(&self.base_url).map_err(|error| {
            SchedulerClientError::Configuration(format!(
                "invalid scheduler base URL `{}`: {error}",
                self.base_url
            ))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                SchedulerClientError::Configuration(format!(
                    "scheduler base URL `{}` cannot carry a path",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

fn retry_delay_ms(attempt: u32) -> u64 {
    let exponent = attempt.saturating_sub(1).min(5);
    RETRY_BASE_DELAY_MS.saturating_mul(1_u64 << exponent)
}

async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, SchedulerClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error response body>".to_owned());
    Err(SchedulerClientError::HttpStatus { status, body })
}
