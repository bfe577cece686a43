//! Publisher-backend endpoints: remote configuration fetch and the
//! fire-and-forget impression reporter.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use adagent_core::event_bus::EventSink;
use adagent_core::types::{DeliveryEvent, EventType, RemoteConfig};
use adagent_core::{AdAgentError, AdAgentResult};

/// Source of the remote configuration snapshot (placement catalog, auction
/// parameters, match-service settings). Fetched once per page load.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn fetch(&self) -> AdAgentResult<RemoteConfig>;
}

/// Fetches configuration from the publisher backend over HTTP.
pub struct HttpConfigSource {
    http: reqwest::Client,
    url: String,
}

impl HttpConfigSource {
    pub fn new(url: impl Into<String>) -> AdAgentResult<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| AdAgentError::ConfigFetch(e.to_string()))?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ConfigSource for HttpConfigSource {
    async fn fetch(&self) -> AdAgentResult<RemoteConfig> {
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| AdAgentError::ConfigFetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AdAgentError::ConfigFetch(format!(
                "config endpoint returned {status}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AdAgentError::ConfigFetch(e.to_string()))
    }
}

/// In-memory configuration source for tests and local harnesses.
pub struct StaticConfigSource {
    config: RemoteConfig,
}

impl StaticConfigSource {
    pub fn new(config: RemoteConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ConfigSource for StaticConfigSource {
    async fn fetch(&self) -> AdAgentResult<RemoteConfig> {
        Ok(self.config.clone())
    }
}

#[derive(Serialize)]
struct ImpressionReport<'a> {
    placement_id: &'a str,
    winning_bid: f64,
    winning_bidder: &'a str,
}

/// Event sink that forwards impressions to the publisher backend.
///
/// Best-effort by contract: the POST runs on a detached task and a failure is
/// logged once, never retried, never surfaced to the auction control flow.
pub struct ReportSink {
    http: reqwest::Client,
    endpoint: String,
}

impl ReportSink {
    pub fn new(endpoint: impl Into<String>) -> AdAgentResult<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| AdAgentError::Internal(anyhow::anyhow!(e)))?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }
}

impl EventSink for ReportSink {
    fn emit(&self, event: DeliveryEvent) {
        if event.event_type != EventType::Impression {
            debug!(event_type = ?event.event_type, placement_id = %event.placement_id, "delivery event");
            return;
        }

        let request = self.http.post(&self.endpoint).json(&ImpressionReport {
            placement_id: &event.placement_id,
            winning_bid: event.winning_bid.unwrap_or(0.0),
            winning_bidder: event.winning_bidder.as_deref().unwrap_or(""),
        });
        let placement_id = event.placement_id;

        tokio::spawn(async move {
            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    metrics::counter!("report.impressions").increment(1);
                }
                Ok(response) => {
                    warn!(
                        placement_id = %placement_id,
                        status = %response.status(),
                        "impression report rejected"
                    );
                    metrics::counter!("report.failures").increment(1);
                }
                Err(e) => {
                    warn!(placement_id = %placement_id, error = %e, "impression report failed");
                    metrics::counter!("report.failures").increment(1);
                }
            }
        });
    }
}
