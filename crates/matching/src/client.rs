//! HTTP client for the Pubcontext match API.

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use adagent_core::types::{MatchResult, PubcontextSettings};
use adagent_core::{AdAgentError, AdAgentResult};

const USER_AGENT: &str = concat!("adagent/", env!("CARGO_PKG_VERSION"));

/// One match call's payload: the placement being auctioned plus the page
/// signal snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct MatchRequest {
    pub placement_id: String,
    pub page_url: String,
    pub referrer: String,
    pub context: serde_json::Value,
}

/// Boundary trait for the match service, so orchestration can be exercised
/// against scripted transports. The endpoint settings come from the remote
/// configuration, per call, because they are not known until it is fetched.
#[async_trait]
pub trait MatchTransport: Send + Sync {
    async fn match_placement(
        &self,
        settings: &PubcontextSettings,
        request: &MatchRequest,
    ) -> AdAgentResult<MatchResult>;
}

/// Production transport: POSTs to the configured match endpoint with bearer
/// auth when an API key is present.
pub struct PubcontextClient {
    http: reqwest::Client,
}

impl PubcontextClient {
    pub fn new() -> AdAgentResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AdAgentError::Match(e.to_string()))?;

        Ok(Self { http })
    }
}

#[async_trait]
impl MatchTransport for PubcontextClient {
    async fn match_placement(
        &self,
        settings: &PubcontextSettings,
        request: &MatchRequest,
    ) -> AdAgentResult<MatchResult> {
        let mut builder = self.http.post(&settings.endpoint).json(request);
        if let Some(key) = &settings.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| AdAgentError::Match(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AdAgentError::Match(format!(
                "match API returned {status} for placement {}",
                request.placement_id
            )));
        }

        let mut result: MatchResult = response
            .json()
            .await
            .map_err(|e| AdAgentError::Match(e.to_string()))?;

        if result.placement_id.is_empty() {
            result.placement_id = request.placement_id.clone();
        }

        debug!(
            placement_id = %result.placement_id,
            creatives = result.matched_creatives.len(),
            "match response received"
        );

        Ok(result)
    }
}
