use serde::Deserialize;

/// Default match-service endpoint.
pub const DEFAULT_MATCH_ENDPOINT: &str = "https://api.pubcontext.com/match";

/// Wall-clock budget for the semantic-matching fan-out, in milliseconds.
pub const DEFAULT_MATCH_TIMEOUT_MS: u64 = 2_000;

/// Auction engine bidder timeout, in milliseconds.
pub const DEFAULT_BIDDER_TIMEOUT_MS: u64 = 3_000;

/// Minimum alignment score for a matched creative to influence the floor.
pub const DEFAULT_MIN_ALIGNMENT_SCORE: f64 = 0.80;

/// Root application configuration. Loaded from environment variables
/// with the prefix `ADAGENT__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
}

/// Endpoints of the publisher backend this agent talks to.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_config_url")]
    pub config_url: String,
    /// Impression-report endpoint. Absent disables reporting.
    #[serde(default)]
    pub report_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingConfig {
    /// Deployment-level semantic matching switch; the remote config can still
    /// disable matching even when this is on.
    #[serde(default = "default_matching_enabled")]
    pub enabled: bool,
    #[serde(default = "default_match_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_min_alignment_score")]
    pub min_alignment_score: f64,
}

fn default_config_url() -> String {
    "http://localhost:8080/pubcontext/v1/config".to_string()
}

fn default_matching_enabled() -> bool {
    true
}

fn default_match_timeout_ms() -> u64 {
    DEFAULT_MATCH_TIMEOUT_MS
}

fn default_min_alignment_score() -> f64 {
    DEFAULT_MIN_ALIGNMENT_SCORE
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            config_url: default_config_url(),
            report_url: None,
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            enabled: default_matching_enabled(),
            timeout_ms: default_match_timeout_ms(),
            min_alignment_score: default_min_alignment_score(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            matching: MatchingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("ADAGENT")
                .separator("__")
                .try_parsing(true)
                .list_separator(","),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert!(config.matching.enabled);
        assert_eq!(config.matching.timeout_ms, DEFAULT_MATCH_TIMEOUT_MS);
        assert_eq!(config.matching.min_alignment_score, DEFAULT_MIN_ALIGNMENT_SCORE);
        assert!(config.api.report_url.is_none());
    }
}
