use thiserror::Error;

pub type AdAgentResult<T> = Result<T, AdAgentError>;

#[derive(Error, Debug)]
pub enum AdAgentError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration fetch error: {0}")]
    ConfigFetch(String),

    #[error("Match service error: {0}")]
    Match(String),

    #[error("Auction engine error: {0}")]
    Engine(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Auction already in flight")]
    AuctionInFlight,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
