use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Inference call timed out")]
    Timeout,

    #[error("Inference service error: {0}")]
    Service(String),

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("Invalid scenario: {0}")]
    InvalidScenario(String),

    #[error("Agent not found: {0:?}")]
    AgentNotFound(crate::core::types::AgentId),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, SimError>;
