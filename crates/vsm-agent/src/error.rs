use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("broker error: {0}")]
    Broker(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("lapin error: {0}")]
    Lapin(#[from] lapin::Error),
}

impl From<vsm_broker::BrokerError> for AgentError {
    fn from(e: vsm_broker::BrokerError) -> Self {
        AgentError::Broker(e.to_string())
    }
}
