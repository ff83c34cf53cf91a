use thiserror::Error;
use vsm_core::VsmError;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("unknown coordination topic: {0}")]
    UnknownTopic(String),
    #[error(transparent)]
    Broker(#[from] vsm_broker::BrokerError),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

impl From<CoordinatorError> for VsmError {
    fn from(err: CoordinatorError) -> Self {
        match err {
            CoordinatorError::UnknownTopic(topic) => VsmError::NotFound(topic),
            CoordinatorError::Broker(e) => e.into(),
            CoordinatorError::Serde(e) => VsmError::Internal(e.to_string()),
        }
    }
}
