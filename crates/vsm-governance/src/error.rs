use thiserror::Error;
use vsm_core::VsmError;

#[derive(Debug, Error)]
pub enum GovernanceError {
    #[error("policy not found: {0}")]
    PolicyNotFound(String),
    #[error("policy log io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    #[error(transparent)]
    Broker(#[from] vsm_broker::BrokerError),
}

impl From<GovernanceError> for VsmError {
    fn from(err: GovernanceError) -> Self {
        match err {
            GovernanceError::PolicyNotFound(id) => VsmError::NotFound(id),
            GovernanceError::Io(e) => VsmError::Internal(e.to_string()),
            GovernanceError::Serde(e) => VsmError::Internal(e.to_string()),
            GovernanceError::Broker(e) => e.into(),
        }
    }
}
