use thiserror::Error;
use vsm_core::VsmError;

#[derive(Debug, Error)]
pub enum RecursiveError {
    #[error("recursion limit exceeded: depth {depth} > max {max}")]
    RecursionLimitExceeded { depth: u32, max: u32 },
    #[error("unknown meta-vsm identity: {0}")]
    UnknownIdentity(String),
    #[error(transparent)]
    Broker(#[from] vsm_broker::BrokerError),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

impl From<RecursiveError> for VsmError {
    fn from(err: RecursiveError) -> Self {
        match err {
            RecursiveError::RecursionLimitExceeded { depth, max } => VsmError::RecursionLimitExceeded { depth, max },
            RecursiveError::UnknownIdentity(id) => VsmError::NotFound(id),
            RecursiveError::Broker(e) => e.into(),
            RecursiveError::Serde(e) => VsmError::Internal(e.to_string()),
        }
    }
}
