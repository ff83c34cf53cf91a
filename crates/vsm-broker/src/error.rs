use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("broker unavailable: {0}")]
    Unavailable(String),

    #[error("lease for purpose {0} was invalidated by a reconnect; re-acquire")]
    LeaseInvalidated(String),

    #[error("purpose {0} is already checked out")]
    PurposeBusy(String),

    #[error("lapin error: {0}")]
    Lapin(#[from] lapin::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<BrokerError> for vsm_core::VsmError {
    fn from(e: BrokerError) -> Self {
        match e {
            BrokerError::Unavailable(m) => vsm_core::VsmError::Unavailable(m),
            BrokerError::LeaseInvalidated(m) => vsm_core::VsmError::Unavailable(format!("lease invalidated: {m}")),
            BrokerError::PurposeBusy(m) => vsm_core::VsmError::AlreadyInProgress(m),
            BrokerError::Lapin(err) => vsm_core::VsmError::Transport(err.to_string()),
            BrokerError::Serde(err) => vsm_core::VsmError::Internal(err.to_string()),
        }
    }
}
