use thiserror::Error;
use vsm_core::VsmError;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("insufficient resources for request")]
    Insufficient,
    #[error("allocation not found: {0}")]
    AllocationNotFound(uuid::Uuid),
    #[error(transparent)]
    Router(#[from] vsm_router::RouterError),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

impl From<ControlError> for VsmError {
    fn from(err: ControlError) -> Self {
        match err {
            ControlError::Insufficient => VsmError::InsufficientResources("resource pool exhausted".into()),
            ControlError::AllocationNotFound(id) => VsmError::NotFound(id.to_string()),
            ControlError::Router(e) => VsmError::Transport(e.to_string()),
            ControlError::Serde(e) => VsmError::Internal(e.to_string()),
        }
    }
}
