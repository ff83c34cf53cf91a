use thiserror::Error;

/// Failure modes of `Call`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouterError {
    #[error("call timed out after {deadline_ms}ms")]
    Timeout { deadline_ms: u64 },

    #[error("handler reported error: {kind:?} {message}")]
    Nack { kind: vsm_core::HandlerErrorKind, message: String },

    #[error("no binding for target {0}")]
    Unroutable(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("handler for command type {0} is already registered")]
    HandlerAlreadyRegistered(String),
}

impl From<RouterError> for vsm_core::VsmError {
    fn from(e: RouterError) -> Self {
        match e {
            RouterError::Timeout { deadline_ms } => vsm_core::VsmError::Timeout { deadline_ms },
            RouterError::Nack { message, .. } => vsm_core::VsmError::InvalidInput(message),
            RouterError::Unroutable(m) => vsm_core::VsmError::NotFound(m),
            RouterError::Transport(m) => vsm_core::VsmError::Transport(m),
            RouterError::HandlerAlreadyRegistered(m) => vsm_core::VsmError::AlreadyRegistered(m),
        }
    }
}
