use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SupervisorError {
    #[error("agent {0} not found")]
    NotFound(String),

    #[error("agent {0} already running")]
    AlreadyRunning(String),

    #[error("agent {0} exceeded its restart budget and was given up on")]
    RestartBudgetExceeded(String),
}

impl From<SupervisorError> for vsm_core::VsmError {
    fn from(e: SupervisorError) -> Self {
        match e {
            SupervisorError::NotFound(id) => vsm_core::VsmError::NotFound(id),
            SupervisorError::AlreadyRunning(id) => vsm_core::VsmError::AlreadyRegistered(id),
            SupervisorError::RestartBudgetExceeded(id) => {
                vsm_core::VsmError::Internal(format!("restart budget exceeded for {id}"))
            }
        }
    }
}
