use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("agent {0} is already registered")]
    AlreadyRegistered(String),

    #[error("agent {0} not found")]
    NotFound(String),
}

impl From<RegistryError> for vsm_core::VsmError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::AlreadyRegistered(id) => vsm_core::VsmError::AlreadyRegistered(id),
            RegistryError::NotFound(id) => vsm_core::VsmError::NotFound(id),
        }
    }
}
