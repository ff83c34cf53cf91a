use thiserror::Error;
use vsm_core::VsmError;

#[derive(Debug, Error)]
pub enum IntelligenceError {
    #[error("no reasoner configured")]
    NoReasoner,
    #[error(transparent)]
    Router(#[from] vsm_router::RouterError),
}

impl From<IntelligenceError> for VsmError {
    fn from(err: IntelligenceError) -> Self {
        match err {
            IntelligenceError::NoReasoner => VsmError::Unavailable("no reasoner agent registered".into()),
            IntelligenceError::Router(e) => e.into(),
        }
    }
}
