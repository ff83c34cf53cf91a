//! The error taxonomy shared by every VSM subsystem.
//!
//! Every recoverable failure surfaced across a component boundary takes one
//! of these kinds. Components that wrap a lower-level error (broker
//! transport, serialization) fold it into `VsmError::Internal` or
//! `VsmError::Transport` rather than leaking the underlying type.

use thiserror::Error;

/// The canonical error kind carried in a `Result` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    Unauthorized,
    Unavailable,
    Timeout,
    InsufficientResources,
    NotFound,
    AlreadyRegistered,
    RecursionLimitExceeded,
    AlreadyInProgress,
    Internal,
    Transport,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::Timeout => "timeout",
            ErrorKind::InsufficientResources => "insufficient_resources",
            ErrorKind::NotFound => "not_found",
            ErrorKind::AlreadyRegistered => "already_registered",
            ErrorKind::RecursionLimitExceeded => "recursion_limit_exceeded",
            ErrorKind::AlreadyInProgress => "already_in_progress",
            ErrorKind::Internal => "internal",
            ErrorKind::Transport => "transport",
        }
    }
}

/// The crate-wide error type. Every subsystem error implements `From<VsmError>`
/// conversions into its own local error enum where local context helps, but
/// all of them can be flattened to this shape at an RPC boundary.
#[derive(Debug, Error)]
pub enum VsmError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("timeout after {deadline_ms}ms")]
    Timeout { deadline_ms: u64 },

    #[error("insufficient resources: {0}")]
    InsufficientResources(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already registered: {0}")]
    AlreadyRegistered(String),

    #[error("recursion limit exceeded: depth {depth} > max {max}")]
    RecursionLimitExceeded { depth: u32, max: u32 },

    #[error("already in progress: {0}")]
    AlreadyInProgress(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("transport error: {0}")]
    Transport(String),
}

impl VsmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VsmError::InvalidInput(_) => ErrorKind::InvalidInput,
            VsmError::Unauthorized(_) => ErrorKind::Unauthorized,
            VsmError::Unavailable(_) => ErrorKind::Unavailable,
            VsmError::Timeout { .. } => ErrorKind::Timeout,
            VsmError::InsufficientResources(_) => ErrorKind::InsufficientResources,
            VsmError::NotFound(_) => ErrorKind::NotFound,
            VsmError::AlreadyRegistered(_) => ErrorKind::AlreadyRegistered,
            VsmError::RecursionLimitExceeded { .. } => ErrorKind::RecursionLimitExceeded,
            VsmError::AlreadyInProgress(_) => ErrorKind::AlreadyInProgress,
            VsmError::Internal(_) => ErrorKind::Internal,
            VsmError::Transport(_) => ErrorKind::Transport,
        }
    }
}

pub type VsmResult<T> = std::result::Result<T, VsmError>;
