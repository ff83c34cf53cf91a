//! Maps failures to the operator-facing exit codes.

pub const SUCCESS: i32 = 0;
pub const GENERIC_ERROR: i32 = 1;
pub const CONFIG_ERROR: i32 = 2;
pub const BROKER_UNAVAILABLE: i32 = 3;
pub const PRECONDITION_FAILED: i32 = 4;

pub fn from_vsm_error(err: &vsm_core::VsmError) -> i32 {
    use vsm_core::VsmError;
    match err {
        VsmError::Unavailable(_) | VsmError::Transport(_) => BROKER_UNAVAILABLE,
        VsmError::AlreadyRegistered(_) | VsmError::AlreadyInProgress(_) | VsmError::RecursionLimitExceeded { .. } => PRECONDITION_FAILED,
        _ => GENERIC_ERROR,
    }
}
