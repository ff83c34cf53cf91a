//! VSM Agent Runtime Contract.

pub mod capability;
pub mod error;
pub mod runtime;

pub use capability::{CapabilityHandler, CapabilityTable};
pub use error::AgentError;
pub use runtime::{AgentConfig, AgentRuntime};
