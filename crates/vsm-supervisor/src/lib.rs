//! VSM Agent Supervisor.

pub mod error;
pub mod supervisor;

pub use error::SupervisorError;
pub use supervisor::{AgentFactory, Supervisor};
