//! VSM Router: Command Router / RPC Layer.

pub mod correlation;
pub mod error;
pub mod handlers;
pub mod router;

pub use correlation::CorrelationTable;
pub use error::RouterError;
pub use handlers::{CommandHandler, HandlerOutcome, HandlerTable};
pub use router::Router;
