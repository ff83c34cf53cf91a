//! VSM Core: shared data model and error taxonomy.
//!
//! This crate has no behavior of its own; every other crate in the
//! workspace depends on it for the types that cross a component
//! boundary so that two components never invent two
//! slightly different shapes for the same concept.

pub mod envelope;
pub mod error;
pub mod types;

pub use envelope::Envelope;
pub use error::{ErrorKind, VsmError, VsmResult};
pub use types::*;
