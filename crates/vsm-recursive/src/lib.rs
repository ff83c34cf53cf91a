//! Recursive Meta-System Protocol: bounded meta-VSM spawning and the
//! `vsm.recursive` addressing scheme.

pub mod error;
pub mod protocol;
pub mod registry;

pub use error::RecursiveError;
pub use protocol::RecursiveProtocol;
pub use registry::MetaVsmRegistry;
