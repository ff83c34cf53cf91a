//! VSM Broker: connection lifecycle, per-purpose channel pool, and topology
//! declaration.

pub mod backoff;
pub mod error;
pub mod pool;
pub mod topology;

pub use backoff::Backoff;
pub use error::BrokerError;
pub use pool::{AckDecision, ChannelPool, Lease};
pub use topology::{ExchangeKindSpec, ExchangeSpec, TopologyDeclarator, EXCHANGES};
