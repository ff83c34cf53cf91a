//! Level-3 Control: resource pools with conflict resolution and emergency
//! reallocation, plus the Level-3* audit bypass channel.

pub mod audit;
pub mod error;
pub mod pools;

pub use audit::AuditChannel;
pub use error::ControlError;
pub use pools::{AllocationRequest, ConflictRecord, OptimizationArea, ResourcePools};
