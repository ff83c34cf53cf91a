//! Variety Engineering: adjacent-level up-filters and down-amplifiers
//! implementing Ashby's law, plus an entropy-based imbalance monitor.

pub mod amplifier;
pub mod boundary;
pub mod filter;
pub mod metrics;
pub mod variety;

pub use amplifier::{DownAmplifier, Directive, Variant};
pub use boundary::Boundary;
pub use filter::{Summary, UpFilter};
pub use metrics::{ImbalanceMonitor, Nudge, VarietyMetrics};
pub use variety::VarietyEngine;
