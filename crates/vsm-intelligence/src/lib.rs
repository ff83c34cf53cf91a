//! Level-4 Intelligence: environment scanning, anomaly detection, and
//! adaptation proposal generation, with a pluggable reasoner delegation seam.

pub mod anomaly;
pub mod error;
pub mod intelligence;
pub mod proposal;
pub mod reasoner;
pub mod scanner;

pub use anomaly::{AnomalyBuffer, AnomalyEvent};
pub use error::IntelligenceError;
pub use intelligence::Intelligence;
pub use proposal::{Challenge, ProposalCategory, ProposalTracker};
pub use reasoner::{heuristic_fallback, ReasonerResponse};
pub use scanner::{ScanDirective, ScanSchedule};
