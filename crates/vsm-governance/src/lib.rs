//! Level-5 Governance: policy store, viability evaluator, algedonic
//! processor, and the policy synthesis trigger.

pub mod algedonic;
pub mod error;
pub mod governance;
pub mod policy_store;
pub mod synthesizer;
pub mod viability;

pub use algedonic::AlgedonicProcessor;
pub use error::GovernanceError;
pub use governance::Governance;
pub use policy_store::PolicyStore;
pub use synthesizer::PolicySynthesizer;
pub use viability::ViabilityEvaluator;
