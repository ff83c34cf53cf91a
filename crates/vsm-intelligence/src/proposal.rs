//! `GenerateAdaptationProposal`: turns a challenge into a categorized,
//! bounded set of active proposals.

use std::collections::VecDeque;

use uuid::Uuid;
use vsm_core::{AdaptationProposal, Urgency};

const DEFAULT_ACTIVE_CAP: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalCategory {
    Incremental,
    Transformational,
    Defensive,
}

#[derive(Debug, Clone)]
pub struct Challenge {
    pub urgency: Urgency,
    /// Broad scope (e.g. "regulatory", "market") drives Transformational over
    /// Incremental at equal urgency.
    pub scope: String,
    pub rationale: String,
    pub required_resources: std::collections::HashMap<String, f64>,
}

pub fn categorize(challenge: &Challenge) -> ProposalCategory {
    match challenge.urgency {
        Urgency::Critical => ProposalCategory::Defensive,
        Urgency::High if challenge.scope == "regulatory" || challenge.scope == "market" => ProposalCategory::Transformational,
        Urgency::High => ProposalCategory::Defensive,
        Urgency::Medium | Urgency::Low => ProposalCategory::Incremental,
    }
}

pub struct ProposalTracker {
    cap: usize,
    active: VecDeque<AdaptationProposal>,
}

impl Default for ProposalTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProposalTracker {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_ACTIVE_CAP)
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self { cap, active: VecDeque::new() }
    }

    pub fn generate(&mut self, challenge: Challenge) -> AdaptationProposal {
        let horizon = match categorize(&challenge) {
            ProposalCategory::Incremental => "short".to_string(),
            ProposalCategory::Transformational => "long".to_string(),
            ProposalCategory::Defensive => "immediate".to_string(),
        };
        let proposal = AdaptationProposal {
            id: Uuid::new_v4(),
            urgency: challenge.urgency,
            required_resources: challenge.required_resources,
            horizon,
            rationale: challenge.rationale,
        };
        if self.active.len() >= self.cap {
            self.active.pop_front();
        }
        self.active.push_back(proposal.clone());
        proposal
    }

    pub fn active(&self) -> Vec<AdaptationProposal> {
        self.active.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn challenge(urgency: Urgency, scope: &str) -> Challenge {
        Challenge { urgency, scope: scope.to_string(), rationale: "test".into(), required_resources: Default::default() }
    }

    #[test]
    fn critical_urgency_is_defensive() {
        assert_eq!(categorize(&challenge(Urgency::Critical, "market")), ProposalCategory::Defensive);
    }

    #[test]
    fn high_regulatory_is_transformational() {
        assert_eq!(categorize(&challenge(Urgency::High, "regulatory")), ProposalCategory::Transformational);
    }

    #[test]
    fn low_urgency_is_incremental() {
        assert_eq!(categorize(&challenge(Urgency::Low, "technological")), ProposalCategory::Incremental);
    }

    #[test]
    fn tracker_bounds_active_proposals() {
        let mut tracker = ProposalTracker::with_capacity(2);
        tracker.generate(challenge(Urgency::Low, "x"));
        tracker.generate(challenge(Urgency::Low, "x"));
        tracker.generate(challenge(Urgency::Low, "x"));
        assert_eq!(tracker.active().len(), 2);
    }
}
