//! Viability Evaluator: a composite score in `[0,1]` blending four weighted
//! inputs, nudged by incoming algedonic signals.

use parking_lot::RwLock;
use vsm_core::AlgedonicKind;

const WEIGHT_POLICY_COHERENCE: f64 = 0.25;
const WEIGHT_RESOURCE_EFFICIENCY: f64 = 0.25;
const WEIGHT_COORDINATION: f64 = 0.25;
const WEIGHT_PAIN_PLEASURE: f64 = 0.25;

struct Inputs {
    policy_coherence: f64,
    resource_efficiency: f64,
    coordination_effectiveness: f64,
    pain_pleasure_balance: f64,
}

impl Default for Inputs {
    fn default() -> Self {
        Self {
            policy_coherence: 1.0,
            resource_efficiency: 1.0,
            coordination_effectiveness: 1.0,
            pain_pleasure_balance: 0.5,
        }
    }
}

pub struct ViabilityEvaluator {
    inputs: RwLock<Inputs>,
}

impl Default for ViabilityEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl ViabilityEvaluator {
    pub fn new() -> Self {
        Self { inputs: RwLock::new(Inputs::default()) }
    }

    pub fn score(&self) -> f64 {
        let inputs = self.inputs.read();
        (inputs.policy_coherence * WEIGHT_POLICY_COHERENCE
            + inputs.resource_efficiency * WEIGHT_RESOURCE_EFFICIENCY
            + inputs.coordination_effectiveness * WEIGHT_COORDINATION
            + inputs.pain_pleasure_balance * WEIGHT_PAIN_PLEASURE)
            .clamp(0.0, 1.0)
    }

    pub fn set_policy_coherence(&self, value: f64) {
        self.inputs.write().policy_coherence = value.clamp(0.0, 1.0);
    }

    pub fn set_resource_efficiency(&self, value: f64) {
        self.inputs.write().resource_efficiency = value.clamp(0.0, 1.0);
    }

    pub fn set_coordination_effectiveness(&self, value: f64) {
        self.inputs.write().coordination_effectiveness = value.clamp(0.0, 1.0);
    }

    /// Pain decreases the balance proportional to intensity AND how
    /// frequently pain has shown up recently (`recent_pain_frequency`, a
    /// `[0,1]` fraction the caller derives from its own signal history) — a
    /// single sharp pain spike moves the score less than the same spike
    /// arriving after a run of other pain signals. Pleasure increases the
    /// balance by intensity alone; frequency of pleasure isn't penalized.
    /// Both directions clamp back into `[0,1]`.
    pub fn update_from_signal(&self, kind: AlgedonicKind, intensity: f64, recent_pain_frequency: f64) {
        let intensity = intensity.clamp(0.0, 1.0);
        let recent_pain_frequency = recent_pain_frequency.clamp(0.0, 1.0);
        let mut inputs = self.inputs.write();
        inputs.pain_pleasure_balance = match kind {
            AlgedonicKind::Pain => {
                let weighted = intensity * (1.0 + recent_pain_frequency);
                (inputs.pain_pleasure_balance - weighted * 0.5).clamp(0.0, 1.0)
            }
            AlgedonicKind::Pleasure => (inputs.pain_pleasure_balance + intensity * 0.5).clamp(0.0, 1.0),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_score_reflects_neutral_inputs() {
        let evaluator = ViabilityEvaluator::new();
        assert!((evaluator.score() - 0.875).abs() < 1e-9);
    }

    #[test]
    fn pain_lowers_score() {
        let evaluator = ViabilityEvaluator::new();
        let before = evaluator.score();
        evaluator.update_from_signal(AlgedonicKind::Pain, 1.0, 0.0);
        assert!(evaluator.score() < before);
    }

    #[test]
    fn pleasure_raises_score() {
        let evaluator = ViabilityEvaluator::new();
        evaluator.update_from_signal(AlgedonicKind::Pain, 0.8, 0.0);
        let lowered = evaluator.score();
        evaluator.update_from_signal(AlgedonicKind::Pleasure, 0.8, 0.0);
        assert!(evaluator.score() > lowered);
    }

    #[test]
    fn frequent_pain_weighs_more_than_an_isolated_spike() {
        let isolated = ViabilityEvaluator::new();
        isolated.update_from_signal(AlgedonicKind::Pain, 0.5, 0.0);

        let frequent = ViabilityEvaluator::new();
        frequent.update_from_signal(AlgedonicKind::Pain, 0.5, 1.0);

        assert!(frequent.score() < isolated.score());
    }

    #[test]
    fn score_never_leaves_unit_interval() {
        let evaluator = ViabilityEvaluator::new();
        for _ in 0..10 {
            evaluator.update_from_signal(AlgedonicKind::Pain, 1.0, 1.0);
        }
        assert!(evaluator.score() >= 0.0);
    }
}
