//! Down-amplifiers: expand a higher-level directive into N context-specialized
//! variants for the level below.

use serde::{Deserialize, Serialize};
use vsm_eventbus::EventBus;

use crate::boundary::Boundary;

const DEFAULT_FACTOR: u32 = 3;
const MIN_FACTOR: u32 = 1;
const MAX_FACTOR: u32 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Directive {
    pub scope: String,
    pub target: String,
    pub priority: u8,
    pub body: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    pub variant_index: u32,
    pub scope: String,
    pub target: String,
    pub priority: u8,
    pub body: serde_json::Value,
}

pub struct DownAmplifier {
    boundary: Boundary,
    factor: u32,
    events: EventBus,
}

impl DownAmplifier {
    pub fn new(boundary: Boundary, events: EventBus) -> Self {
        Self { boundary, factor: DEFAULT_FACTOR, events }
    }

    pub fn with_factor(mut self, factor: u32) -> Self {
        self.factor = factor.clamp(MIN_FACTOR, MAX_FACTOR);
        self
    }

    pub fn factor(&self) -> u32 {
        self.factor
    }

    /// Nudge the amplification factor within `[1,10]`, used by the imbalance
    /// monitor to amplify more or less aggressively.
    pub fn bump_factor(&mut self, delta: i32) {
        self.factor = ((self.factor as i32 + delta).clamp(MIN_FACTOR as i32, MAX_FACTOR as i32)) as u32;
    }

    /// Specializes `directive` into `factor` variants, each tagged with its
    /// index so downstream consumers can distinguish them, and publishes the
    /// batch on the internal bus for the level below to pick up.
    pub fn amplify(&self, directive: &Directive) -> Vec<Variant> {
        let variants: Vec<Variant> = (0..self.factor)
            .map(|i| Variant {
                variant_index: i,
                scope: directive.scope.clone(),
                target: directive.target.clone(),
                priority: directive.priority,
                body: directive.body.clone(),
            })
            .collect();

        self.events.publish_topic(
            format!("variety.amplify.{:?}", self.boundary),
            serde_json::json!({"count": variants.len(), "scope": directive.scope}),
        );
        variants
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directive() -> Directive {
        Directive { scope: "market".into(), target: "s3".into(), priority: 5, body: serde_json::json!({}) }
    }

    #[test]
    fn default_factor_produces_three_variants() {
        let amplifier = DownAmplifier::new(Boundary::S4S5, EventBus::new());
        assert_eq!(amplifier.amplify(&directive()).len(), 3);
    }

    #[test]
    fn factor_clamps_to_bounds() {
        let amplifier = DownAmplifier::new(Boundary::S4S5, EventBus::new()).with_factor(50);
        assert_eq!(amplifier.factor(), 10);
        let amplifier = DownAmplifier::new(Boundary::S4S5, EventBus::new()).with_factor(0);
        assert_eq!(amplifier.factor(), 1);
    }

    #[test]
    fn variants_carry_distinct_indices() {
        let amplifier = DownAmplifier::new(Boundary::S3S4, EventBus::new()).with_factor(4);
        let indices: Vec<u32> = amplifier.amplify(&directive()).iter().map(|v| v.variant_index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }
}
