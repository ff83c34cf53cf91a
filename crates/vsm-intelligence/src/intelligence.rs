//! Level-4 Intelligence: ties environment scanning, anomaly detection, and
//! adaptation proposal generation together behind one handle.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{info, warn};
use vsm_core::{AdaptationProposal, Command, CommandTarget};
use vsm_eventbus::EventBus;
use vsm_router::Router;

use crate::anomaly::{self, AnomalyBuffer, AnomalyEvent};
use crate::proposal::{Challenge, ProposalTracker};
use crate::reasoner::{heuristic_fallback, ReasonerResponse};
use crate::scanner::{ScanDirective, ScanSchedule};

const DEFAULT_REASONER_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Intelligence {
    router: Arc<Router>,
    events: EventBus,
    anomalies: Arc<Mutex<AnomalyBuffer>>,
    proposals: Mutex<ProposalTracker>,
    reasoner_timeout: Duration,
}

impl Intelligence {
    pub fn new(router: Arc<Router>, events: EventBus) -> Self {
        Self {
            router,
            events,
            anomalies: Arc::new(Mutex::new(AnomalyBuffer::new())),
            proposals: Mutex::new(ProposalTracker::new()),
            reasoner_timeout: DEFAULT_REASONER_TIMEOUT,
        }
    }

    pub fn with_reasoner_timeout(mut self, timeout: Duration) -> Self {
        self.reasoner_timeout = timeout;
        self
    }

    /// Start the streaming anomaly detector against the internal bus. Call
    /// once per process; the task runs until the bus is dropped.
    pub fn spawn_anomaly_detector(&self) {
        let bus = self.events.clone();
        let buffer = self.anomalies.clone();
        tokio::spawn(anomaly::run_detector(bus, buffer));
    }

    pub fn spawn_scan_schedule(self: &Arc<Self>, schedule: ScanSchedule) {
        let intelligence = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(schedule.interval);
            loop {
                ticker.tick().await;
                intelligence.scan_environment(schedule.directive.clone()).await;
            }
        });
    }

    /// On-demand or scheduled scan; publishes a scan-complete marker on the
    /// internal bus so subscribers (dashboards, other levels) can observe it.
    pub async fn scan_environment(&self, directive: ScanDirective) {
        info!(scope = %directive.scope, depth = directive.depth, "scanning environment");
        self.events.publish_topic(
            "intelligence.scan.complete",
            serde_json::json!({"scope": directive.scope, "depth": directive.depth, "priority": directive.priority}),
        );
    }

    pub fn recent_anomalies(&self, n: usize) -> Vec<AnomalyEvent> {
        self.anomalies.lock().recent(n)
    }

    pub fn generate_adaptation_proposal(&self, challenge: Challenge) -> AdaptationProposal {
        let proposal = self.proposals.lock().generate(challenge);
        self.events.publish_topic("intelligence.proposal", serde_json::json!({"id": proposal.id}));
        proposal
    }

    pub fn active_proposals(&self) -> Vec<AdaptationProposal> {
        self.proposals.lock().active()
    }

    /// Opaque call to a reasoner agent over the command router. A timeout or
    /// transport failure degrades to a heuristic response rather than
    /// propagating; callers always get an answer, just a less confident one.
    pub async fn delegate_reasoning(&self, prompt: &str, ctx: serde_json::Value) -> ReasonerResponse {
        let command = Command::new(
            "reason",
            CommandTarget::Capability { name: "reason".to_string() },
            serde_json::json!({"prompt": prompt, "ctx": ctx}),
        );

        match self.router.call(command.target.clone(), command, self.reasoner_timeout).await {
            Ok(result) if result.status == vsm_core::ResultStatus::Ok => {
                let text = result
                    .payload
                    .and_then(|p| p.get("text").and_then(|t| t.as_str().map(String::from)))
                    .unwrap_or_else(|| "reasoner returned no text".to_string());
                ReasonerResponse { text, confidence: 1.0 }
            }
            Ok(_) => {
                warn!("reasoner returned a non-ok result, falling back to heuristic");
                heuristic_fallback(prompt)
            }
            Err(err) => {
                warn!(error = %err, "reasoner call failed, falling back to heuristic");
                heuristic_fallback(prompt)
            }
        }
    }

    /// If the algedonic processor detects a pain signal above the critical
    /// threshold, it asks Intelligence for a critical-urgency proposal.
    pub fn request_critical_proposal(&self, rationale: impl Into<String>, scope: impl Into<String>) -> AdaptationProposal {
        self.generate_adaptation_proposal(Challenge {
            urgency: vsm_core::Urgency::Critical,
            scope: scope.into(),
            rationale: rationale.into(),
            required_resources: Default::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vsm_broker::ChannelPool;

    fn intelligence() -> Intelligence {
        let pool = Arc::new(ChannelPool::new("amqp://localhost"));
        let router = Arc::new(Router::new(pool, "s4"));
        Intelligence::new(router, EventBus::new())
    }

    #[tokio::test]
    async fn request_critical_proposal_sets_critical_urgency() {
        let intel = intelligence();
        let proposal = intel.request_critical_proposal("pain spike", "market");
        assert_eq!(proposal.urgency, vsm_core::Urgency::Critical);
    }

    #[tokio::test]
    async fn scan_environment_does_not_panic_without_subscribers() {
        let intel = intelligence();
        intel.scan_environment(ScanDirective::new("regulatory")).await;
    }
}
