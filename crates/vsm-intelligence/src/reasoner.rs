//! The pluggable reasoner seam: `DelegateReasoning` calls out to a reasoner
//! agent over the command router. Absence of a reasoner must never crash
//! Intelligence; callers fall back to a heuristic response instead.

#[derive(Debug, Clone)]
pub struct ReasonerResponse {
    pub text: String,
    /// 1.0 for a genuine reasoner reply, lowered when a heuristic fallback
    /// stood in for a timed-out or absent reasoner.
    pub confidence: f64,
}

pub fn heuristic_fallback(prompt: &str) -> ReasonerResponse {
    ReasonerResponse {
        text: format!("heuristic: unable to reason about '{prompt}', falling back to built-in rule"),
        confidence: 0.3,
    }
}
