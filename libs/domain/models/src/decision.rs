use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionOutcome {
    Compliant,
    EnforcementCandidate,
    RequiresReview,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionStatus {
    New,
    Candidate,
    Approved,
    Declined,
    AutoResolved,
    Exported,
}

impl DecisionStatus {
    /// §3's invariant: `status ∈ {NEW, CANDIDATE}` is the only state in
    /// which an automatic process may overwrite the outcome. Every writer
    /// (rule engine, reconciliation, scheduled re-evaluator, suspension
    /// registry) must consult this before mutating.
    pub fn is_automatically_mutable(&self) -> bool {
        matches!(self, DecisionStatus::New | DecisionStatus::Candidate)
    }
}

/// One current row per `session_id` (enforced by a unique index at the
/// storage layer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub id: Uuid,
    pub session_id: Uuid,
    pub outcome: DecisionOutcome,
    pub rule_applied: String,
    /// Append-only audit trail of re-evaluations; never truncated.
    pub rationale: String,
    pub status: DecisionStatus,
    pub params: Option<serde_json::Value>,
}
