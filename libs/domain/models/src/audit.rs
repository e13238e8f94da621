use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActorType {
    System,
    Operator,
    Scheduler,
}

/// The action vocabulary from spec.md §6's audit sink description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    MovementIngested,
    MovementDuplicateDetected,
    DuplicateEntrySkipped,
    SessionCreated,
    SessionCompleted,
    SessionExpired,
    DecisionCreated,
    DecisionReconciled,
    DecisionAutoReevaluated,
    EnforcementReviewed,
    PaymentIngested,
    PermitIngested,
    ReconciliationTriggered,
    RuleCreated,
    RuleUpdated,
    RuleEnded,
    RetroactiveUpdateApplied,
    PlateReviewCreated,
    PlateReviewApproved,
    PlateReviewCorrected,
    PlateReviewDiscarded,
}

/// One append-only row per state-changing core action. Audit persistence
/// is an external collaborator (spec.md §1); the core only needs a sink to
/// write into (`anpr_infra_db::AuditSink`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub entity_type: String,
    pub entity_id: String,
    pub action: AuditAction,
    pub actor: String,
    pub actor_type: ActorType,
    pub site_id: Option<String>,
    pub vrm: Option<String>,
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    pub parent_audit_id: Option<Uuid>,
}
