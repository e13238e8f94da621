//! Reconciliation Service (C5) and Scheduled Re-evaluator (C6). Pure
//! selection and write-policy logic; the repository scans (by vrm/site,
//! by outcome/status, oldest-first batches) and the actual updates live in
//! `anpr-infra-db`. This crate decides, for a session whose Rule Engine
//! verdict has just been recomputed, whether the existing decision may be
//! overwritten and what the new rationale should read.

use anpr_domain_models::{Decision, Session};
use anpr_domain_rules::{append_rationale, may_overwrite, RationaleSuffix, Verdict};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// True when a completed session's `[startTime, endTime]` interval
/// overlaps `[start, expiry]` — the target-selection test for
/// `onPayment` (spec.md §4.5).
pub fn session_overlaps(session: &Session, start: DateTime<Utc>, expiry: DateTime<Utc>) -> bool {
    let Some(end_time) = session.end_time else {
        return false;
    };
    session.start_time <= expiry && end_time >= start
}

/// The result of attempting to apply a freshly computed verdict to an
/// existing decision.
pub enum ReconciliationResult {
    /// The decision was frozen (human-reviewed) or the outcome did not
    /// change; nothing was written.
    Unchanged,
    /// The decision's outcome, rule and rationale should be rewritten to
    /// these values. The caller persists this and records a per-change
    /// audit entry.
    Updated {
        outcome: anpr_domain_models::DecisionOutcome,
        rule_applied: String,
        rationale: String,
        params: Option<serde_json::Value>,
    },
}

/// Applies §4.4's write semantics: frozen decisions are returned
/// unchanged; otherwise the new verdict replaces the old one only when
/// the outcome actually changed, with the rationale annotated by
/// `suffix_kind` to preserve the prior text as an audit trail.
pub fn reconcile_decision(
    existing: &Decision,
    verdict: &Verdict,
    suffix_kind: RationaleSuffix,
    suffix_detail: &str,
) -> ReconciliationResult {
    if !may_overwrite(existing) {
        return ReconciliationResult::Unchanged;
    }
    if existing.outcome == verdict.outcome && existing.rule_applied == verdict.rule_applied {
        return ReconciliationResult::Unchanged;
    }
    ReconciliationResult::Updated {
        outcome: verdict.outcome,
        rule_applied: verdict.rule_applied.to_string(),
        rationale: append_rationale(&existing.rationale, suffix_kind, suffix_detail),
        params: verdict.params.clone(),
    }
}

/// Summary returned by `onPayment`/`onPermit`/`onSite` (spec.md §4.5).
#[derive(Debug, Clone, Default)]
pub struct ReconciliationSummary {
    pub sessions_reevaluated: usize,
    pub decisions_updated: usize,
}

impl ReconciliationSummary {
    pub fn record(&mut self, result: &ReconciliationResult) {
        self.sessions_reevaluated += 1;
        if matches!(result, ReconciliationResult::Updated { .. }) {
            self.decisions_updated += 1;
        }
    }
}

/// Summary returned by the scheduled re-evaluator (C6): a batch-level
/// count plus per-item failures, since the scan is best-effort and one
/// bad row must not abort the rest.
#[derive(Debug, Clone, Default)]
pub struct ScheduledReevaluationSummary {
    pub processed: usize,
    pub updated: usize,
    pub errors: Vec<(Uuid, String)>,
}

impl ScheduledReevaluationSummary {
    pub fn record_processed(&mut self, updated: bool) {
        self.processed += 1;
        if updated {
            self.updated += 1;
        }
    }

    pub fn record_error(&mut self, decision_id: Uuid, message: String) {
        self.errors.push((decision_id, message));
    }
}

/// C6's batch cap: at most 500 candidate decisions per scheduled tick.
pub const SCHEDULED_REEVALUATION_BATCH_LIMIT: usize = 500;

#[cfg(test)]
mod tests {
    use super::*;
    use anpr_domain_models::{DecisionOutcome, DecisionStatus, SessionStatus};
    use chrono::TimeZone;

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, hour, 0, 0).unwrap()
    }

    fn completed_session(start: DateTime<Utc>, end: DateTime<Utc>) -> Session {
        Session {
            id: Uuid::new_v4(),
            site_id: "S1".into(),
            vrm: "AB12CDE".into(),
            start_time: start,
            end_time: Some(end),
            duration_minutes: Some((end - start).num_minutes()),
            entry_movement_id: Uuid::new_v4(),
            exit_movement_id: Some(Uuid::new_v4()),
            status: SessionStatus::Completed,
        }
    }

    fn decision(outcome: DecisionOutcome, status: DecisionStatus, rule: &str) -> Decision {
        Decision {
            id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            outcome,
            rule_applied: rule.into(),
            rationale: "initial".into(),
            status,
            params: None,
        }
    }

    #[test]
    fn overlapping_session_is_selected() {
        let session = completed_session(ts(10), ts(12));
        assert!(session_overlaps(&session, ts(11), ts(13)));
    }

    #[test]
    fn non_overlapping_session_is_not_selected() {
        let session = completed_session(ts(10), ts(12));
        assert!(!session_overlaps(&session, ts(13), ts(14)));
    }

    #[test]
    fn frozen_decision_is_never_reconciled() {
        let existing = decision(
            DecisionOutcome::EnforcementCandidate,
            DecisionStatus::Approved,
            "NO_VALID_PAYMENT",
        );
        let verdict = Verdict {
            outcome: DecisionOutcome::Compliant,
            rule_applied: "VALID_PAYMENT",
            rationale: "fresh".into(),
            params: None,
        };
        let result = reconcile_decision(&existing, &verdict, RationaleSuffix::Reconciled, "payment 1");
        assert!(matches!(result, ReconciliationResult::Unchanged));
    }

    #[test]
    fn mutable_decision_with_changed_outcome_is_updated() {
        let existing = decision(
            DecisionOutcome::EnforcementCandidate,
            DecisionStatus::New,
            "NO_VALID_PAYMENT",
        );
        let verdict = Verdict {
            outcome: DecisionOutcome::Compliant,
            rule_applied: "VALID_PAYMENT",
            rationale: "fresh".into(),
            params: None,
        };
        let result = reconcile_decision(&existing, &verdict, RationaleSuffix::Reconciled, "payment 1");
        match result {
            ReconciliationResult::Updated { outcome, rationale, .. } => {
                assert_eq!(outcome, DecisionOutcome::Compliant);
                assert!(rationale.contains("RECONCILED"));
            }
            ReconciliationResult::Unchanged => panic!("expected an update"),
        }
    }

    #[test]
    fn mutable_decision_with_unchanged_outcome_is_left_alone() {
        let existing = decision(
            DecisionOutcome::EnforcementCandidate,
            DecisionStatus::Candidate,
            "NO_VALID_PAYMENT",
        );
        let verdict = Verdict {
            outcome: DecisionOutcome::EnforcementCandidate,
            rule_applied: "NO_VALID_PAYMENT",
            rationale: "fresh".into(),
            params: None,
        };
        let result = reconcile_decision(&existing, &verdict, RationaleSuffix::AutoReevaluated, "scheduled tick");
        assert!(matches!(result, ReconciliationResult::Unchanged));
    }
}
