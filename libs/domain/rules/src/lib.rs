//! Rule Engine (C4): a fixed ordered cascade, first match wins. Pure and
//! deterministic — every input (permits, payments, suspension state) is
//! supplied by the caller in `EvaluationContext`; nothing here touches the
//! database or the clock except through the explicit `now` parameter used
//! by the "incomplete session" clause.

use anpr_core_grace_math::{
    duration_minutes, mandatory_end as compute_mandatory_end, mandatory_start as compute_mandatory_start,
    overstay_minutes, within_short_stay_grace, GracePeriods,
};
use anpr_domain_models::{Decision, DecisionOutcome, EnforcementType, Payment, Permit, Session};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Everything the cascade needs besides the session itself. The caller
/// (ingestion/reconciliation/scheduled re-evaluator in the app layer)
/// assembles this from the repositories.
pub struct EvaluationContext<'a> {
    pub site_id: &'a str,
    pub grace: GracePeriods,
    pub enforcement_type: EnforcementType,
    /// True when the most-recent active suspension for this site covers
    /// the session's start time (already resolved by C7's registry).
    pub suspension_active: bool,
    /// Permits that could apply to this vrm, global or site-scoped.
    pub permits: &'a [Permit],
    /// Payments for this `(vrm, site)`, any order.
    pub payments: &'a [Payment],
    /// Whether any payment has ever been recorded at this site (used by
    /// the AUTO enforcement model in clause 7).
    pub site_has_historical_payments: bool,
}

#[derive(Debug, Clone)]
pub struct Verdict {
    pub outcome: DecisionOutcome,
    pub rule_applied: &'static str,
    pub rationale: String,
    pub params: Option<serde_json::Value>,
}

/// Runs the ordered cascade from spec.md §4.4 against a session. `now` is
/// only consulted for the "incomplete session" clause (3), when
/// `session.end_time` is `None`.
pub fn evaluate(session: &Session, ctx: &EvaluationContext, now: DateTime<Utc>) -> Verdict {
    // 1. Enforcement suspended.
    if ctx.suspension_active {
        return Verdict {
            outcome: DecisionOutcome::Compliant,
            rule_applied: "ENFORCEMENT_DISABLED",
            rationale: "Active enforcement suspension covers this session's start time".into(),
            params: None,
        };
    }

    // 2. Valid permit. Payments are not consulted if this matches.
    if ctx
        .permits
        .iter()
        .any(|permit| permit.applies_at(ctx.site_id, session.start_time))
    {
        return Verdict {
            outcome: DecisionOutcome::Compliant,
            rule_applied: "VALID_PERMIT",
            rationale: "An active permit applies at the session's start time".into(),
            params: None,
        };
    }

    // 3. Incomplete session.
    let Some(end_time) = session.end_time else {
        let duration = duration_minutes(session.start_time, now);
        return if within_short_stay_grace(duration, &ctx.grace) {
            Verdict {
                outcome: DecisionOutcome::Compliant,
                rule_applied: "WITHIN_GRACE",
                rationale: "Session is still open but within the combined grace window".into(),
                params: None,
            }
        } else {
            Verdict {
                outcome: DecisionOutcome::RequiresReview,
                rule_applied: "INCOMPLETE_SESSION",
                rationale: "Session has no exit movement and exceeds the combined grace window".into(),
                params: None,
            }
        };
    };

    let duration = session
        .duration_minutes
        .unwrap_or_else(|| duration_minutes(session.start_time, end_time));
    let mandatory_start = compute_mandatory_start(session.start_time, &ctx.grace);
    let mandatory_end = compute_mandatory_end(end_time, &ctx.grace);

    // 4. Single covering payment.
    if ctx
        .payments
        .iter()
        .any(|payment| payment.fully_covers(mandatory_start, mandatory_end))
    {
        return Verdict {
            outcome: DecisionOutcome::Compliant,
            rule_applied: "VALID_PAYMENT",
            rationale: "A payment covers the mandatory window (with grace)".into(),
            params: None,
        };
    }

    // 5. Short stay.
    if within_short_stay_grace(duration, &ctx.grace) {
        return Verdict {
            outcome: DecisionOutcome::Compliant,
            rule_applied: "WITHIN_GRACE",
            rationale: "Session duration is within the combined grace window".into(),
            params: None,
        };
    }

    // 6. Overstay: a payment that covers part of the stay but expired before exit.
    let partial_payment = ctx.payments.iter().find(|payment| {
        payment.start_time <= mandatory_end
            && payment.expiry_time > mandatory_start
            && payment.expiry_time < mandatory_end
    });
    if let Some(payment) = partial_payment {
        let over = overstay_minutes(mandatory_end, payment.expiry_time);
        return if over > ctx.grace.overstay_minutes {
            Verdict {
                outcome: DecisionOutcome::EnforcementCandidate,
                rule_applied: "OVERSTAY",
                rationale: format!(
                    "Payment {} expired {} minutes before the mandatory window ended",
                    payment.id, over
                ),
                params: Some(serde_json::json!({
                    "overstayMinutes": over,
                    "overstayThreshold": ctx.grace.overstay_minutes,
                    "paymentId": payment.id,
                })),
            }
        } else {
            Verdict {
                outcome: DecisionOutcome::Compliant,
                rule_applied: "OVERSTAY_WITHIN_GRACE",
                rationale: format!(
                    "Payment {} expired {} minutes early, within the overstay grace threshold",
                    payment.id, over
                ),
                params: None,
            }
        };
    }

    // 7. Unauthorised.
    let rule_applied = match ctx.enforcement_type {
        EnforcementType::PayAndDisplay | EnforcementType::Mixed => "NO_VALID_PAYMENT",
        EnforcementType::PermitOnly => "UNAUTHORISED_PARKING",
        EnforcementType::Auto => {
            if ctx.site_has_historical_payments {
                "NO_VALID_PAYMENT"
            } else {
                "UNAUTHORISED_PARKING"
            }
        }
    };
    Verdict {
        outcome: DecisionOutcome::EnforcementCandidate,
        rule_applied,
        rationale: "No suspension, permit or payment covers this session".into(),
        params: None,
    }
}

/// §4.4's write-semantics guard: an existing decision may only be mutated
/// in place while its status is still automatically mutable. Every writer
/// (ingestion, reconciliation, scheduled re-evaluator, suspension registry)
/// consults this before applying a fresh `Verdict`.
pub fn may_overwrite(existing: &Decision) -> bool {
    existing.status.is_automatically_mutable()
}

/// Appends a reconciliation/re-evaluation marker to an existing rationale,
/// preserving the prior text as an audit trail (spec.md §4.4).
pub fn append_rationale(existing: &str, suffix_kind: RationaleSuffix, detail: &str) -> String {
    let tag = match suffix_kind {
        RationaleSuffix::Reconciled => "RECONCILED",
        RationaleSuffix::AutoReevaluated => "AUTO_REEVALUATED",
    };
    format!("{existing} | {tag}: {detail}")
}

#[derive(Debug, Clone, Copy)]
pub enum RationaleSuffix {
    Reconciled,
    AutoReevaluated,
}

/// A uniqueness-respecting identifier helper for callers constructing a
/// brand-new `Decision` from a `Verdict`.
pub fn new_decision_id() -> Uuid {
    Uuid::new_v4()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anpr_domain_models::{DecisionStatus, PermitScope, PermitType, SessionStatus};
    use chrono::TimeZone;

    fn ts(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, hour, minute, 0).unwrap()
    }

    fn session(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Session {
        let duration_minutes = end.map(|e| (e - start).num_minutes());
        Session {
            id: Uuid::new_v4(),
            site_id: "S1".into(),
            vrm: "AB12CDE".into(),
            start_time: start,
            end_time: end,
            duration_minutes,
            entry_movement_id: Uuid::new_v4(),
            exit_movement_id: None,
            status: if end.is_some() {
                SessionStatus::Completed
            } else {
                SessionStatus::Provisional
            },
        }
    }

    fn base_ctx<'a>(permits: &'a [Permit], payments: &'a [Payment]) -> EvaluationContext<'a> {
        EvaluationContext {
            site_id: "S1",
            grace: GracePeriods::default(),
            enforcement_type: EnforcementType::Auto,
            suspension_active: false,
            permits,
            payments,
            site_has_historical_payments: true,
        }
    }

    #[test]
    fn permit_beats_payment() {
        let s = session(ts(10, 0), Some(ts(11, 0)));
        let permit = Permit {
            id: Uuid::new_v4(),
            vrm: "AB12CDE".into(),
            scope: PermitScope::Site("S1".into()),
            permit_type: PermitType::Whitelist,
            active: true,
            start_date: ts(0, 0),
            end_date: None,
            source: "test".into(),
            metadata: None,
        };
        let permits = vec![permit];
        let payments: Vec<Payment> = Vec::new();
        let ctx = base_ctx(&permits, &payments);
        let verdict = evaluate(&s, &ctx, ts(12, 0));
        assert_eq!(verdict.outcome, DecisionOutcome::Compliant);
        assert_eq!(verdict.rule_applied, "VALID_PERMIT");
    }

    #[test]
    fn short_stay_is_within_grace() {
        let s = session(ts(10, 0), Some(ts(10, 15)));
        let permits: Vec<Permit> = Vec::new();
        let payments: Vec<Payment> = Vec::new();
        let ctx = base_ctx(&permits, &payments);
        let verdict = evaluate(&s, &ctx, ts(10, 20));
        assert_eq!(verdict.outcome, DecisionOutcome::Compliant);
        assert_eq!(verdict.rule_applied, "WITHIN_GRACE");
    }

    #[test]
    fn long_unpaid_stay_is_enforcement_candidate_no_valid_payment() {
        let s = session(ts(10, 0), Some(ts(12, 0)));
        let permits: Vec<Permit> = Vec::new();
        let payments: Vec<Payment> = Vec::new();
        let ctx = base_ctx(&permits, &payments);
        let verdict = evaluate(&s, &ctx, ts(12, 5));
        assert_eq!(verdict.outcome, DecisionOutcome::EnforcementCandidate);
        assert_eq!(verdict.rule_applied, "NO_VALID_PAYMENT");
    }

    #[test]
    fn unauthorised_parking_when_site_has_no_payment_history() {
        let s = session(ts(10, 0), Some(ts(12, 0)));
        let permits: Vec<Permit> = Vec::new();
        let payments: Vec<Payment> = Vec::new();
        let mut ctx = base_ctx(&permits, &payments);
        ctx.site_has_historical_payments = false;
        let verdict = evaluate(&s, &ctx, ts(12, 5));
        assert_eq!(verdict.rule_applied, "UNAUTHORISED_PARKING");
    }

    #[test]
    fn payment_expiring_exactly_at_mandatory_end_is_valid() {
        let s = session(ts(10, 0), Some(ts(12, 0)));
        let grace = GracePeriods::default();
        let mandatory_end = compute_mandatory_end(ts(12, 0), &grace);
        let payment = Payment {
            id: Uuid::new_v4(),
            vrm: "AB12CDE".into(),
            site_id: "S1".into(),
            amount: 5.0,
            start_time: ts(9, 0),
            expiry_time: mandatory_end,
            source: "test".into(),
            external_reference: "ref-1".into(),
        };
        let permits: Vec<Permit> = Vec::new();
        let payments = vec![payment];
        let ctx = base_ctx(&permits, &payments);
        let verdict = evaluate(&s, &ctx, ts(12, 5));
        assert_eq!(verdict.rule_applied, "VALID_PAYMENT");
    }

    #[test]
    fn overstay_exactly_at_threshold_is_within_grace() {
        let s = session(ts(10, 0), Some(ts(12, 0)));
        let grace = GracePeriods::default();
        let mandatory_start = compute_mandatory_start(ts(10, 0), &grace);
        let mandatory_end = compute_mandatory_end(ts(12, 0), &grace);
        let expiry = mandatory_end - chrono::Duration::minutes(grace.overstay_minutes);
        assert!(expiry > mandatory_start);
        let payment = Payment {
            id: Uuid::new_v4(),
            vrm: "AB12CDE".into(),
            site_id: "S1".into(),
            amount: 5.0,
            start_time: ts(9, 0),
            expiry_time: expiry,
            source: "test".into(),
            external_reference: "ref-2".into(),
        };
        let permits: Vec<Permit> = Vec::new();
        let payments = vec![payment];
        let ctx = base_ctx(&permits, &payments);
        let verdict = evaluate(&s, &ctx, ts(12, 5));
        assert_eq!(verdict.rule_applied, "OVERSTAY_WITHIN_GRACE");
    }

    #[test]
    fn suspension_beats_everything() {
        let s = session(ts(10, 0), Some(ts(12, 0)));
        let permits: Vec<Permit> = Vec::new();
        let payments: Vec<Payment> = Vec::new();
        let mut ctx = base_ctx(&permits, &payments);
        ctx.suspension_active = true;
        let verdict = evaluate(&s, &ctx, ts(12, 5));
        assert_eq!(verdict.outcome, DecisionOutcome::Compliant);
        assert_eq!(verdict.rule_applied, "ENFORCEMENT_DISABLED");
    }

    #[test]
    fn cascade_is_deterministic_given_identical_inputs() {
        let s = session(ts(10, 0), Some(ts(12, 0)));
        let permits: Vec<Permit> = Vec::new();
        let payments: Vec<Payment> = Vec::new();
        let ctx = base_ctx(&permits, &payments);
        let first = evaluate(&s, &ctx, ts(12, 5));
        let second = evaluate(&s, &ctx, ts(12, 5));
        assert_eq!(first.outcome, second.outcome);
        assert_eq!(first.rule_applied, second.rule_applied);
    }

    #[test]
    fn frozen_decision_is_not_overwritable() {
        let decision = Decision {
            id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            outcome: DecisionOutcome::EnforcementCandidate,
            rule_applied: "NO_VALID_PAYMENT".into(),
            rationale: "initial".into(),
            status: DecisionStatus::Approved,
            params: None,
        };
        assert!(!may_overwrite(&decision));
    }
}
