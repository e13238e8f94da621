//! Enforcement-Suspension Registry (C7). Validates new suspensions and
//! decides which existing decisions a new suspension retroactively flips.
//! The bulk SQL statement and the summary audit record live in
//! `anpr-infra-db`; this crate only decides validity and eligibility.

use anpr_domain_models::{Decision, DecisionOutcome, DecisionStatus, Session};
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

pub const MIN_REASON_LENGTH: usize = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SuspensionError {
    #[error("end date must be after start date")]
    EndBeforeStart,
    #[error("reason must be at least {MIN_REASON_LENGTH} characters")]
    ReasonTooShort,
}

/// Validates a new suspension's dates and reason per spec.md §4.7, before
/// the caller persists it.
pub fn validate_new_suspension(
    start_date: DateTime<Utc>,
    end_date: Option<DateTime<Utc>>,
    reason: &str,
) -> Result<(), SuspensionError> {
    if let Some(end) = end_date {
        if end <= start_date {
            return Err(SuspensionError::EndBeforeStart);
        }
    }
    if reason.trim().len() < MIN_REASON_LENGTH {
        return Err(SuspensionError::ReasonTooShort);
    }
    Ok(())
}

/// True when a new suspension `[start, end]` retroactively covers a
/// decision: the decision is still an unreviewed enforcement candidate
/// and its session started inside the suspension's window.
pub fn retroactively_flips(
    decision: &Decision,
    session: &Session,
    start_date: DateTime<Utc>,
    end_date: Option<DateTime<Utc>>,
) -> bool {
    decision.outcome == DecisionOutcome::EnforcementCandidate
        && decision.status == DecisionStatus::New
        && session.start_time >= start_date
        && end_date.map(|end| session.start_time <= end).unwrap_or(true)
}

/// The rewrite applied to a decision selected by `retroactively_flips`.
pub struct RetroactiveFlip {
    pub decision_id: Uuid,
    pub outcome: DecisionOutcome,
    pub rule_applied: &'static str,
    pub status: DecisionStatus,
    pub rationale: String,
}

pub fn build_retroactive_flip(decision: &Decision, suspension_id: Uuid) -> RetroactiveFlip {
    RetroactiveFlip {
        decision_id: decision.id,
        outcome: DecisionOutcome::Compliant,
        rule_applied: "ENFORCEMENT_DISABLED_RETROACTIVE",
        status: DecisionStatus::AutoResolved,
        rationale: format!("{} | RECONCILED: suspension {} created retroactively", decision.rationale, suspension_id),
    }
}

/// `end(id, reason, endedBy)` never reverses prior retroactive flips; it
/// only bounds the suspension's own window. This type documents that the
/// end operation has no further eligibility logic of its own — the caller
/// just persists `end_date = now`.
pub struct SuspensionEnd {
    pub ended_at: DateTime<Utc>,
    pub reason: String,
    pub ended_by: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anpr_domain_models::SessionStatus;
    use chrono::TimeZone;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn rejects_end_before_start() {
        let result = validate_new_suspension(ts(10), Some(ts(5)), "planned road closure");
        assert_eq!(result, Err(SuspensionError::EndBeforeStart));
    }

    #[test]
    fn rejects_short_reason() {
        let result = validate_new_suspension(ts(1), Some(ts(10)), "too short");
        assert_eq!(result, Err(SuspensionError::ReasonTooShort));
    }

    #[test]
    fn accepts_open_ended_suspension_with_valid_reason() {
        let result = validate_new_suspension(ts(1), None, "annual festival closure");
        assert!(result.is_ok());
    }

    fn session(start: DateTime<Utc>) -> Session {
        Session {
            id: Uuid::new_v4(),
            site_id: "S1".into(),
            vrm: "AB12CDE".into(),
            start_time: start,
            end_time: Some(start + chrono::Duration::hours(1)),
            duration_minutes: Some(60),
            entry_movement_id: Uuid::new_v4(),
            exit_movement_id: Some(Uuid::new_v4()),
            status: SessionStatus::Completed,
        }
    }

    fn candidate_decision() -> Decision {
        Decision {
            id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            outcome: DecisionOutcome::EnforcementCandidate,
            rule_applied: "NO_VALID_PAYMENT".into(),
            rationale: "no payment found".into(),
            status: DecisionStatus::New,
            params: None,
        }
    }

    #[test]
    fn candidate_decision_inside_window_is_flipped() {
        let decision = candidate_decision();
        let session = session(ts(5));
        assert!(retroactively_flips(&decision, &session, ts(1), Some(ts(10))));
    }

    #[test]
    fn decision_outside_window_is_not_flipped() {
        let decision = candidate_decision();
        let session = session(ts(20));
        assert!(!retroactively_flips(&decision, &session, ts(1), Some(ts(10))));
    }

    #[test]
    fn already_reviewed_decision_is_never_flipped() {
        let mut decision = candidate_decision();
        decision.status = DecisionStatus::Approved;
        let session = session(ts(5));
        assert!(!retroactively_flips(&decision, &session, ts(1), Some(ts(10))));
    }

    #[test]
    fn flip_sets_auto_resolved_status_and_appends_rationale() {
        let decision = candidate_decision();
        let flip = build_retroactive_flip(&decision, Uuid::new_v4());
        assert_eq!(flip.outcome, DecisionOutcome::Compliant);
        assert_eq!(flip.status, DecisionStatus::AutoResolved);
        assert!(flip.rationale.contains("RECONCILED"));
    }
}
