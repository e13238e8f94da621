//! Session Reconstructor (C3) state machine. Pure: callers supply the
//! currently-open session (if any) for the `(site, vrm)` pair and the
//! incoming movement; this crate only decides what should happen next.
//! The read-then-write and the unique-constraint race handling live in
//! `anpr-infra-db`, per spec.md §5's concurrency model.

use anpr_core_grace_math::duration_minutes;
use anpr_domain_models::{Direction, Movement, Session};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

pub const DEFAULT_STALE_THRESHOLD_HOURS: i64 = 24;

/// What the Session Reconstructor should do with an incoming movement,
/// given the currently-open session (if any) for that `(site, vrm)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// NoOpen --ENTRY--> Open
    OpenSession {
        start_time: DateTime<Utc>,
        entry_movement_id: Uuid,
    },
    /// Open --ENTRY--> Open (duplicate-entry suppression)
    DuplicateEntrySkipped,
    /// Open --EXIT(>= start)--> NoOpen
    CloseSession {
        end_time: DateTime<Utc>,
        duration_minutes: i64,
        exit_movement_id: Uuid,
    },
    /// Open --EXIT(< start)--> Open (refuse to close; orphan)
    OrphanExitBeforeEntry,
    /// NoOpen --EXIT--> NoOpen (orphan, no session created)
    OrphanExitNoSession,
    /// Movement is review-gated, discarded, or direction is UNKNOWN: skipped entirely.
    Ignored,
}

/// Decides the next transition for one `(site, vrm)` stream. Does not
/// mutate anything; the caller applies the result.
pub fn decide_transition(existing_open: Option<&Session>, movement: &Movement) -> Transition {
    if movement.requires_review || movement.discarded {
        return Transition::Ignored;
    }

    match (existing_open, movement.direction) {
        (None, Direction::Entry) => Transition::OpenSession {
            start_time: movement.timestamp,
            entry_movement_id: movement.id,
        },
        (Some(_), Direction::Entry) => Transition::DuplicateEntrySkipped,
        (Some(session), Direction::Exit) => {
            if movement.timestamp >= session.start_time {
                Transition::CloseSession {
                    end_time: movement.timestamp,
                    duration_minutes: duration_minutes(session.start_time, movement.timestamp),
                    exit_movement_id: movement.id,
                }
            } else {
                Transition::OrphanExitBeforeEntry
            }
        }
        (None, Direction::Exit) => Transition::OrphanExitNoSession,
        (_, Direction::Unknown) => Transition::Ignored,
    }
}

/// A session that should transition to `EXPIRED` on a scheduled tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiredSession {
    pub end_time: DateTime<Utc>,
    pub duration_minutes: i64,
}

/// Open --tick(now - start >= threshold)--> Expired. The rule engine is
/// never invoked for expiry (spec.md §4.3).
pub fn expire_if_stale(
    session: &Session,
    now: DateTime<Utc>,
    stale_threshold: Duration,
) -> Option<ExpiredSession> {
    if !session.is_open() {
        return None;
    }
    if now - session.start_time >= stale_threshold {
        Some(ExpiredSession {
            end_time: now,
            duration_minutes: duration_minutes(session.start_time, now),
        })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anpr_domain_models::SessionStatus;
    use chrono::TimeZone;

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, hour, 0, 0).unwrap()
    }

    fn movement(direction: Direction, timestamp: DateTime<Utc>) -> Movement {
        Movement {
            id: Uuid::new_v4(),
            site_id: "S1".into(),
            vrm: "AB12CDE".into(),
            timestamp,
            camera_id: None,
            direction,
            raw_payload: serde_json::json!({}),
            images: Vec::new(),
            requires_review: false,
            discarded: false,
        }
    }

    fn open_session(start_time: DateTime<Utc>) -> Session {
        Session {
            id: Uuid::new_v4(),
            site_id: "S1".into(),
            vrm: "AB12CDE".into(),
            start_time,
            end_time: None,
            duration_minutes: None,
            entry_movement_id: Uuid::new_v4(),
            exit_movement_id: None,
            status: SessionStatus::Provisional,
        }
    }

    #[test]
    fn entry_with_no_open_session_opens_one() {
        let m = movement(Direction::Entry, ts(10));
        let transition = decide_transition(None, &m);
        assert_eq!(
            transition,
            Transition::OpenSession {
                start_time: ts(10),
                entry_movement_id: m.id
            }
        );
    }

    #[test]
    fn second_entry_is_suppressed_as_duplicate() {
        let session = open_session(ts(10));
        let m = movement(Direction::Entry, ts(10));
        assert_eq!(
            decide_transition(Some(&session), &m),
            Transition::DuplicateEntrySkipped
        );
    }

    #[test]
    fn exit_at_exactly_start_time_closes_the_session() {
        let session = open_session(ts(10));
        let m = movement(Direction::Exit, ts(10));
        match decide_transition(Some(&session), &m) {
            Transition::CloseSession {
                duration_minutes, ..
            } => assert_eq!(duration_minutes, 0),
            other => panic!("expected CloseSession, got {other:?}"),
        }
    }

    #[test]
    fn exit_before_entry_stays_open_as_orphan() {
        let session = open_session(ts(10));
        let m = movement(Direction::Exit, ts(9));
        assert_eq!(
            decide_transition(Some(&session), &m),
            Transition::OrphanExitBeforeEntry
        );
    }

    #[test]
    fn exit_with_no_open_session_is_an_orphan() {
        let m = movement(Direction::Exit, ts(10));
        assert_eq!(decide_transition(None, &m), Transition::OrphanExitNoSession);
    }

    #[test]
    fn review_gated_movement_is_ignored() {
        let mut m = movement(Direction::Entry, ts(10));
        m.requires_review = true;
        assert_eq!(decide_transition(None, &m), Transition::Ignored);
    }

    #[test]
    fn stale_open_session_expires_at_threshold() {
        let session = open_session(ts(0));
        let now = ts(0) + Duration::hours(24);
        let expired = expire_if_stale(&session, now, Duration::hours(24));
        assert!(expired.is_some());
    }

    #[test]
    fn fresh_open_session_does_not_expire() {
        let session = open_session(ts(0));
        let now = ts(0) + Duration::hours(23);
        assert!(expire_if_stale(&session, now, Duration::hours(24)).is_none());
    }
}
