//! Plate-Review Workflow (C8). Pure transition logic for a PENDING
//! `PlateReview`; persistence and the resubmission to the Session
//! Reconstructor are the caller's job (`apps/enforcement-service`).

use anpr_domain_models::{MovementImage, PlateReview, ReviewStatus};
use anpr_domain_plate_validation::PlateValidator;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReviewError {
    #[error("plate review is not PENDING")]
    InvalidTransition,
}

fn require_pending(review: &PlateReview) -> Result<(), ReviewError> {
    if review.review_status != ReviewStatus::Pending {
        return Err(ReviewError::InvalidTransition);
    }
    Ok(())
}

/// What the caller must write back after `approve`: the review itself,
/// plus a signal to clear `Movement.requiresReview` and resubmit it to
/// the Session Reconstructor.
pub struct ApproveOutcome {
    pub review_status: ReviewStatus,
    pub resubmit_vrm: String,
}

pub fn approve(review: &PlateReview) -> Result<ApproveOutcome, ReviewError> {
    require_pending(review)?;
    Ok(ApproveOutcome {
        review_status: ReviewStatus::Approved,
        resubmit_vrm: review.normalized_vrm.clone(),
    })
}

pub struct CorrectOutcome {
    pub review_status: ReviewStatus,
    pub corrected_vrm: String,
    pub resubmit_vrm: String,
}

/// Validates `new_vrm` via the Plate Validator (C1) for the record; the
/// correction is a reviewer override and is applied regardless of the
/// resulting validation status. The corrected VRM becomes the one used in
/// all subsequent matching (spec.md §4.8).
pub fn correct(review: &PlateReview, new_vrm: &str, validator: &PlateValidator) -> Result<CorrectOutcome, ReviewError> {
    require_pending(review)?;
    let normalized = validator.normalize(new_vrm);
    let _ = validator.validate(&normalized);
    Ok(CorrectOutcome {
        review_status: ReviewStatus::Corrected,
        corrected_vrm: normalized.clone(),
        resubmit_vrm: normalized,
    })
}

pub struct DiscardOutcome {
    pub review_status: ReviewStatus,
    pub reason: String,
}

/// Discarding leaves the underlying Movement's `requiresReview` flag set;
/// there is no resubmission (spec.md §4.8).
pub fn discard(review: &PlateReview, reason: &str) -> Result<DiscardOutcome, ReviewError> {
    require_pending(review)?;
    Ok(DiscardOutcome {
        review_status: ReviewStatus::Discarded,
        reason: reason.to_string(),
    })
}

/// Tracks a `bulkDiscardByReason` pass: non-transactional, best-effort,
/// one failure isolated from the rest (spec.md §4.8).
#[derive(Debug, Clone, Default)]
pub struct BulkDiscardSummary {
    pub attempted: usize,
    pub discarded: usize,
    pub errors: Vec<(Uuid, String)>,
}

pub fn bulk_discard_item(review: &PlateReview, reason: &str, summary: &mut BulkDiscardSummary) -> Option<DiscardOutcome> {
    summary.attempted += 1;
    match discard(review, reason) {
        Ok(outcome) => {
            summary.discarded += 1;
            Some(outcome)
        }
        Err(err) => {
            summary.errors.push((review.id, err.to_string()));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(status: ReviewStatus) -> PlateReview {
        PlateReview {
            id: Uuid::new_v4(),
            movement_id: Uuid::new_v4(),
            original_vrm: "AB12CD3".into(),
            normalized_vrm: "AB12CD3".into(),
            site_id: "S1".into(),
            timestamp: chrono::Utc::now(),
            suspicion_reasons: vec!["ConfusedCharacterCluster".into()],
            validation_status: "Invalid".into(),
            review_status: status,
            corrected_vrm: None,
            images: Vec::<MovementImage>::new(),
        }
    }

    #[test]
    fn approve_requires_pending_status() {
        let review = fixture(ReviewStatus::Approved);
        assert_eq!(approve(&review), Err(ReviewError::InvalidTransition));
    }

    #[test]
    fn approve_pending_review_succeeds() {
        let review = fixture(ReviewStatus::Pending);
        let outcome = approve(&review).unwrap();
        assert_eq!(outcome.review_status, ReviewStatus::Approved);
        assert_eq!(outcome.resubmit_vrm, "AB12CD3");
    }

    #[test]
    fn correct_normalizes_and_records_new_vrm() {
        let review = fixture(ReviewStatus::Pending);
        let validator = PlateValidator::new(&[]);
        let outcome = correct(&review, " ab12cde ", &validator).unwrap();
        assert_eq!(outcome.corrected_vrm, "AB12CDE");
        assert_eq!(outcome.review_status, ReviewStatus::Corrected);
    }

    #[test]
    fn discard_leaves_movement_review_flag_untouched() {
        let review = fixture(ReviewStatus::Pending);
        let outcome = discard(&review, "unreadable image").unwrap();
        assert_eq!(outcome.review_status, ReviewStatus::Discarded);
    }

    #[test]
    fn bulk_discard_isolates_per_item_failures() {
        let mut summary = BulkDiscardSummary::default();
        let pending = fixture(ReviewStatus::Pending);
        let already_discarded = fixture(ReviewStatus::Discarded);
        bulk_discard_item(&pending, "duplicate", &mut summary);
        bulk_discard_item(&already_discarded, "duplicate", &mut summary);
        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.discarded, 1);
        assert_eq!(summary.errors.len(), 1);
    }
}
