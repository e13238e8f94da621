use crate::movement::MovementImage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewStatus {
    Pending,
    Approved,
    Corrected,
    Discarded,
}

/// One per suspicious `Movement`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlateReview {
    pub id: Uuid,
    pub movement_id: Uuid,
    pub original_vrm: String,
    pub normalized_vrm: String,
    pub site_id: String,
    pub timestamp: DateTime<Utc>,
    pub suspicion_reasons: Vec<String>,
    pub validation_status: String,
    pub review_status: ReviewStatus,
    pub corrected_vrm: Option<String>,
    pub images: Vec<MovementImage>,
}
