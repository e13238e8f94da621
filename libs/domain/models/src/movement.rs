use crate::site::Direction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageType {
    Plate,
    Overview,
    Context,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementImage {
    pub url: String,
    pub image_type: ImageType,
}

/// One camera detection event. Identity is `(site_id, vrm, timestamp)` per
/// the spec's data model — `ingest_movement` dedupes on that triple.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movement {
    pub id: Uuid,
    pub site_id: String,
    /// Normalized plate: uppercase, whitespace stripped.
    pub vrm: String,
    pub timestamp: DateTime<Utc>,
    pub camera_id: Option<String>,
    pub direction: Direction,
    pub raw_payload: serde_json::Value,
    pub images: Vec<MovementImage>,
    pub requires_review: bool,
    pub discarded: bool,
}
