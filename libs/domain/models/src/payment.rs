use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payments are never edited after ingestion; duplicates are suppressed on
/// `(external_reference, source)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub vrm: String,
    pub site_id: String,
    pub amount: f64,
    pub start_time: DateTime<Utc>,
    pub expiry_time: DateTime<Utc>,
    pub source: String,
    pub external_reference: String,
}

impl Payment {
    /// Whether `[start_time, expiry_time]` fully covers `[mandatory_start, mandatory_end]`.
    pub fn fully_covers(
        &self,
        mandatory_start: DateTime<Utc>,
        mandatory_end: DateTime<Utc>,
    ) -> bool {
        self.start_time <= mandatory_start && self.expiry_time >= mandatory_end
    }
}
