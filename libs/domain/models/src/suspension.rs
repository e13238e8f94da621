use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-site time-bounded enforcement disablement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnforcementSuspension {
    pub id: Uuid,
    pub site_id: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub reason: String,
    pub created_by: String,
    pub active: bool,
}

impl EnforcementSuspension {
    /// Applies at time t iff active ∧ startDate ≤ t ∧ (endDate = NULL ∨ endDate ≥ t).
    pub fn applies_at(&self, t: DateTime<Utc>) -> bool {
        self.active && self.start_date <= t && self.end_date.map(|end| end >= t).unwrap_or(true)
    }
}
