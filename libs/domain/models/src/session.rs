use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Provisional,
    Completed,
    Expired,
}

/// One entry/exit pair for a vehicle at a site. At most one session per
/// `(site_id, vrm)` may have `end_time = None` at a time (enforced at the
/// storage layer, see `anpr-infra-db::schema`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub site_id: String,
    pub vrm: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
    pub entry_movement_id: Uuid,
    pub exit_movement_id: Option<Uuid>,
    pub status: SessionStatus,
}

impl Session {
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }
}
