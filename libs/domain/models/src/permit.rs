use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermitType {
    Whitelist,
    Resident,
    Staff,
    Contractor,
    QrWhitelist,
}

/// `Global` encodes the spec's "siteId is nullable" rule as an explicit
/// variant rather than mixing a `None` into an equality check (per the
/// re-architecture note in spec.md §9).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermitScope {
    Global,
    Site(String),
}

impl PermitScope {
    pub fn matches_site(&self, site_id: &str) -> bool {
        match self {
            PermitScope::Global => true,
            PermitScope::Site(s) => s == site_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permit {
    pub id: Uuid,
    pub vrm: String,
    pub scope: PermitScope,
    pub permit_type: PermitType,
    pub active: bool,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub source: String,
    pub metadata: Option<serde_json::Value>,
}

impl Permit {
    /// A permit "applies at time t to site s" per the spec's data model:
    /// active ∧ startDate ≤ t ∧ (endDate = NULL ∨ endDate > t) ∧ scope matches.
    pub fn applies_at(&self, site_id: &str, t: DateTime<Utc>) -> bool {
        self.active
            && self.start_date <= t
            && self.end_date.map(|end| end > t).unwrap_or(true)
            && self.scope.matches_site(site_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn global_permit_applies_at_any_site() {
        let permit = Permit {
            id: Uuid::new_v4(),
            vrm: "AB12CDE".into(),
            scope: PermitScope::Global,
            permit_type: PermitType::Whitelist,
            active: true,
            start_date: ts(0),
            end_date: None,
            source: "test".into(),
            metadata: None,
        };
        assert!(permit.applies_at("S1", ts(5)));
        assert!(permit.applies_at("S2", ts(5)));
    }

    #[test]
    fn scoped_permit_does_not_apply_to_other_sites() {
        let permit = Permit {
            id: Uuid::new_v4(),
            vrm: "AB12CDE".into(),
            scope: PermitScope::Site("S1".into()),
            permit_type: PermitType::Resident,
            active: true,
            start_date: ts(0),
            end_date: Some(ts(10)),
            source: "test".into(),
            metadata: None,
        };
        assert!(permit.applies_at("S1", ts(5)));
        assert!(!permit.applies_at("S2", ts(5)));
        assert!(!permit.applies_at("S1", ts(10)));
    }
}
