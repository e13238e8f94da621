use anpr_core_grace_math::GracePeriods;
use serde::{Deserialize, Serialize};

/// Enforcement model a site operates under; gates §4.4's "unauthorised"
/// clause (C4, rule 7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnforcementType {
    Auto,
    PayAndDisplay,
    PermitOnly,
    Mixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Entry,
    Exit,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    pub id: String,
    pub towards_direction: Direction,
    pub away_direction: Direction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub grace: GracePeriods,
    pub enforcement_type: EnforcementType,
    pub cameras: Vec<CameraConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    /// Short code, e.g. "GRN01". Doubles as the primary key.
    pub id: String,
    pub name: String,
    pub active: bool,
    pub config: SiteConfig,
}

impl Site {
    /// Case-insensitive camera lookup by id, per §4.2's direction-resolution step 1.
    pub fn camera(&self, camera_id: &str) -> Option<&CameraConfig> {
        self.config
            .cameras
            .iter()
            .find(|c| c.id.eq_ignore_ascii_case(camera_id))
    }
}
