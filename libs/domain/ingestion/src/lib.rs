//! Ingestion Pipeline (C2). Pure preparation logic: direction resolution,
//! plate normalization/suspicion triage, duplicate-image patch policy, and
//! the natural-key identities the repositories dedupe on. The actual reads,
//! writes and unique-constraint races live in `anpr-infra-db`; this crate
//! never touches storage.

use anpr_domain_models::{Direction, Movement, MovementImage, PermitType, PlateReview, ReviewStatus, Site};
use anpr_domain_plate_validation::PlateValidator;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A movement event as received from a camera, before normalization or
/// identity assignment.
#[derive(Debug, Clone)]
pub struct RawMovement {
    pub site_id: String,
    pub raw_vrm: String,
    pub timestamp: DateTime<Utc>,
    pub camera_id: Option<String>,
    /// The camera's raw signal, e.g. "TOWARDS", "AWAY", "ENTRY", "EXIT", "IN", "OUT".
    pub direction_signal: Option<String>,
    pub images: Vec<MovementImage>,
    pub raw_payload: serde_json::Value,
    pub confidence: Option<f64>,
}

/// Resolves a movement's direction per spec.md §4.2: (1) the site's
/// per-site camera entry, case-insensitively, mapping the raw TOWARDS/AWAY
/// signal through that camera's configured direction; (2) a global
/// fallback mapping; (3) otherwise UNKNOWN.
pub fn resolve_direction(site: &Site, camera_id: Option<&str>, signal: Option<&str>) -> Direction {
    if let (Some(camera_id), Some(signal)) = (camera_id, signal) {
        if let Some(camera) = site.camera(camera_id) {
            match signal.to_ascii_uppercase().as_str() {
                "TOWARDS" => return camera.towards_direction,
                "AWAY" => return camera.away_direction,
                _ => {}
            }
        }
    }
    match signal.map(|s| s.to_ascii_uppercase()).as_deref() {
        Some("TOWARDS") | Some("ENTRY") | Some("IN") => Direction::Entry,
        Some("AWAY") | Some("EXIT") | Some("OUT") => Direction::Exit,
        _ => Direction::Unknown,
    }
}

/// The outcome of preparing a brand-new movement: the `Movement` itself,
/// plus a `PlateReview` draft when the plate validator flagged it as
/// suspicious.
pub struct PreparedMovement {
    pub movement: Movement,
    pub plate_review: Option<PlateReview>,
}

/// Normalizes the plate, resolves direction, runs the validator, and
/// builds the review-gating artifacts for a brand-new movement. Does not
/// decide whether the movement is a duplicate; the caller checks that
/// against storage first using `(site_id, vrm, timestamp)`.
pub fn prepare_movement(raw: &RawMovement, site: &Site, validator: &PlateValidator) -> PreparedMovement {
    let vrm = validator.normalize(&raw.raw_vrm);
    let direction = resolve_direction(site, raw.camera_id.as_deref(), raw.direction_signal.as_deref());
    let suspicion = validator.detect_suspicious(&vrm, raw.confidence);
    let validation = validator.validate(&vrm);

    let movement_id = Uuid::new_v4();
    let movement = Movement {
        id: movement_id,
        site_id: raw.site_id.clone(),
        vrm: vrm.clone(),
        timestamp: raw.timestamp,
        camera_id: raw.camera_id.clone(),
        direction,
        raw_payload: raw.raw_payload.clone(),
        images: raw.images.clone(),
        requires_review: suspicion.is_suspicious,
        discarded: false,
    };

    let plate_review = suspicion.is_suspicious.then(|| PlateReview {
        id: Uuid::new_v4(),
        movement_id,
        original_vrm: raw.raw_vrm.clone(),
        normalized_vrm: vrm,
        site_id: raw.site_id.clone(),
        timestamp: raw.timestamp,
        suspicion_reasons: suspicion.reasons.iter().map(|r| format!("{r:?}")).collect(),
        validation_status: format!("{:?}", validation.status),
        review_status: ReviewStatus::Pending,
        corrected_vrm: None,
        images: raw.images.clone(),
    });

    PreparedMovement { movement, plate_review }
}

/// True when `url` points at an external host rather than local storage.
/// Only images fitting this are eligible to be patched on a duplicate
/// movement (spec.md §4.2): a URL already pointing at our own storage is
/// left alone.
pub fn is_remote_host(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    if !(lower.starts_with("http://") || lower.starts_with("https://")) {
        return false;
    }
    !(lower.contains("localhost") || lower.contains("127.0.0.1") || lower.contains("internal."))
}

/// Merges incoming images into an existing movement's image list. An
/// existing image may only be replaced when its current URL points at a
/// remote host; images already pointing at local storage are left as-is.
/// Image types absent from the existing list are appended.
pub fn merge_images(existing: &[MovementImage], incoming: &[MovementImage]) -> Vec<MovementImage> {
    let mut merged = existing.to_vec();
    for image in incoming {
        match merged.iter_mut().find(|m| m.image_type == image.image_type) {
            Some(slot) if is_remote_host(&slot.url) => slot.url = image.url.clone(),
            Some(_) => {}
            None => merged.push(image.clone()),
        }
    }
    merged
}

/// Payment identity for dedupe: `(externalReference, source)`.
pub fn payment_identity(external_reference: &str, source: &str) -> (String, String) {
    (external_reference.to_string(), source.to_string())
}

/// Permit identity per spec.md §4.2: an external board item id when
/// present, else the natural key `(vrm, siteId, type)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermitIdentity {
    External(String),
    Natural {
        vrm: String,
        site_id: String,
        permit_type: PermitType,
    },
}

pub fn permit_identity(
    external_board_item_id: Option<&str>,
    vrm: &str,
    site_id: &str,
    permit_type: PermitType,
) -> PermitIdentity {
    match external_board_item_id {
        Some(id) => PermitIdentity::External(id.to_string()),
        None => PermitIdentity::Natural {
            vrm: vrm.to_string(),
            site_id: site_id.to_string(),
            permit_type,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anpr_core_grace_math::GracePeriods;
    use anpr_domain_models::{CameraConfig, EnforcementType, ImageType, SiteConfig};

    fn site_with_camera() -> Site {
        Site {
            id: "S1".into(),
            name: "Test Site".into(),
            active: true,
            config: SiteConfig {
                grace: GracePeriods::default(),
                enforcement_type: EnforcementType::PayAndDisplay,
                cameras: vec![CameraConfig {
                    id: "cam-01".into(),
                    towards_direction: Direction::Entry,
                    away_direction: Direction::Exit,
                }],
            },
        }
    }

    #[test]
    fn per_site_camera_mapping_takes_priority() {
        let site = site_with_camera();
        let direction = resolve_direction(&site, Some("CAM-01"), Some("towards"));
        assert_eq!(direction, Direction::Entry);
    }

    #[test]
    fn falls_back_to_global_mapping_when_camera_unknown() {
        let site = site_with_camera();
        let direction = resolve_direction(&site, Some("unknown-cam"), Some("IN"));
        assert_eq!(direction, Direction::Entry);
    }

    #[test]
    fn unresolvable_signal_is_unknown() {
        let site = site_with_camera();
        let direction = resolve_direction(&site, None, Some("SIDEWAYS"));
        assert_eq!(direction, Direction::Unknown);
    }

    #[test]
    fn remote_image_is_patchable_local_is_not() {
        let existing = vec![
            MovementImage {
                url: "https://cdn.example.com/plate.jpg".into(),
                image_type: ImageType::Plate,
            },
            MovementImage {
                url: "https://internal.storage/plate2.jpg".into(),
                image_type: ImageType::Overview,
            },
        ];
        let incoming = vec![
            MovementImage {
                url: "https://cdn.example.com/plate-v2.jpg".into(),
                image_type: ImageType::Plate,
            },
            MovementImage {
                url: "https://cdn.example.com/overview-v2.jpg".into(),
                image_type: ImageType::Overview,
            },
        ];
        let merged = merge_images(&existing, &incoming);
        assert_eq!(merged[0].url, "https://cdn.example.com/plate-v2.jpg");
        assert_eq!(merged[1].url, "https://internal.storage/plate2.jpg");
    }

    #[test]
    fn permit_identity_prefers_external_id() {
        let identity = permit_identity(Some("board-123"), "AB12CDE", "S1", PermitType::Staff);
        assert_eq!(identity, PermitIdentity::External("board-123".into()));
    }

    #[test]
    fn permit_identity_falls_back_to_natural_key() {
        let identity = permit_identity(None, "AB12CDE", "S1", PermitType::Staff);
        assert_eq!(
            identity,
            PermitIdentity::Natural {
                vrm: "AB12CDE".into(),
                site_id: "S1".into(),
                permit_type: PermitType::Staff,
            }
        );
    }
}
