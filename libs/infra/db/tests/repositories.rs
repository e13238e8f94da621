use anpr_domain_models::{CameraConfig, Direction, EnforcementSuspension, EnforcementType, Movement, MovementImage, Site, SiteConfig};
use anpr_infra_db::{DbClient, MovementRepository, SessionRepository, SiteRepository, SuspensionRepository};
use chrono::{TimeZone, Utc};
use uuid::Uuid;

async fn memory_client() -> DbClient {
    DbClient::connect(":memory:", None)
        .await
        .expect("in-memory database should connect and apply schema")
}

fn sample_site() -> Site {
    Site {
        id: "S1".into(),
        name: "Green Street".into(),
        active: true,
        config: SiteConfig {
            grace: anpr_core_grace_math::GracePeriods::default(),
            enforcement_type: EnforcementType::PayAndDisplay,
            cameras: vec![CameraConfig {
                id: "cam-01".into(),
                towards_direction: Direction::Entry,
                away_direction: Direction::Exit,
            }],
        },
    }
}

#[tokio::test]
async fn schema_applies_and_site_roundtrips() {
    let client = memory_client().await;
    let sites = SiteRepository::new(client.clone());
    let site = sample_site();
    sites.upsert(&site).await.unwrap();

    let fetched = sites.get("S1").await.unwrap().expect("site should exist");
    assert_eq!(fetched.name, "Green Street");
    assert_eq!(fetched.config.cameras.len(), 1);
}

#[tokio::test]
async fn duplicate_movement_insert_is_rejected_by_unique_index() {
    let client = memory_client().await;
    let movements = MovementRepository::new(client.clone());
    let timestamp = Utc.with_ymd_and_hms(2026, 1, 1, 10, 0, 0).unwrap();
    let movement = Movement {
        id: Uuid::new_v4(),
        site_id: "S1".into(),
        vrm: "AB12CDE".into(),
        timestamp,
        camera_id: Some("cam-01".into()),
        direction: Direction::Entry,
        raw_payload: serde_json::json!({}),
        images: vec![MovementImage {
            url: "https://cdn.example.com/a.jpg".into(),
            image_type: anpr_domain_models::ImageType::Plate,
        }],
        requires_review: false,
        discarded: false,
    };
    movements.insert(&movement).await.unwrap();

    let mut duplicate = movement.clone();
    duplicate.id = Uuid::new_v4();
    let result = movements.insert(&duplicate).await;
    assert!(matches!(result, Err(anpr_infra_db::DbError::UniqueViolation(_))));
}

#[tokio::test]
async fn opening_two_sessions_for_the_same_plate_is_rejected() {
    let client = memory_client().await;
    let sessions = SessionRepository::new(client.clone());
    let start = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
    let session = anpr_domain_models::Session {
        id: Uuid::new_v4(),
        site_id: "S1".into(),
        vrm: "AB12CDE".into(),
        start_time: start,
        end_time: None,
        duration_minutes: None,
        entry_movement_id: Uuid::new_v4(),
        exit_movement_id: None,
        status: anpr_domain_models::SessionStatus::Provisional,
    };
    sessions.open(&session).await.unwrap();

    let mut duplicate = session.clone();
    duplicate.id = Uuid::new_v4();
    duplicate.entry_movement_id = Uuid::new_v4();
    let result = sessions.open(&duplicate).await;
    assert!(matches!(result, Err(anpr_infra_db::DbError::UniqueViolation(_))));
}

#[tokio::test]
async fn suspension_is_disabled_lookup_respects_the_active_window() {
    let client = memory_client().await;
    let suspensions = SuspensionRepository::new(client.clone());
    let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2026, 1, 10, 0, 0, 0).unwrap();
    let suspension = EnforcementSuspension {
        id: Uuid::new_v4(),
        site_id: "S1".into(),
        start_date: start,
        end_date: Some(end),
        reason: "planned road closure".into(),
        created_by: "ops".into(),
        active: true,
    };
    suspensions.insert(&suspension).await.unwrap();

    let inside = Utc.with_ymd_and_hms(2026, 1, 5, 0, 0, 0).unwrap();
    let outside = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
    assert!(suspensions.is_disabled("S1", inside).await.unwrap());
    assert!(!suspensions.is_disabled("S1", outside).await.unwrap());
}
