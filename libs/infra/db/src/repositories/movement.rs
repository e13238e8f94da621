use crate::client::DbClient;
use crate::errors::DbError;
use crate::mapping::{parse_ts, ts};
use anpr_domain_models::{Direction, Movement, MovementImage};
use libsql::params;
use tracing::instrument;

pub struct MovementRepository {
    client: DbClient,
}

impl MovementRepository {
    pub fn new(client: DbClient) -> Self {
        Self { client }
    }

    fn map_row(row: &libsql::Row) -> Result<Movement, DbError> {
        let direction_raw: String = row.get(5)?;
        let direction = match direction_raw.as_str() {
            "ENTRY" => Direction::Entry,
            "EXIT" => Direction::Exit,
            _ => Direction::Unknown,
        };
        let images_json: String = row.get(7)?;
        let images: Vec<MovementImage> =
            serde_json::from_str(&images_json).map_err(|e| DbError::MappingError(e.to_string()))?;
        let requires_review: i64 = row.get(8)?;
        let discarded: i64 = row.get(9)?;
        Ok(Movement {
            id: row.get::<String>(0)?.parse().map_err(|e| DbError::MappingError(format!("{e}")))?,
            site_id: row.get(1)?,
            vrm: row.get(2)?,
            timestamp: parse_ts(&row.get::<String>(3)?)?,
            camera_id: row.get(4)?,
            direction,
            raw_payload: serde_json::from_str(&row.get::<String>(6)?)
                .map_err(|e| DbError::MappingError(e.to_string()))?,
            images,
            requires_review: requires_review != 0,
            discarded: discarded != 0,
        })
    }

    #[instrument(skip(self))]
    pub async fn find_by_dedupe_key(
        &self,
        site_id: &str,
        vrm: &str,
        timestamp: chrono::DateTime<chrono::Utc>,
    ) -> Result<Option<Movement>, DbError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT id, site_id, vrm, timestamp, camera_id, direction, raw_payload_json, images_json, requires_review, discarded
                 FROM movements WHERE site_id = ?1 AND vrm = ?2 AND timestamp = ?3",
                params![site_id, vrm, ts(timestamp)],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::map_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Inserts a brand-new movement. The caller must have already checked
    /// `find_by_dedupe_key`; the unique index on `(site_id, vrm, timestamp)`
    /// is the authoritative guard against a concurrent duplicate insert.
    #[instrument(skip(self, movement))]
    pub async fn insert(&self, movement: &Movement) -> Result<(), DbError> {
        let conn = self.client.connection()?;
        let direction = match movement.direction {
            Direction::Entry => "ENTRY",
            Direction::Exit => "EXIT",
            Direction::Unknown => "UNKNOWN",
        };
        let images_json =
            serde_json::to_string(&movement.images).map_err(|e| DbError::MappingError(e.to_string()))?;
        let raw_payload_json =
            serde_json::to_string(&movement.raw_payload).map_err(|e| DbError::MappingError(e.to_string()))?;
        let result = conn
            .execute(
                "INSERT INTO movements (id, site_id, vrm, timestamp, camera_id, direction, raw_payload_json, images_json, requires_review, discarded)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    movement.id.to_string(),
                    movement.site_id.clone(),
                    movement.vrm.clone(),
                    ts(movement.timestamp),
                    movement.camera_id.clone(),
                    direction,
                    raw_payload_json,
                    images_json,
                    movement.requires_review as i64,
                    movement.discarded as i64,
                ],
            )
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(e) => Err(crate::errors::classify(e)),
        }
    }

    /// Patches an existing movement's image list (spec.md §4.2's
    /// duplicate-movement image patch).
    #[instrument(skip(self, images))]
    pub async fn update_images(&self, movement_id: uuid::Uuid, images: &[MovementImage]) -> Result<(), DbError> {
        let conn = self.client.connection()?;
        let images_json = serde_json::to_string(images).map_err(|e| DbError::MappingError(e.to_string()))?;
        conn.execute(
            "UPDATE movements SET images_json = ?2 WHERE id = ?1",
            params![movement_id.to_string(), images_json],
        )
        .await?;
        Ok(())
    }

    /// Rewrites the vrm and clears `requires_review` after an approval or
    /// correction in the Plate-Review Workflow (C8).
    #[instrument(skip(self))]
    pub async fn apply_review_resolution(&self, movement_id: uuid::Uuid, vrm: &str) -> Result<(), DbError> {
        let conn = self.client.connection()?;
        conn.execute(
            "UPDATE movements SET vrm = ?2, requires_review = 0 WHERE id = ?1",
            params![movement_id.to_string(), vrm],
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get(&self, movement_id: uuid::Uuid) -> Result<Option<Movement>, DbError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT id, site_id, vrm, timestamp, camera_id, direction, raw_payload_json, images_json, requires_review, discarded
                 FROM movements WHERE id = ?1",
                params![movement_id.to_string()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::map_row(&row)?)),
            None => Ok(None),
        }
    }
}
