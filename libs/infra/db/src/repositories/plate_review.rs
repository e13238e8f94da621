use crate::client::DbClient;
use crate::errors::DbError;
use crate::mapping::{parse_ts, ts};
use anpr_domain_models::{MovementImage, PlateReview, ReviewStatus};
use libsql::params;
use tracing::instrument;
use uuid::Uuid;

pub struct PlateReviewRepository {
    client: DbClient,
}

fn status_str(status: ReviewStatus) -> &'static str {
    match status {
        ReviewStatus::Pending => "PENDING",
        ReviewStatus::Approved => "APPROVED",
        ReviewStatus::Corrected => "CORRECTED",
        ReviewStatus::Discarded => "DISCARDED",
    }
}

fn status_from_str(raw: &str) -> Result<ReviewStatus, DbError> {
    match raw {
        "PENDING" => Ok(ReviewStatus::Pending),
        "APPROVED" => Ok(ReviewStatus::Approved),
        "CORRECTED" => Ok(ReviewStatus::Corrected),
        "DISCARDED" => Ok(ReviewStatus::Discarded),
        other => Err(DbError::MappingError(format!("unknown review status {other}"))),
    }
}

impl PlateReviewRepository {
    pub fn new(client: DbClient) -> Self {
        Self { client }
    }

    const COLUMNS: &'static str = "id, movement_id, original_vrm, normalized_vrm, site_id, timestamp, suspicion_reasons_json, validation_status, review_status, corrected_vrm, images_json";

    fn map_row(row: &libsql::Row) -> Result<PlateReview, DbError> {
        let suspicion_reasons: Vec<String> = serde_json::from_str(&row.get::<String>(6)?)
            .map_err(|e| DbError::MappingError(e.to_string()))?;
        let images: Vec<MovementImage> = serde_json::from_str(&row.get::<String>(10)?)
            .map_err(|e| DbError::MappingError(e.to_string()))?;
        Ok(PlateReview {
            id: row.get::<String>(0)?.parse().map_err(|e| DbError::MappingError(format!("{e}")))?,
            movement_id: row.get::<String>(1)?.parse().map_err(|e| DbError::MappingError(format!("{e}")))?,
            original_vrm: row.get(2)?,
            normalized_vrm: row.get(3)?,
            site_id: row.get(4)?,
            timestamp: parse_ts(&row.get::<String>(5)?)?,
            suspicion_reasons,
            validation_status: row.get(7)?,
            review_status: status_from_str(&row.get::<String>(8)?)?,
            corrected_vrm: row.get(9)?,
            images,
        })
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<Option<PlateReview>, DbError> {
        let conn = self.client.connection()?;
        let sql = format!("SELECT {} FROM plate_reviews WHERE id = ?1", Self::COLUMNS);
        let mut rows = conn.query(&sql, params![id.to_string()]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::map_row(&row)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, review))]
    pub async fn insert(&self, review: &PlateReview) -> Result<(), DbError> {
        let conn = self.client.connection()?;
        let suspicion_reasons_json =
            serde_json::to_string(&review.suspicion_reasons).map_err(|e| DbError::MappingError(e.to_string()))?;
        let images_json = serde_json::to_string(&review.images).map_err(|e| DbError::MappingError(e.to_string()))?;
        conn.execute(
            "INSERT INTO plate_reviews (id, movement_id, original_vrm, normalized_vrm, site_id, timestamp, suspicion_reasons_json, validation_status, review_status, corrected_vrm, images_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                review.id.to_string(),
                review.movement_id.to_string(),
                review.original_vrm.clone(),
                review.normalized_vrm.clone(),
                review.site_id.clone(),
                ts(review.timestamp),
                suspicion_reasons_json,
                review.validation_status.clone(),
                status_str(review.review_status),
                review.corrected_vrm.clone(),
                images_json,
            ],
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn update_status(&self, id: Uuid, status: ReviewStatus, corrected_vrm: Option<&str>) -> Result<(), DbError> {
        let conn = self.client.connection()?;
        conn.execute(
            "UPDATE plate_reviews SET review_status = ?2, corrected_vrm = ?3 WHERE id = ?1",
            params![id.to_string(), status_str(status), corrected_vrm],
        )
        .await?;
        Ok(())
    }

    /// Best-effort target list for `bulkDiscardByReason`: PENDING reviews
    /// whose suspicion reasons contain `tag`, oldest first.
    #[instrument(skip(self))]
    pub async fn list_pending_by_reason(&self, tag: &str, limit: i64) -> Result<Vec<PlateReview>, DbError> {
        let conn = self.client.connection()?;
        let sql = format!(
            "SELECT {} FROM plate_reviews WHERE review_status = 'PENDING' AND suspicion_reasons_json LIKE ?1 ORDER BY timestamp ASC LIMIT ?2",
            Self::COLUMNS
        );
        let pattern = format!("%{tag}%");
        let mut rows = conn.query(&sql, params![pattern, limit]).await?;
        let mut reviews = Vec::new();
        while let Some(row) = rows.next().await? {
            reviews.push(Self::map_row(&row)?);
        }
        Ok(reviews)
    }
}
