use crate::client::DbClient;
use crate::errors::DbError;
use crate::mapping::{parse_ts, parse_ts_opt, ts, ts_opt};
use anpr_domain_models::EnforcementSuspension;
use chrono::{DateTime, Utc};
use libsql::params;
use tracing::instrument;
use uuid::Uuid;

pub struct SuspensionRepository {
    client: DbClient,
}

impl SuspensionRepository {
    pub fn new(client: DbClient) -> Self {
        Self { client }
    }

    const COLUMNS: &'static str = "id, site_id, start_date, end_date, reason, created_by, active";

    fn map_row(row: &libsql::Row) -> Result<EnforcementSuspension, DbError> {
        Ok(EnforcementSuspension {
            id: row.get::<String>(0)?.parse().map_err(|e| DbError::MappingError(format!("{e}")))?,
            site_id: row.get(1)?,
            start_date: parse_ts(&row.get::<String>(2)?)?,
            end_date: parse_ts_opt(row.get::<Option<String>>(3)?)?,
            reason: row.get(4)?,
            created_by: row.get(5)?,
            active: row.get::<i64>(6)? != 0,
        })
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<Option<EnforcementSuspension>, DbError> {
        let conn = self.client.connection()?;
        let sql = format!("SELECT {} FROM enforcement_suspensions WHERE id = ?1", Self::COLUMNS);
        let mut rows = conn.query(&sql, params![id.to_string()]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::map_row(&row)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, suspension))]
    pub async fn insert(&self, suspension: &EnforcementSuspension) -> Result<(), DbError> {
        let conn = self.client.connection()?;
        conn.execute(
            "INSERT INTO enforcement_suspensions (id, site_id, start_date, end_date, reason, created_by, active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                suspension.id.to_string(),
                suspension.site_id.clone(),
                ts(suspension.start_date),
                ts_opt(suspension.end_date),
                suspension.reason.clone(),
                suspension.created_by.clone(),
                suspension.active as i64,
            ],
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn end(&self, id: Uuid, ended_at: DateTime<Utc>) -> Result<(), DbError> {
        let conn = self.client.connection()?;
        conn.execute(
            "UPDATE enforcement_suspensions SET end_date = ?2 WHERE id = ?1",
            params![id.to_string(), ts(ended_at)],
        )
        .await?;
        Ok(())
    }

    /// Whether enforcement is suspended at `site_id` at `timestamp` — the
    /// lookup C4 consults first, every time.
    #[instrument(skip(self))]
    pub async fn is_disabled(&self, site_id: &str, timestamp: DateTime<Utc>) -> Result<bool, DbError> {
        let conn = self.client.connection()?;
        let ts_value = ts(timestamp);
        let mut rows = conn
            .query(
                "SELECT 1 FROM enforcement_suspensions
                 WHERE site_id = ?1 AND active = 1 AND start_date <= ?2 AND (end_date IS NULL OR end_date >= ?2)
                 LIMIT 1",
                params![site_id, ts_value],
            )
            .await?;
        Ok(rows.next().await?.is_some())
    }

    /// Retroactively flips matching decisions in one bulk statement
    /// (spec.md §4.7): `ENFORCEMENT_CANDIDATE`/`NEW` decisions whose
    /// session started inside `[start_date, end_date]` become
    /// `COMPLIANT`/`ENFORCEMENT_DISABLED_RETROACTIVE`/`AUTO_RESOLVED`.
    /// Returns the number of decisions flipped.
    #[instrument(skip(self))]
    pub async fn retroactively_flip(
        &self,
        site_id: &str,
        start_date: DateTime<Utc>,
        end_date: Option<DateTime<Utc>>,
        suspension_id: Uuid,
    ) -> Result<usize, DbError> {
        let conn = self.client.connection()?;
        let sql = "UPDATE decisions
                    SET outcome = 'COMPLIANT',
                        rule_applied = 'ENFORCEMENT_DISABLED_RETROACTIVE',
                        status = 'AUTO_RESOLVED',
                        rationale = rationale || ' | RECONCILED: suspension ' || ?4 || ' created retroactively'
                    WHERE outcome = 'ENFORCEMENT_CANDIDATE' AND status = 'NEW'
                      AND session_id IN (
                          SELECT id FROM sessions
                          WHERE site_id = ?1 AND start_time >= ?2 AND (?3 IS NULL OR start_time <= ?3)
                      )";
        let rows_affected = conn
            .execute(sql, params![site_id, ts(start_date), ts_opt(end_date), suspension_id.to_string()])
            .await?;
        Ok(rows_affected as usize)
    }
}
