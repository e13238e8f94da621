use crate::client::DbClient;
use crate::errors::DbError;
use crate::mapping::{parse_ts, parse_ts_opt, ts};
use anpr_domain_models::{Session, SessionStatus};
use chrono::{DateTime, Utc};
use libsql::params;
use tracing::instrument;
use uuid::Uuid;

pub struct SessionRepository {
    client: DbClient,
}

impl SessionRepository {
    pub fn new(client: DbClient) -> Self {
        Self { client }
    }

    fn map_row(row: &libsql::Row) -> Result<Session, DbError> {
        let status_raw: String = row.get(8)?;
        let status = match status_raw.as_str() {
            "PROVISIONAL" => SessionStatus::Provisional,
            "COMPLETED" => SessionStatus::Completed,
            "EXPIRED" => SessionStatus::Expired,
            other => return Err(DbError::MappingError(format!("unknown session status {other}"))),
        };
        Ok(Session {
            id: row.get::<String>(0)?.parse().map_err(|e| DbError::MappingError(format!("{e}")))?,
            site_id: row.get(1)?,
            vrm: row.get(2)?,
            start_time: parse_ts(&row.get::<String>(3)?)?,
            end_time: parse_ts_opt(row.get::<Option<String>>(4)?)?,
            duration_minutes: row.get(5)?,
            entry_movement_id: row.get::<String>(6)?.parse().map_err(|e| DbError::MappingError(format!("{e}")))?,
            exit_movement_id: row
                .get::<Option<String>>(7)?
                .map(|s| s.parse())
                .transpose()
                .map_err(|e| DbError::MappingError(format!("{e}")))?,
            status,
        })
    }

    const COLUMNS: &'static str =
        "id, site_id, vrm, start_time, end_time, duration_minutes, entry_movement_id, exit_movement_id, status";

    #[instrument(skip(self))]
    pub async fn find_open(&self, site_id: &str, vrm: &str) -> Result<Option<Session>, DbError> {
        let conn = self.client.connection()?;
        let sql = format!("SELECT {} FROM sessions WHERE site_id = ?1 AND vrm = ?2 AND end_time IS NULL", Self::COLUMNS);
        let mut rows = conn.query(&sql, params![site_id, vrm]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::map_row(&row)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    pub async fn get(&self, session_id: Uuid) -> Result<Option<Session>, DbError> {
        let conn = self.client.connection()?;
        let sql = format!("SELECT {} FROM sessions WHERE id = ?1", Self::COLUMNS);
        let mut rows = conn.query(&sql, params![session_id.to_string()]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::map_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Opens a new PROVISIONAL session. The partial unique index on
    /// `(site_id, vrm) WHERE end_time IS NULL` is the race guard: a
    /// concurrent duplicate ENTRY loses here with a `UniqueViolation`
    /// which the caller treats as `DuplicateEntrySkipped`.
    #[instrument(skip(self, session))]
    pub async fn open(&self, session: &Session) -> Result<(), DbError> {
        let conn = self.client.connection()?;
        let result = conn
            .execute(
                "INSERT INTO sessions (id, site_id, vrm, start_time, end_time, duration_minutes, entry_movement_id, exit_movement_id, status)
                 VALUES (?1, ?2, ?3, ?4, NULL, NULL, ?5, NULL, 'PROVISIONAL')",
                params![
                    session.id.to_string(),
                    session.site_id.clone(),
                    session.vrm.clone(),
                    ts(session.start_time),
                    session.entry_movement_id.to_string(),
                ],
            )
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(e) => Err(crate::errors::classify(e)),
        }
    }

    #[instrument(skip(self))]
    pub async fn close(
        &self,
        session_id: Uuid,
        end_time: DateTime<Utc>,
        duration_minutes: i64,
        exit_movement_id: Uuid,
    ) -> Result<(), DbError> {
        let conn = self.client.connection()?;
        conn.execute(
            "UPDATE sessions SET end_time = ?2, duration_minutes = ?3, exit_movement_id = ?4, status = 'COMPLETED' WHERE id = ?1",
            params![session_id.to_string(), ts(end_time), duration_minutes, exit_movement_id.to_string()],
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn expire(&self, session_id: Uuid, end_time: DateTime<Utc>, duration_minutes: i64) -> Result<(), DbError> {
        let conn = self.client.connection()?;
        conn.execute(
            "UPDATE sessions SET end_time = ?2, duration_minutes = ?3, status = 'EXPIRED' WHERE id = ?1",
            params![session_id.to_string(), ts(end_time), duration_minutes],
        )
        .await?;
        Ok(())
    }

    /// Open sessions whose `start_time` is at least `stale_threshold`
    /// minutes in the past, oldest first, capped at `limit` (C3's
    /// scheduled expiry runs at most 1,000 per pass).
    #[instrument(skip(self))]
    pub async fn list_stale_open(&self, cutoff: DateTime<Utc>, limit: i64) -> Result<Vec<Session>, DbError> {
        let conn = self.client.connection()?;
        let sql = format!(
            "SELECT {} FROM sessions WHERE end_time IS NULL AND start_time <= ?1 ORDER BY start_time ASC LIMIT ?2",
            Self::COLUMNS
        );
        let mut rows = conn.query(&sql, params![ts(cutoff), limit]).await?;
        let mut sessions = Vec::new();
        while let Some(row) = rows.next().await? {
            sessions.push(Self::map_row(&row)?);
        }
        Ok(sessions)
    }

    /// Completed sessions for `(vrm, site)` overlapping `[start, expiry]`
    /// — candidate set for Reconciliation's `onPayment`.
    #[instrument(skip(self))]
    pub async fn list_completed_overlapping(
        &self,
        vrm: &str,
        site_id: &str,
        start: DateTime<Utc>,
        expiry: DateTime<Utc>,
    ) -> Result<Vec<Session>, DbError> {
        let conn = self.client.connection()?;
        let sql = format!(
            "SELECT {} FROM sessions WHERE vrm = ?1 AND site_id = ?2 AND status = 'COMPLETED' AND start_time <= ?4 AND end_time >= ?3",
            Self::COLUMNS
        );
        let mut rows = conn.query(&sql, params![vrm, site_id, ts(start), ts(expiry)]).await?;
        let mut sessions = Vec::new();
        while let Some(row) = rows.next().await? {
            sessions.push(Self::map_row(&row)?);
        }
        Ok(sessions)
    }

    /// Completed sessions for a vrm, optionally narrowed to one site —
    /// candidate set for Reconciliation's `onPermit`.
    #[instrument(skip(self))]
    pub async fn list_completed_for_vrm(&self, vrm: &str, site_id: Option<&str>) -> Result<Vec<Session>, DbError> {
        let conn = self.client.connection()?;
        let mut sessions = Vec::new();
        match site_id {
            Some(site_id) => {
                let sql = format!(
                    "SELECT {} FROM sessions WHERE vrm = ?1 AND site_id = ?2 AND status = 'COMPLETED'",
                    Self::COLUMNS
                );
                let mut rows = conn.query(&sql, params![vrm, site_id]).await?;
                while let Some(row) = rows.next().await? {
                    sessions.push(Self::map_row(&row)?);
                }
            }
            None => {
                let sql = format!("SELECT {} FROM sessions WHERE vrm = ?1 AND status = 'COMPLETED'", Self::COLUMNS);
                let mut rows = conn.query(&sql, params![vrm]).await?;
                while let Some(row) = rows.next().await? {
                    sessions.push(Self::map_row(&row)?);
                }
            }
        }
        Ok(sessions)
    }

    /// Completed sessions at a site, used by `onSite` bulk reconciliation.
    #[instrument(skip(self))]
    pub async fn list_completed_for_site(&self, site_id: &str, limit: i64) -> Result<Vec<Session>, DbError> {
        let conn = self.client.connection()?;
        let sql = format!(
            "SELECT {} FROM sessions WHERE site_id = ?1 AND status = 'COMPLETED' ORDER BY start_time ASC LIMIT ?2",
            Self::COLUMNS
        );
        let mut rows = conn.query(&sql, params![site_id, limit]).await?;
        let mut sessions = Vec::new();
        while let Some(row) = rows.next().await? {
            sessions.push(Self::map_row(&row)?);
        }
        Ok(sessions)
    }
}
