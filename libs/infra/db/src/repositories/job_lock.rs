use crate::client::DbClient;
use crate::errors::DbError;
use crate::mapping::ts;
use chrono::{Duration, Utc};
use libsql::params;
use tracing::{info, instrument};

/// Store-backed singleton lock for scheduled jobs (C6's re-evaluator, C3's
/// expiry sweep, the reconciliation dispatcher's drain loop). Mirrors the
/// job-claim pattern used for mission ownership: a conditional `UPDATE`
/// whose affected-row count tells the caller whether it won the lock.
pub struct JobLockRepository {
    client: DbClient,
}

impl JobLockRepository {
    pub fn new(client: DbClient) -> Self {
        Self { client }
    }

    /// Attempts to acquire `job_name`'s lock. Succeeds when no row exists
    /// yet, or when the existing lock is older than `ttl`.
    #[instrument(skip(self))]
    pub async fn try_acquire(&self, job_name: &str, ttl: Duration, locked_by: &str) -> Result<bool, DbError> {
        let conn = self.client.connection()?;
        conn.execute(
            "INSERT OR IGNORE INTO scheduled_job_locks (job_name, locked_at, locked_by) VALUES (?1, NULL, NULL)",
            params![job_name],
        )
        .await?;

        let cutoff = Utc::now() - ttl;
        let rows_affected = conn
            .execute(
                "UPDATE scheduled_job_locks SET locked_at = ?2, locked_by = ?3
                 WHERE job_name = ?1 AND (locked_at IS NULL OR locked_at < ?4)",
                params![job_name, ts(Utc::now()), locked_by, ts(cutoff)],
            )
            .await?;

        Ok(rows_affected > 0)
    }

    #[instrument(skip(self))]
    pub async fn release(&self, job_name: &str) -> Result<(), DbError> {
        let conn = self.client.connection()?;
        conn.execute(
            "UPDATE scheduled_job_locks SET locked_at = NULL, locked_by = NULL WHERE job_name = ?1",
            params![job_name],
        )
        .await?;
        Ok(())
    }

    /// Releases every lock unconditionally. Run once at process start:
    /// any lock still held belongs to a process that crashed before
    /// calling `release`, since a single process instance is assumed per
    /// deployment.
    #[instrument(skip(self))]
    pub async fn clear_stale(&self) -> Result<(), DbError> {
        let conn = self.client.connection()?;
        let rows_affected = conn
            .execute("UPDATE scheduled_job_locks SET locked_at = NULL, locked_by = NULL WHERE locked_at IS NOT NULL", ())
            .await?;
        if rows_affected > 0 {
            info!(rows_affected, "cleared stale job locks from a previous run");
        }
        Ok(())
    }
}
