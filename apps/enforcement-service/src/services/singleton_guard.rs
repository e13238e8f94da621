//! Store-backed singleton guard for the scheduled jobs (spec.md §5: a
//! second tick must observe an "already running" flag and skip). Wraps
//! `JobLockRepository`'s conditional-update claim with an explicit
//! acquire/release pair instead of a `Drop` impl, since releasing a lock
//! is itself an async database call.

use anpr_infra_db::{DbError, JobLockRepository};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

pub struct JobGuard {
    job_locks: Arc<JobLockRepository>,
    job_name: String,
}

impl JobGuard {
    /// Attempts to claim `job_name`'s lock for `ttl`. Returns `None` when
    /// another tick (or another process) already holds it.
    #[instrument(skip(job_locks))]
    pub async fn acquire(
        job_locks: Arc<JobLockRepository>,
        job_name: &str,
        ttl: Duration,
        locked_by: &str,
    ) -> Result<Option<Self>, DbError> {
        let acquired = job_locks
            .try_acquire(job_name, chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero()), locked_by)
            .await?;
        if acquired {
            Ok(Some(Self {
                job_locks,
                job_name: job_name.to_string(),
            }))
        } else {
            Ok(None)
        }
    }

    pub async fn release(self) -> Result<(), DbError> {
        self.job_locks.release(&self.job_name).await
    }
}
