//! Scheduled expiry sweep for the Session Reconstructor (C3, spec.md §4.3):
//! hourly, at most 1,000 sessions per pass, oldest first. The Rule Engine is
//! never invoked for expiry.

use crate::services::singleton_guard::JobGuard;
use crate::state::AppState;
use anpr_domain_models::{ActorType, AuditAction, AuditEntry};
use anpr_domain_sessions::expire_if_stale;
use chrono::{Duration as ChronoDuration, Utc};
use std::time::Duration;
use tokio::time::interval;
use tracing::{info, instrument, warn};
use uuid::Uuid;

const JOB_NAME: &str = "session_expirer";
const TICK_INTERVAL: Duration = Duration::from_secs(3600);
const LOCK_TTL: Duration = Duration::from_secs(3600);

pub fn spawn(state: AppState, stale_threshold: ChronoDuration, batch_limit: i64) {
    tokio::spawn(async move {
        let mut ticker = interval(TICK_INTERVAL);
        loop {
            ticker.tick().await;
            if let Err(error) = run_once(&state, stale_threshold, batch_limit).await {
                warn!(%error, "session expiry sweep failed");
            }
        }
    });
}

#[instrument(skip(state))]
async fn run_once(state: &AppState, stale_threshold: ChronoDuration, batch_limit: i64) -> anyhow::Result<()> {
    let Some(guard) = JobGuard::acquire(state.job_locks.clone(), JOB_NAME, LOCK_TTL, "session-expirer").await? else {
        info!(job = JOB_NAME, "skipped: lock already held");
        return Ok(());
    };

    let now = Utc::now();
    let cutoff = now - stale_threshold;
    let candidates = state.sessions.list_stale_open(cutoff, batch_limit).await?;

    let mut expired_count = 0usize;
    for session in candidates {
        let Some(expired) = expire_if_stale(&session, now, stale_threshold) else {
            continue;
        };
        state.sessions.expire(session.id, expired.end_time, expired.duration_minutes).await?;
        let _ = state
            .audit
            .insert(&AuditEntry {
                id: Uuid::new_v4(),
                entity_type: "session".into(),
                entity_id: session.id.to_string(),
                action: AuditAction::SessionExpired,
                actor: "session-expirer".into(),
                actor_type: ActorType::Scheduler,
                site_id: Some(session.site_id.clone()),
                vrm: Some(session.vrm.clone()),
                details: serde_json::json!({ "durationMinutes": expired.duration_minutes }),
                timestamp: now,
                parent_audit_id: None,
            })
            .await;
        expired_count += 1;
    }

    if expired_count > 0 {
        info!(expired_count, "expired stale open sessions");
    }

    guard.release().await?;
    Ok(())
}
