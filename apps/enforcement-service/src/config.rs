//! Typed environment configuration, read once at startup. Mirrors the
//! `std::env::var(...).unwrap_or_else(...)` style the rest of this
//! workspace uses instead of pulling in a config-parsing crate.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_auth_token: Option<String>,
    /// Hourly Session Reconstructor expiry sweep (spec.md §6: `0 * * * *`).
    pub stale_session_threshold: Duration,
    pub session_expiry_batch_limit: i64,
    /// 30-minute Scheduled Re-evaluator sweep (spec.md §6: `*/30 * * * *`).
    pub scheduled_reevaluation_batch_limit: i64,
    /// Capacity of the reconciliation job channel (spec.md §5).
    pub reconciliation_channel_capacity: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| ":memory:".to_string());
        let database_auth_token = std::env::var("DATABASE_AUTH_TOKEN").ok();

        let stale_session_threshold_hours: i64 = std::env::var("STALE_SESSION_THRESHOLD_HOURS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(anpr_domain_sessions::DEFAULT_STALE_THRESHOLD_HOURS);

        let session_expiry_batch_limit: i64 = std::env::var("SESSION_EXPIRY_BATCH_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1000);

        let scheduled_reevaluation_batch_limit: i64 =
            std::env::var("SCHEDULED_REEVALUATION_BATCH_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(anpr_domain_reconciliation::SCHEDULED_REEVALUATION_BATCH_LIMIT as i64);

        let reconciliation_channel_capacity: usize =
            std::env::var("RECONCILIATION_CHANNEL_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(256);

        Ok(Self {
            database_url,
            database_auth_token,
            stale_session_threshold: Duration::from_secs(stale_session_threshold_hours as u64 * 3600),
            session_expiry_batch_limit,
            scheduled_reevaluation_batch_limit,
            reconciliation_channel_capacity,
        })
    }
}
