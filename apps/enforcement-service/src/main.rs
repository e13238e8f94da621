use anpr_enforcement_service::services::{reconciliation_worker, scheduled_reevaluator, session_expirer};
use anpr_enforcement_service::{AppState, Config, EnforcementCore};
use anpr_infra_db::{DbClient, JobLockRepository};
use dotenvy::dotenv;
use std::sync::Arc;
use tracing::info;

fn main() -> anyhow::Result<()> {
    dotenv().ok();
    anpr_shared_telemetry::init_tracing("anpr_enforcement_service");

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;

    runtime.block_on(async {
        let config = Config::from_env()?;

        let client = DbClient::connect(&config.database_url, config.database_auth_token.clone()).await?;
        let job_locks = Arc::new(JobLockRepository::new(client.clone()));
        job_locks.clear_stale().await?;

        let (state, reconciliation_rx) = AppState::new(client, config.reconciliation_channel_capacity).await?;
        let _core = EnforcementCore::new(state.clone());

        session_expirer::spawn(
            state.clone(),
            chrono::Duration::from_std(config.stale_session_threshold)?,
            config.session_expiry_batch_limit,
        );
        scheduled_reevaluator::spawn(state.clone(), config.scheduled_reevaluation_batch_limit);
        reconciliation_worker::spawn(state, reconciliation_rx).await;

        info!("enforcement service running; background jobs active, awaiting shutdown signal");
        tokio::signal::ctrl_c().await?;
        info!("shutdown signal received, exiting");

        Ok(())
    })
}
