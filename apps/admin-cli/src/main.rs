//! Operator front end over `EnforcementCore`. No HTTP layer is involved;
//! this binary connects straight to the database and calls the facade the
//! same way an HTTP handler would.

use anpr_domain_models::DecisionStatus;
use anpr_enforcement_service::{AppState, Config, EnforcementCore};
use anpr_infra_db::DbClient;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use dotenvy::dotenv;
use tracing::info;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(author, version, about = "Operator tooling for the ANPR enforcement core")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new enforcement suspension and retroactively flip any
    /// decisions it covers.
    SuspensionCreate {
        #[arg(long)]
        site_id: String,
        #[arg(long, value_parser = parse_timestamp)]
        start: DateTime<Utc>,
        #[arg(long, value_parser = parse_timestamp)]
        end: Option<DateTime<Utc>>,
        #[arg(long)]
        reason: String,
        #[arg(long)]
        created_by: String,
    },
    /// End an active suspension. Does not reverse prior retroactive flips.
    SuspensionEnd {
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        reason: String,
        #[arg(long)]
        ended_by: String,
    },
    /// Bulk reconciliation for one site: re-evaluates up to `limit`
    /// completed sessions, oldest first.
    ReconcileSite {
        #[arg(long)]
        site_id: String,
        #[arg(long, default_value_t = 500)]
        limit: i64,
    },
    /// Approve a pending plate review.
    ReviewApprove {
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        reviewer: String,
    },
    /// Correct a pending plate review's vrm.
    ReviewCorrect {
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        reviewer: String,
        #[arg(long)]
        vrm: String,
    },
    /// Discard a pending plate review.
    ReviewDiscard {
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        reviewer: String,
        #[arg(long)]
        reason: String,
    },
    /// Discard every pending plate review whose suspicion reasons match a tag.
    BulkDiscardByReason {
        #[arg(long)]
        tag: String,
        #[arg(long, default_value_t = 100)]
        limit: i64,
        #[arg(long)]
        reviewer: String,
    },
    /// Finalize an enforcement-candidate decision as approved or declined.
    ReviewDecision {
        #[arg(long)]
        id: Uuid,
        #[arg(long)]
        status: FinalDecisionStatus,
        #[arg(long)]
        reviewer: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FinalDecisionStatus {
    Approved,
    Declined,
}

impl From<FinalDecisionStatus> for DecisionStatus {
    fn from(value: FinalDecisionStatus) -> Self {
        match value {
            FinalDecisionStatus::Approved => DecisionStatus::Approved,
            FinalDecisionStatus::Declined => DecisionStatus::Declined,
        }
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("invalid RFC3339 timestamp {raw:?}: {e}"))
}

fn main() -> anyhow::Result<()> {
    dotenv().ok();
    anpr_shared_telemetry::init_tracing("anpr_admin_cli");

    let cli = Cli::parse();
    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(run(cli))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let client = DbClient::connect(&config.database_url, config.database_auth_token.clone()).await?;
    let (state, _reconciliation_rx) = AppState::new(client, config.reconciliation_channel_capacity).await?;
    let core = EnforcementCore::new(state);

    match cli.command {
        Command::SuspensionCreate {
            site_id,
            start,
            end,
            reason,
            created_by,
        } => {
            let (suspension, flipped) = core.create_suspension(&site_id, start, end, &reason, &created_by).await?;
            info!(suspension_id = %suspension.id, flipped, "suspension created");
            println!("created suspension {} ({flipped} decisions retroactively flipped)", suspension.id);
        }
        Command::SuspensionEnd { id, reason, ended_by } => {
            core.end_suspension(id, &reason, &ended_by).await?;
            println!("ended suspension {id}");
        }
        Command::ReconcileSite { site_id, limit } => {
            let summary = core.reconcile_site(&site_id, limit).await?;
            println!(
                "reconciled {site_id}: {} sessions re-evaluated, {} decisions updated",
                summary.sessions_reevaluated, summary.decisions_updated
            );
        }
        Command::ReviewApprove { id, reviewer } => {
            core.review_approve(id, &reviewer).await?;
            println!("approved plate review {id}");
        }
        Command::ReviewCorrect { id, reviewer, vrm } => {
            core.review_correct(id, &reviewer, &vrm).await?;
            println!("corrected plate review {id} to {vrm}");
        }
        Command::ReviewDiscard { id, reviewer, reason } => {
            core.review_discard(id, &reviewer, &reason).await?;
            println!("discarded plate review {id}");
        }
        Command::BulkDiscardByReason { tag, limit, reviewer } => {
            let summary = core.bulk_discard_by_reason(&tag, limit, &reviewer).await?;
            println!(
                "bulk discard by {tag:?}: {}/{} discarded, {} errors",
                summary.discarded,
                summary.attempted,
                summary.errors.len()
            );
        }
        Command::ReviewDecision { id, status, reviewer } => {
            core.review_decision(id, status.into(), &reviewer).await?;
            println!("decision {id} finalized");
        }
    }

    Ok(())
}
