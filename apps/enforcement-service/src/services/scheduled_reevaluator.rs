//! Scheduled Re-evaluator (C6, spec.md §4.6): every 30 minutes, re-runs the
//! Rule Engine against up to 500 ENFORCEMENT_CANDIDATE decisions still in
//! {NEW, CANDIDATE}, oldest session first. Per-item failures are isolated;
//! a batch-level summary is logged and never flips a human-reviewed
//! decision (the repository scan already excludes those by status).

use crate::services::singleton_guard::JobGuard;
use crate::state::AppState;
use anpr_domain_models::{ActorType, AuditAction, AuditEntry, Decision};
use anpr_domain_reconciliation::{ScheduledReevaluationSummary, SCHEDULED_REEVALUATION_BATCH_LIMIT};
use anpr_domain_rules::{evaluate, may_overwrite, EvaluationContext, RationaleSuffix};
use chrono::Utc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{info, instrument, warn};
use uuid::Uuid;

const JOB_NAME: &str = "scheduled_reevaluator";
const TICK_INTERVAL: Duration = Duration::from_secs(30 * 60);
const LOCK_TTL: Duration = Duration::from_secs(30 * 60);

pub fn spawn(state: AppState, batch_limit: i64) {
    let batch_limit = batch_limit.min(SCHEDULED_REEVALUATION_BATCH_LIMIT as i64);
    tokio::spawn(async move {
        let mut ticker = interval(TICK_INTERVAL);
        loop {
            ticker.tick().await;
            if let Err(error) = run_once(&state, batch_limit).await {
                warn!(%error, "scheduled re-evaluation pass failed");
            }
        }
    });
}

#[instrument(skip(state))]
async fn run_once(state: &AppState, batch_limit: i64) -> anyhow::Result<()> {
    let Some(guard) = JobGuard::acquire(state.job_locks.clone(), JOB_NAME, LOCK_TTL, "scheduled-reevaluator").await? else {
        info!(job = JOB_NAME, "skipped: lock already held");
        return Ok(());
    };

    let mut summary = ScheduledReevaluationSummary::default();
    let candidates = state.decisions.list_candidates_for_scheduled_scan(batch_limit).await?;

    for (existing, session) in candidates {
        match reevaluate_one(state, &existing, &session).await {
            Ok(updated) => summary.record_processed(updated),
            Err(error) => summary.record_error(existing.id, error.to_string()),
        }
    }

    info!(
        processed = summary.processed,
        updated = summary.updated,
        errors = summary.errors.len(),
        "scheduled re-evaluation pass complete"
    );

    guard.release().await?;
    Ok(())
}

async fn reevaluate_one(state: &AppState, existing: &Decision, session: &anpr_domain_models::Session) -> anyhow::Result<bool> {
    if !may_overwrite(existing) {
        return Ok(false);
    }

    let Some(site) = state.sites.get(&session.site_id).await? else {
        return Ok(false);
    };
    let permits = state.permits.list_for_vrm(&session.vrm).await?;
    let payments = state.payments.list_for_vrm_site(&session.vrm, &session.site_id).await?;
    let suspension_active = state.suspensions.is_disabled(&session.site_id, session.start_time).await?;
    let site_has_historical_payments = state.payments.site_has_any_payment(&session.site_id).await?;

    let ctx = EvaluationContext {
        site_id: &session.site_id,
        grace: site.config.grace,
        enforcement_type: site.config.enforcement_type,
        suspension_active,
        permits: &permits,
        payments: &payments,
        site_has_historical_payments,
    };
    let verdict = evaluate(session, &ctx, Utc::now());

    if existing.outcome == verdict.outcome && existing.rule_applied == verdict.rule_applied {
        return Ok(false);
    }

    let updated = Decision {
        id: existing.id,
        session_id: existing.session_id,
        outcome: verdict.outcome,
        rule_applied: verdict.rule_applied.to_string(),
        rationale: anpr_domain_rules::append_rationale(&existing.rationale, RationaleSuffix::AutoReevaluated, "scheduled re-evaluation"),
        status: existing.status,
        params: verdict.params.clone(),
    };
    state.decisions.update_in_place(&updated).await?;

    let _ = state
        .audit
        .insert(&AuditEntry {
            id: Uuid::new_v4(),
            entity_type: "decision".into(),
            entity_id: updated.id.to_string(),
            action: AuditAction::DecisionAutoReevaluated,
            actor: "scheduled-reevaluator".into(),
            actor_type: ActorType::Scheduler,
            site_id: Some(session.site_id.clone()),
            vrm: Some(session.vrm.clone()),
            details: serde_json::json!({ "ruleApplied": updated.rule_applied }),
            timestamp: Utc::now(),
            parent_audit_id: None,
        })
        .await;

    Ok(true)
}
