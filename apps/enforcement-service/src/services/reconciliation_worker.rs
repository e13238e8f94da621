//! Reconciliation Service (C5) dispatch queue. Ingestion enqueues a job and
//! returns immediately (spec.md §5: reconciliation must not block the
//! ingestion response); this worker drains the queue on a detached task and
//! applies the update-if-mutable policy to every overlapping session.
//!
//! The channel is bounded and callers block on a full queue rather than
//! dropping a job — a lost reconciliation would silently leave a Decision
//! stale, which spec.md §5 treats as worse than backpressure.

use crate::state::AppState;
use anpr_domain_models::{AuditAction, AuditEntry, Decision};
use anpr_domain_reconciliation::{reconcile_decision, session_overlaps, ReconciliationResult, ReconciliationSummary};
use anpr_domain_rules::{evaluate, EvaluationContext, RationaleSuffix};
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub enum ReconciliationJob {
    Payment {
        vrm: String,
        site_id: String,
        start_time: DateTime<Utc>,
        expiry_time: DateTime<Utc>,
        payment_id: Uuid,
    },
    Permit {
        vrm: String,
        site_id: Option<String>,
        active: bool,
    },
}

/// The queue is considered hot once it is 80% full; `enqueue` logs a
/// warning at that point instead of dropping the job, so operators see
/// sustained backpressure before senders start blocking outright.
fn is_hot(tx: &mpsc::Sender<ReconciliationJob>) -> bool {
    let capacity = tx.max_capacity();
    if capacity == 0 {
        return false;
    }
    let available = tx.capacity();
    (capacity - available) as f64 / capacity as f64 >= 0.8
}

#[instrument(skip(tx, job))]
pub async fn enqueue(tx: &mpsc::Sender<ReconciliationJob>, job: ReconciliationJob) {
    if is_hot(tx) {
        warn!("reconciliation queue above 80% capacity, sender will block if it fills further");
    }
    if tx.send(job).await.is_err() {
        warn!("reconciliation worker has shut down, job dropped");
    }
}

/// Drains the queue until the sender half is dropped (process shutdown).
/// One job failing does not stop the worker; the failure is logged and the
/// next job is picked up.
pub async fn spawn(state: AppState, mut rx: mpsc::Receiver<ReconciliationJob>) {
    tokio::spawn(async move {
        info!("reconciliation worker started");
        while let Some(job) = rx.recv().await {
            if let Err(error) = process_job(&state, &job).await {
                warn!(?job, %error, "reconciliation job failed");
            }
        }
        info!("reconciliation worker stopped: channel closed");
    });
}

#[instrument(skip(state, job))]
async fn process_job(state: &AppState, job: &ReconciliationJob) -> anyhow::Result<()> {
    match job {
        ReconciliationJob::Payment {
            vrm,
            site_id,
            start_time,
            expiry_time,
            payment_id,
        } => {
            let sessions = state.sessions.list_completed_overlapping(vrm, site_id, *start_time, *expiry_time).await?;
            debug_assert!(sessions.iter().all(|s| session_overlaps(s, *start_time, *expiry_time)));
            let summary = reevaluate_sessions(state, sessions, RationaleSuffix::Reconciled, &format!("payment {payment_id}")).await?;
            info!(
                vrm,
                site_id,
                sessions_reevaluated = summary.sessions_reevaluated,
                decisions_updated = summary.decisions_updated,
                "onPayment reconciliation complete"
            );
        }
        ReconciliationJob::Permit { vrm, site_id, active } => {
            if !*active {
                return Ok(());
            }
            let sessions = state.sessions.list_completed_for_vrm(vrm, site_id.as_deref()).await?;
            let summary = reevaluate_sessions(state, sessions, RationaleSuffix::Reconciled, "permit update").await?;
            info!(
                vrm,
                site_id = site_id.as_deref().unwrap_or("*"),
                sessions_reevaluated = summary.sessions_reevaluated,
                decisions_updated = summary.decisions_updated,
                "onPermit reconciliation complete"
            );
        }
    }
    Ok(())
}

/// Bulk form used by admin tooling: `onSite(siteId, limit)`. Re-evaluates
/// up to `limit` completed sessions for the site, oldest first.
#[instrument(skip(state))]
pub async fn on_site(state: &AppState, site_id: &str, limit: i64) -> anyhow::Result<ReconciliationSummary> {
    let sessions = state.sessions.list_completed_for_site(site_id, limit).await?;
    reevaluate_sessions(state, sessions, RationaleSuffix::Reconciled, "onSite bulk reconciliation").await
}

async fn reevaluate_sessions(
    state: &AppState,
    sessions: Vec<anpr_domain_models::Session>,
    suffix_kind: RationaleSuffix,
    suffix_detail: &str,
) -> anyhow::Result<ReconciliationSummary> {
    let mut summary = ReconciliationSummary::default();
    for session in sessions {
        let Some(existing) = state.decisions.get_by_session(session.id).await? else {
            continue;
        };
        let site = state.sites.get(&session.site_id).await?;
        let Some(site) = site else { continue };
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
        let verdict = evaluate(&session, &ctx, Utc::now());
        let result = reconcile_decision(&existing, &verdict, suffix_kind, suffix_detail);
        if let ReconciliationResult::Updated { outcome, rule_applied, rationale, params } = &result {
            let updated = Decision {
                id: existing.id,
                session_id: existing.session_id,
                outcome: *outcome,
                rule_applied: rule_applied.clone(),
                rationale: rationale.clone(),
                status: existing.status,
                params: params.clone(),
            };
            state.decisions.update_in_place(&updated).await?;
            let _ = state
                .audit
                .insert(&AuditEntry {
                    id: Uuid::new_v4(),
                    entity_type: "decision".into(),
                    entity_id: updated.id.to_string(),
                    action: AuditAction::DecisionReconciled,
                    actor: "reconciliation-worker".into(),
                    actor_type: anpr_domain_models::ActorType::System,
                    site_id: Some(session.site_id.clone()),
                    vrm: Some(session.vrm.clone()),
                    details: serde_json::json!({ "ruleApplied": updated.rule_applied, "suffix": suffix_detail }),
                    timestamp: Utc::now(),
                    parent_audit_id: None,
                })
                .await;
        }
        summary.record(&result);
    }
    Ok(summary)
}
