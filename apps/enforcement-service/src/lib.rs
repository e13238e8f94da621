//! Process-level wiring for the ANPR enforcement core: a plain async facade
//! over the domain crates and the persistence adapter. There is no HTTP
//! layer here — transport is an external collaborator — so this crate
//! exposes the shape an HTTP controller (or the admin CLI) would call into.

pub mod config;
pub mod errors;
pub mod services;
pub mod state;

pub use config::Config;
pub use errors::{DecisionReviewError, IngestError, ReviewFacadeError, SuspensionFacadeError};
pub use state::AppState;

use anpr_domain_ingestion::{merge_images, payment_identity, permit_identity, prepare_movement, PermitIdentity, RawMovement};
use anpr_domain_models::{
    ActorType, AuditAction, AuditEntry, Decision, DecisionStatus, Movement, MovementImage, Payment, Permit,
    PermitScope, PermitType, Session,
};
use anpr_domain_reconciliation::ReconciliationSummary;
use anpr_domain_review::{approve, correct, discard, BulkDiscardSummary};
use anpr_domain_rules::{evaluate, may_overwrite, new_decision_id, EvaluationContext};
use anpr_domain_sessions::{decide_transition, Transition};
use anpr_domain_suspensions::validate_new_suspension;
use anpr_infra_db::DbError;
use chrono::{DateTime, Utc};
use services::reconciliation_worker::{self, ReconciliationJob};
use tracing::{instrument, warn};
use uuid::Uuid;

pub struct EnforcementCore {
    state: AppState,
}

#[derive(Debug, Clone)]
pub struct IngestMovementInput {
    pub site_id: String,
    pub vrm: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub camera_id: Option<String>,
    pub direction_signal: Option<String>,
    pub confidence: Option<f64>,
    pub images: Vec<MovementImage>,
    pub raw_payload: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct IngestMovementOutcome {
    pub movement: Movement,
    pub is_new: bool,
}

#[derive(Debug, Clone)]
pub struct IngestPaymentInput {
    pub site_id: String,
    pub vrm: String,
    pub amount: f64,
    pub start_time: DateTime<Utc>,
    pub expiry_time: DateTime<Utc>,
    pub source: String,
    pub external_reference: String,
}

#[derive(Debug, Clone)]
pub struct IngestPermitInput {
    pub vrm: String,
    pub site_id: Option<String>,
    pub permit_type: PermitType,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub active: bool,
    pub source: String,
    pub external_board_item_id: Option<String>,
}

impl EnforcementCore {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    async fn audit(
        &self,
        entity_type: &str,
        entity_id: String,
        action: AuditAction,
        actor: &str,
        actor_type: ActorType,
        site_id: Option<String>,
        vrm: Option<String>,
        details: serde_json::Value,
    ) {
        let entry = AuditEntry {
            id: Uuid::new_v4(),
            entity_type: entity_type.to_string(),
            entity_id,
            action,
            actor: actor.to_string(),
            actor_type,
            site_id,
            vrm,
            details,
            timestamp: Utc::now(),
            parent_audit_id: None,
        };
        if let Err(error) = self.state.audit.insert(&entry).await {
            warn!(%error, ?action, "audit write failed");
        }
    }

    /// Ingestion Pipeline (C2). Downstream failures (session reconstruction,
    /// decisioning) are logged and never fail the call — the movement,
    /// payment or permit must persist regardless (spec.md §4.2).
    #[instrument(skip(self, input))]
    pub async fn ingest_movement(&self, input: IngestMovementInput) -> Result<IngestMovementOutcome, IngestError> {
        let raw_vrm = input
            .vrm
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(IngestError::MissingPlate)?
            .to_string();

        let site = self
            .state
            .sites
            .get(&input.site_id)
            .await?
            .ok_or_else(|| IngestError::SiteNotFound(input.site_id.clone()))?;

        let normalized_vrm = self.state.plate_validator.normalize(&raw_vrm);
        if let Some(existing) = self
            .state
            .movements
            .find_by_dedupe_key(&input.site_id, &normalized_vrm, input.timestamp)
            .await?
        {
            let merged_images = merge_images(&existing.images, &input.images);
            self.state.movements.update_images(existing.id, &merged_images).await?;
            self.audit(
                "movement",
                existing.id.to_string(),
                AuditAction::MovementDuplicateDetected,
                "ingestion",
                ActorType::System,
                Some(input.site_id.clone()),
                Some(normalized_vrm),
                serde_json::json!({ "patchedImages": merged_images.len() }),
            )
            .await;
            return Ok(IngestMovementOutcome {
                movement: Movement {
                    images: merged_images,
                    ..existing
                },
                is_new: false,
            });
        }

        let raw = RawMovement {
            site_id: input.site_id.clone(),
            raw_vrm,
            timestamp: input.timestamp,
            camera_id: input.camera_id,
            direction_signal: input.direction_signal,
            images: input.images,
            raw_payload: input.raw_payload,
            confidence: input.confidence,
        };
        let prepared = prepare_movement(&raw, &site, &self.state.plate_validator);

        self.state.movements.insert(&prepared.movement).await?;
        self.audit(
            "movement",
            prepared.movement.id.to_string(),
            AuditAction::MovementIngested,
            "ingestion",
            ActorType::System,
            Some(input.site_id.clone()),
            Some(prepared.movement.vrm.clone()),
            serde_json::json!({ "direction": format!("{:?}", prepared.movement.direction) }),
        )
        .await;

        if let Some(review) = &prepared.plate_review {
            self.state.plate_reviews.insert(review).await?;
            self.audit(
                "plate_review",
                review.id.to_string(),
                AuditAction::PlateReviewCreated,
                "ingestion",
                ActorType::System,
                Some(input.site_id.clone()),
                Some(review.normalized_vrm.clone()),
                serde_json::json!({ "reasons": review.suspicion_reasons }),
            )
            .await;
        }

        if !prepared.movement.requires_review && !prepared.movement.discarded {
            if let Err(error) = self.run_session_reconstructor(&prepared.movement).await {
                warn!(%error, movement_id = %prepared.movement.id, "session reconstruction failed for a fresh movement");
            }
        }

        Ok(IngestMovementOutcome {
            movement: prepared.movement,
            is_new: true,
        })
    }

    /// Session Reconstructor (C3): decides and applies the next transition
    /// for this `(site, vrm)` stream, then invokes the Rule Engine when a
    /// session closes.
    async fn run_session_reconstructor(&self, movement: &Movement) -> anyhow::Result<()> {
        let existing_open = self.state.sessions.find_open(&movement.site_id, &movement.vrm).await?;
        let transition = decide_transition(existing_open.as_ref(), movement);

        match transition {
            Transition::OpenSession {
                start_time,
                entry_movement_id,
            } => {
                let session = Session {
                    id: Uuid::new_v4(),
                    site_id: movement.site_id.clone(),
                    vrm: movement.vrm.clone(),
                    start_time,
                    end_time: None,
                    duration_minutes: None,
                    entry_movement_id,
                    exit_movement_id: None,
                    status: anpr_domain_models::SessionStatus::Provisional,
                };
                match self.state.sessions.open(&session).await {
                    Ok(()) => {
                        self.audit(
                            "session",
                            session.id.to_string(),
                            AuditAction::SessionCreated,
                            "session-reconstructor",
                            ActorType::System,
                            Some(movement.site_id.clone()),
                            Some(movement.vrm.clone()),
                            serde_json::json!({}),
                        )
                        .await;
                    }
                    Err(DbError::UniqueViolation(_)) => {
                        self.audit(
                            "movement",
                            movement.id.to_string(),
                            AuditAction::DuplicateEntrySkipped,
                            "session-reconstructor",
                            ActorType::System,
                            Some(movement.site_id.clone()),
                            Some(movement.vrm.clone()),
                            serde_json::json!({}),
                        )
                        .await;
                    }
                    Err(other) => return Err(other.into()),
                }
            }
            Transition::DuplicateEntrySkipped => {
                self.audit(
                    "movement",
                    movement.id.to_string(),
                    AuditAction::DuplicateEntrySkipped,
                    "session-reconstructor",
                    ActorType::System,
                    Some(movement.site_id.clone()),
                    Some(movement.vrm.clone()),
                    serde_json::json!({}),
                )
                .await;
            }
            Transition::CloseSession {
                end_time,
                duration_minutes,
                exit_movement_id,
            } => {
                let Some(open_session) = existing_open else {
                    return Ok(());
                };
                self.state
                    .sessions
                    .close(open_session.id, end_time, duration_minutes, exit_movement_id)
                    .await?;
                let closed = Session {
                    end_time: Some(end_time),
                    duration_minutes: Some(duration_minutes),
                    exit_movement_id: Some(exit_movement_id),
                    status: anpr_domain_models::SessionStatus::Completed,
                    ..open_session
                };
                self.audit(
                    "session",
                    closed.id.to_string(),
                    AuditAction::SessionCompleted,
                    "session-reconstructor",
                    ActorType::System,
                    Some(closed.site_id.clone()),
                    Some(closed.vrm.clone()),
                    serde_json::json!({ "durationMinutes": duration_minutes }),
                )
                .await;
                self.evaluate_and_upsert_decision(&closed).await?;
            }
            Transition::OrphanExitBeforeEntry | Transition::OrphanExitNoSession => {
                warn!(movement_id = %movement.id, site_id = %movement.site_id, vrm = %movement.vrm, "orphan exit movement");
            }
            Transition::Ignored => {}
        }
        Ok(())
    }

    /// Rule Engine (C4): assembles the evaluation context from storage and
    /// either inserts a brand-new Decision or rewrites one that is still
    /// automatically mutable.
    async fn evaluate_and_upsert_decision(&self, session: &Session) -> anyhow::Result<()> {
        let Some(site) = self.state.sites.get(&session.site_id).await? else {
            warn!(site_id = %session.site_id, "decisioning skipped: site not found");
            return Ok(());
        };
        let permits = self.state.permits.list_for_vrm(&session.vrm).await?;
        let payments = self.state.payments.list_for_vrm_site(&session.vrm, &session.site_id).await?;
        let suspension_active = self.state.suspensions.is_disabled(&session.site_id, session.start_time).await?;
        let site_has_historical_payments = self.state.payments.site_has_any_payment(&session.site_id).await?;

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

        match self.state.decisions.get_by_session(session.id).await? {
            None => {
                let decision = Decision {
                    id: new_decision_id(),
                    session_id: session.id,
                    outcome: verdict.outcome,
                    rule_applied: verdict.rule_applied.to_string(),
                    rationale: verdict.rationale.clone(),
                    status: DecisionStatus::New,
                    params: verdict.params.clone(),
                };
                self.state.decisions.insert(&decision).await?;
                self.audit(
                    "decision",
                    decision.id.to_string(),
                    AuditAction::DecisionCreated,
                    "rule-engine",
                    ActorType::System,
                    Some(session.site_id.clone()),
                    Some(session.vrm.clone()),
                    serde_json::json!({ "outcome": format!("{:?}", decision.outcome), "ruleApplied": decision.rule_applied }),
                )
                .await;
            }
            Some(existing) if may_overwrite(&existing) => {
                if existing.outcome != verdict.outcome || existing.rule_applied != verdict.rule_applied {
                    let updated = Decision {
                        outcome: verdict.outcome,
                        rule_applied: verdict.rule_applied.to_string(),
                        rationale: verdict.rationale.clone(),
                        params: verdict.params.clone(),
                        ..existing
                    };
                    self.state.decisions.update_in_place(&updated).await?;
                }
            }
            Some(_) => {
                // Status has left {NEW, CANDIDATE}; human-reviewed and frozen.
            }
        }
        Ok(())
    }

    /// `ingestPayment` (spec.md §4.2): dedupes on `(externalReference,
    /// source)`, persists, and dispatches Reconciliation as a detached job
    /// so the response never blocks on it.
    #[instrument(skip(self, input))]
    pub async fn ingest_payment(&self, input: IngestPaymentInput) -> Result<Payment, IngestError> {
        let (external_reference, source) = payment_identity(&input.external_reference, &input.source);
        if let Some(existing) = self.state.payments.find_by_dedupe_key(&external_reference, &source).await? {
            return Ok(existing);
        }

        let payment = Payment {
            id: Uuid::new_v4(),
            vrm: self.state.plate_validator.normalize(&input.vrm),
            site_id: input.site_id.clone(),
            amount: input.amount,
            start_time: input.start_time,
            expiry_time: input.expiry_time,
            source,
            external_reference,
        };
        self.state.payments.insert(&payment).await?;
        self.audit(
            "payment",
            payment.id.to_string(),
            AuditAction::PaymentIngested,
            "ingestion",
            ActorType::System,
            Some(payment.site_id.clone()),
            Some(payment.vrm.clone()),
            serde_json::json!({ "amount": payment.amount }),
        )
        .await;

        reconciliation_worker::enqueue(
            &self.state.reconciliation_tx,
            ReconciliationJob::Payment {
                vrm: payment.vrm.clone(),
                site_id: payment.site_id.clone(),
                start_time: payment.start_time,
                expiry_time: payment.expiry_time,
                payment_id: payment.id,
            },
        )
        .await;

        Ok(payment)
    }

    /// `ingestPermit` (spec.md §4.2): identity is the external board item
    /// id when present, else the natural key `(vrm, siteId, type)`.
    #[instrument(skip(self, input))]
    pub async fn ingest_permit(&self, input: IngestPermitInput) -> Result<Permit, IngestError> {
        let vrm = self.state.plate_validator.normalize(&input.vrm);
        let scope = match &input.site_id {
            Some(site_id) => PermitScope::Site(site_id.clone()),
            None => PermitScope::Global,
        };
        let permit = Permit {
            id: Uuid::new_v4(),
            vrm: vrm.clone(),
            scope,
            permit_type: input.permit_type,
            active: input.active,
            start_date: input.start_date,
            end_date: input.end_date,
            source: input.source.clone(),
            metadata: None,
        };

        let identity = permit_identity(input.external_board_item_id.as_deref(), &vrm, input.site_id.as_deref().unwrap_or(""), input.permit_type);
        match &identity {
            PermitIdentity::External(external_id) => {
                self.state.permits.upsert_by_external_id(&permit, external_id).await?;
            }
            PermitIdentity::Natural { .. } => {
                self.state.permits.upsert_by_natural_key(&permit).await?;
            }
        }

        self.audit(
            "permit",
            permit.id.to_string(),
            AuditAction::PermitIngested,
            "ingestion",
            ActorType::System,
            input.site_id.clone(),
            Some(permit.vrm.clone()),
            serde_json::json!({ "permitType": format!("{:?}", permit.permit_type), "active": permit.active }),
        )
        .await;

        reconciliation_worker::enqueue(
            &self.state.reconciliation_tx,
            ReconciliationJob::Permit {
                vrm: permit.vrm.clone(),
                site_id: input.site_id.clone(),
                active: permit.active,
            },
        )
        .await;

        Ok(permit)
    }

    /// Plate-Review Workflow (C8): approve. Clears `requiresReview` on the
    /// Movement and resubmits it to the Session Reconstructor.
    #[instrument(skip(self))]
    pub async fn review_approve(&self, review_id: Uuid, reviewer_id: &str) -> Result<(), ReviewFacadeError> {
        let review = self.state.plate_reviews.get(review_id).await?.ok_or(ReviewFacadeError::NotFound(review_id))?;
        let outcome = approve(&review)?;
        self.state
            .plate_reviews
            .update_status(review_id, outcome.review_status, None)
            .await?;
        self.resolve_and_resubmit(review_id, &outcome.resubmit_vrm, reviewer_id, AuditAction::PlateReviewApproved)
            .await;
        Ok(())
    }

    /// C8: correct. The corrected VRM becomes authoritative for all
    /// subsequent matching.
    #[instrument(skip(self))]
    pub async fn review_correct(&self, review_id: Uuid, reviewer_id: &str, new_vrm: &str) -> Result<(), ReviewFacadeError> {
        let review = self.state.plate_reviews.get(review_id).await?.ok_or(ReviewFacadeError::NotFound(review_id))?;
        let outcome = correct(&review, new_vrm, &self.state.plate_validator)?;
        self.state
            .plate_reviews
            .update_status(review_id, outcome.review_status, Some(&outcome.corrected_vrm))
            .await?;
        self.resolve_and_resubmit(review_id, &outcome.resubmit_vrm, reviewer_id, AuditAction::PlateReviewCorrected)
            .await;
        Ok(())
    }

    async fn resolve_and_resubmit(&self, review_id: Uuid, resubmit_vrm: &str, reviewer_id: &str, action: AuditAction) {
        let Ok(Some(review)) = self.state.plate_reviews.get(review_id).await else {
            return;
        };
        if let Err(error) = self.state.movements.apply_review_resolution(review.movement_id, resubmit_vrm).await {
            warn!(%error, %review_id, "failed to rewrite movement vrm after review resolution");
            return;
        }
        self.audit(
            "plate_review",
            review_id.to_string(),
            action,
            reviewer_id,
            ActorType::Operator,
            Some(review.site_id.clone()),
            Some(resubmit_vrm.to_string()),
            serde_json::json!({}),
        )
        .await;

        match self.state.movements.get(review.movement_id).await {
            Ok(Some(movement)) => {
                if let Err(error) = self.run_session_reconstructor(&movement).await {
                    warn!(%error, movement_id = %movement.id, "session reconstruction failed on review resubmission");
                }
            }
            Ok(None) => warn!(movement_id = %review.movement_id, "resubmitted movement not found"),
            Err(error) => warn!(%error, "failed to reload movement for resubmission"),
        }
    }

    /// C8: discard. The Movement stays `requiresReview`; there is no
    /// resubmission.
    #[instrument(skip(self))]
    pub async fn review_discard(&self, review_id: Uuid, reviewer_id: &str, reason: &str) -> Result<(), ReviewFacadeError> {
        let review = self.state.plate_reviews.get(review_id).await?.ok_or(ReviewFacadeError::NotFound(review_id))?;
        let outcome = discard(&review, reason)?;
        self.state
            .plate_reviews
            .update_status(review_id, outcome.review_status, None)
            .await?;
        self.audit(
            "plate_review",
            review_id.to_string(),
            AuditAction::PlateReviewDiscarded,
            reviewer_id,
            ActorType::Operator,
            Some(review.site_id.clone()),
            Some(review.normalized_vrm.clone()),
            serde_json::json!({ "reason": outcome.reason }),
        )
        .await;
        Ok(())
    }

    /// `bulkDiscardByReason(tag, limit)`: non-transactional, best-effort,
    /// per-item failure isolation.
    #[instrument(skip(self))]
    pub async fn bulk_discard_by_reason(&self, tag: &str, limit: i64, reviewer_id: &str) -> Result<BulkDiscardSummary, DbError> {
        let candidates = self.state.plate_reviews.list_pending_by_reason(tag, limit).await?;
        let mut summary = BulkDiscardSummary::default();
        for review in candidates {
            if let Some(outcome) = anpr_domain_review::bulk_discard_item(&review, tag, &mut summary) {
                if self
                    .state
                    .plate_reviews
                    .update_status(review.id, outcome.review_status, None)
                    .await
                    .is_ok()
                {
                    self.audit(
                        "plate_review",
                        review.id.to_string(),
                        AuditAction::PlateReviewDiscarded,
                        reviewer_id,
                        ActorType::Operator,
                        Some(review.site_id.clone()),
                        Some(review.normalized_vrm.clone()),
                        serde_json::json!({ "reason": outcome.reason, "bulk": true }),
                    )
                    .await;
                }
            }
        }
        Ok(summary)
    }

    /// Enforcement-Suspension Registry (C7): create. Persists, then
    /// retroactively flips every unreviewed `ENFORCEMENT_CANDIDATE`
    /// decision whose session falls inside the new window.
    #[instrument(skip(self))]
    pub async fn create_suspension(
        &self,
        site_id: &str,
        start_date: DateTime<Utc>,
        end_date: Option<DateTime<Utc>>,
        reason: &str,
        created_by: &str,
    ) -> Result<(anpr_domain_models::EnforcementSuspension, usize), SuspensionFacadeError> {
        validate_new_suspension(start_date, end_date, reason)?;

        let suspension = anpr_domain_models::EnforcementSuspension {
            id: Uuid::new_v4(),
            site_id: site_id.to_string(),
            start_date,
            end_date,
            reason: reason.to_string(),
            created_by: created_by.to_string(),
            active: true,
        };
        self.state.suspensions.insert(&suspension).await?;
        self.audit(
            "enforcement_suspension",
            suspension.id.to_string(),
            AuditAction::RuleCreated,
            created_by,
            ActorType::Operator,
            Some(site_id.to_string()),
            None,
            serde_json::json!({ "reason": reason }),
        )
        .await;

        let flipped = self
            .state
            .suspensions
            .retroactively_flip(site_id, start_date, end_date, suspension.id)
            .await?;
        if flipped > 0 {
            self.audit(
                "enforcement_suspension",
                suspension.id.to_string(),
                AuditAction::RetroactiveUpdateApplied,
                "suspension-registry",
                ActorType::System,
                Some(site_id.to_string()),
                None,
                serde_json::json!({ "decisionsFlipped": flipped }),
            )
            .await;
        }

        Ok((suspension, flipped))
    }

    /// C7: end. Does not reverse prior retroactive flips.
    #[instrument(skip(self))]
    pub async fn end_suspension(&self, id: Uuid, reason: &str, ended_by: &str) -> Result<(), SuspensionFacadeError> {
        self.state.suspensions.get(id).await?.ok_or(SuspensionFacadeError::NotFound(id))?;
        self.state.suspensions.end(id, Utc::now()).await?;
        self.audit(
            "enforcement_suspension",
            id.to_string(),
            AuditAction::RuleEnded,
            ended_by,
            ActorType::Operator,
            None,
            None,
            serde_json::json!({ "reason": reason }),
        )
        .await;
        Ok(())
    }

    /// `onSite(siteId, limit)` — bulk reconciliation used by admin tooling.
    #[instrument(skip(self))]
    pub async fn reconcile_site(&self, site_id: &str, limit: i64) -> anyhow::Result<ReconciliationSummary> {
        let summary = reconciliation_worker::on_site(&self.state, site_id, limit).await?;
        self.audit(
            "site",
            site_id.to_string(),
            AuditAction::ReconciliationTriggered,
            "admin-cli",
            ActorType::Operator,
            Some(site_id.to_string()),
            None,
            serde_json::json!({ "sessionsReevaluated": summary.sessions_reevaluated, "decisionsUpdated": summary.decisions_updated }),
        )
        .await;
        Ok(summary)
    }

    /// Operator review of an enforcement-candidate decision (spec.md §6's
    /// `ENFORCEMENT_REVIEWED` audit action): finalizes a still-mutable
    /// decision as `APPROVED` (penalty issued) or `DECLINED` (dismissed),
    /// taking it out of automatic reach permanently.
    #[instrument(skip(self))]
    pub async fn review_decision(
        &self,
        decision_id: Uuid,
        new_status: DecisionStatus,
        reviewer_id: &str,
    ) -> Result<(), DecisionReviewError> {
        let existing = self
            .state
            .decisions
            .get(decision_id)
            .await?
            .ok_or(DecisionReviewError::NotFound(decision_id))?;
        if !may_overwrite(&existing) {
            return Err(DecisionReviewError::AlreadyFinal);
        }

        let updated = Decision {
            status: new_status,
            ..existing
        };
        self.state.decisions.update_in_place(&updated).await?;
        self.audit(
            "decision",
            decision_id.to_string(),
            AuditAction::EnforcementReviewed,
            reviewer_id,
            ActorType::Operator,
            None,
            None,
            serde_json::json!({ "newStatus": format!("{:?}", new_status) }),
        )
        .await;
        Ok(())
    }
}
