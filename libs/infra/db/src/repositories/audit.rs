use crate::client::DbClient;
use crate::errors::DbError;
use crate::mapping::{parse_ts, ts};
use anpr_domain_models::{ActorType, AuditAction, AuditEntry};
use libsql::params;
use tracing::instrument;

pub struct AuditRepository {
    client: DbClient,
}

fn actor_type_str(actor_type: ActorType) -> &'static str {
    match actor_type {
        ActorType::System => "SYSTEM",
        ActorType::Operator => "OPERATOR",
        ActorType::Scheduler => "SCHEDULER",
    }
}

fn actor_type_from_str(raw: &str) -> Result<ActorType, DbError> {
    match raw {
        "SYSTEM" => Ok(ActorType::System),
        "OPERATOR" => Ok(ActorType::Operator),
        "SCHEDULER" => Ok(ActorType::Scheduler),
        other => Err(DbError::MappingError(format!("unknown actor type {other}"))),
    }
}

fn action_str(action: AuditAction) -> &'static str {
    match action {
        AuditAction::MovementIngested => "MOVEMENT_INGESTED",
        AuditAction::MovementDuplicateDetected => "MOVEMENT_DUPLICATE_DETECTED",
        AuditAction::DuplicateEntrySkipped => "DUPLICATE_ENTRY_SKIPPED",
        AuditAction::SessionCreated => "SESSION_CREATED",
        AuditAction::SessionCompleted => "SESSION_COMPLETED",
        AuditAction::SessionExpired => "SESSION_EXPIRED",
        AuditAction::DecisionCreated => "DECISION_CREATED",
        AuditAction::DecisionReconciled => "DECISION_RECONCILED",
        AuditAction::DecisionAutoReevaluated => "DECISION_AUTO_REEVALUATED",
        AuditAction::EnforcementReviewed => "ENFORCEMENT_REVIEWED",
        AuditAction::PaymentIngested => "PAYMENT_INGESTED",
        AuditAction::PermitIngested => "PERMIT_INGESTED",
        AuditAction::ReconciliationTriggered => "RECONCILIATION_TRIGGERED",
        AuditAction::RuleCreated => "RULE_CREATED",
        AuditAction::RuleUpdated => "RULE_UPDATED",
        AuditAction::RuleEnded => "RULE_ENDED",
        AuditAction::RetroactiveUpdateApplied => "RETROACTIVE_UPDATE_APPLIED",
        AuditAction::PlateReviewCreated => "PLATE_REVIEW_CREATED",
        AuditAction::PlateReviewApproved => "PLATE_REVIEW_APPROVED",
        AuditAction::PlateReviewCorrected => "PLATE_REVIEW_CORRECTED",
        AuditAction::PlateReviewDiscarded => "PLATE_REVIEW_DISCARDED",
    }
}

fn action_from_str(raw: &str) -> Result<AuditAction, DbError> {
    Ok(match raw {
        "MOVEMENT_INGESTED" => AuditAction::MovementIngested,
        "MOVEMENT_DUPLICATE_DETECTED" => AuditAction::MovementDuplicateDetected,
        "DUPLICATE_ENTRY_SKIPPED" => AuditAction::DuplicateEntrySkipped,
        "SESSION_CREATED" => AuditAction::SessionCreated,
        "SESSION_COMPLETED" => AuditAction::SessionCompleted,
        "SESSION_EXPIRED" => AuditAction::SessionExpired,
        "DECISION_CREATED" => AuditAction::DecisionCreated,
        "DECISION_RECONCILED" => AuditAction::DecisionReconciled,
        "DECISION_AUTO_REEVALUATED" => AuditAction::DecisionAutoReevaluated,
        "ENFORCEMENT_REVIEWED" => AuditAction::EnforcementReviewed,
        "PAYMENT_INGESTED" => AuditAction::PaymentIngested,
        "PERMIT_INGESTED" => AuditAction::PermitIngested,
        "RECONCILIATION_TRIGGERED" => AuditAction::ReconciliationTriggered,
        "RULE_CREATED" => AuditAction::RuleCreated,
        "RULE_UPDATED" => AuditAction::RuleUpdated,
        "RULE_ENDED" => AuditAction::RuleEnded,
        "RETROACTIVE_UPDATE_APPLIED" => AuditAction::RetroactiveUpdateApplied,
        "PLATE_REVIEW_CREATED" => AuditAction::PlateReviewCreated,
        "PLATE_REVIEW_APPROVED" => AuditAction::PlateReviewApproved,
        "PLATE_REVIEW_CORRECTED" => AuditAction::PlateReviewCorrected,
        "PLATE_REVIEW_DISCARDED" => AuditAction::PlateReviewDiscarded,
        other => return Err(DbError::MappingError(format!("unknown audit action {other}"))),
    })
}

impl AuditRepository {
    pub fn new(client: DbClient) -> Self {
        Self { client }
    }

    const COLUMNS: &'static str =
        "id, entity_type, entity_id, action, actor, actor_type, site_id, vrm, details_json, timestamp, parent_audit_id";

    fn map_row(row: &libsql::Row) -> Result<AuditEntry, DbError> {
        Ok(AuditEntry {
            id: row.get::<String>(0)?.parse().map_err(|e| DbError::MappingError(format!("{e}")))?,
            entity_type: row.get(1)?,
            entity_id: row.get(2)?,
            action: action_from_str(&row.get::<String>(3)?)?,
            actor: row.get(4)?,
            actor_type: actor_type_from_str(&row.get::<String>(5)?)?,
            site_id: row.get(6)?,
            vrm: row.get(7)?,
            details: serde_json::from_str(&row.get::<String>(8)?).map_err(|e| DbError::MappingError(e.to_string()))?,
            timestamp: parse_ts(&row.get::<String>(9)?)?,
            parent_audit_id: row
                .get::<Option<String>>(10)?
                .map(|s| s.parse())
                .transpose()
                .map_err(|e| DbError::MappingError(format!("{e}")))?,
        })
    }

    #[instrument(skip(self, entry))]
    pub async fn insert(&self, entry: &AuditEntry) -> Result<(), DbError> {
        let conn = self.client.connection()?;
        let details_json = serde_json::to_string(&entry.details).map_err(|e| DbError::MappingError(e.to_string()))?;
        conn.execute(
            "INSERT INTO audit_entries (id, entity_type, entity_id, action, actor, actor_type, site_id, vrm, details_json, timestamp, parent_audit_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                entry.id.to_string(),
                entry.entity_type.clone(),
                entry.entity_id.clone(),
                action_str(entry.action),
                entry.actor.clone(),
                actor_type_str(entry.actor_type),
                entry.site_id.clone(),
                entry.vrm.clone(),
                details_json,
                ts(entry.timestamp),
                entry.parent_audit_id.map(|id| id.to_string()),
            ],
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list_for_entity(&self, entity_type: &str, entity_id: &str) -> Result<Vec<AuditEntry>, DbError> {
        let conn = self.client.connection()?;
        let sql = format!(
            "SELECT {} FROM audit_entries WHERE entity_type = ?1 AND entity_id = ?2 ORDER BY timestamp ASC",
            Self::COLUMNS
        );
        let mut rows = conn.query(&sql, params![entity_type, entity_id]).await?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next().await? {
            entries.push(Self::map_row(&row)?);
        }
        Ok(entries)
    }
}
