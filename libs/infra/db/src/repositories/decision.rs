use crate::client::DbClient;
use crate::errors::DbError;
use anpr_domain_models::{Decision, DecisionOutcome, DecisionStatus, Session};
use libsql::params;
use tracing::instrument;
use uuid::Uuid;

pub struct DecisionRepository {
    client: DbClient,
}

fn outcome_str(outcome: DecisionOutcome) -> &'static str {
    match outcome {
        DecisionOutcome::Compliant => "COMPLIANT",
        DecisionOutcome::EnforcementCandidate => "ENFORCEMENT_CANDIDATE",
        DecisionOutcome::RequiresReview => "REQUIRES_REVIEW",
    }
}

fn outcome_from_str(raw: &str) -> Result<DecisionOutcome, DbError> {
    match raw {
        "COMPLIANT" => Ok(DecisionOutcome::Compliant),
        "ENFORCEMENT_CANDIDATE" => Ok(DecisionOutcome::EnforcementCandidate),
        "REQUIRES_REVIEW" => Ok(DecisionOutcome::RequiresReview),
        other => Err(DbError::MappingError(format!("unknown decision outcome {other}"))),
    }
}

fn status_str(status: DecisionStatus) -> &'static str {
    match status {
        DecisionStatus::New => "NEW",
        DecisionStatus::Candidate => "CANDIDATE",
        DecisionStatus::Approved => "APPROVED",
        DecisionStatus::Declined => "DECLINED",
        DecisionStatus::AutoResolved => "AUTO_RESOLVED",
        DecisionStatus::Exported => "EXPORTED",
    }
}

fn status_from_str(raw: &str) -> Result<DecisionStatus, DbError> {
    match raw {
        "NEW" => Ok(DecisionStatus::New),
        "CANDIDATE" => Ok(DecisionStatus::Candidate),
        "APPROVED" => Ok(DecisionStatus::Approved),
        "DECLINED" => Ok(DecisionStatus::Declined),
        "AUTO_RESOLVED" => Ok(DecisionStatus::AutoResolved),
        "EXPORTED" => Ok(DecisionStatus::Exported),
        other => Err(DbError::MappingError(format!("unknown decision status {other}"))),
    }
}

impl DecisionRepository {
    pub fn new(client: DbClient) -> Self {
        Self { client }
    }

    const COLUMNS: &'static str = "id, session_id, outcome, rule_applied, rationale, status, params_json";

    fn map_row(row: &libsql::Row) -> Result<Decision, DbError> {
        let params_json: Option<String> = row.get(6)?;
        let params = params_json
            .map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(|e| DbError::MappingError(e.to_string()))?;
        Ok(Decision {
            id: row.get::<String>(0)?.parse().map_err(|e| DbError::MappingError(format!("{e}")))?,
            session_id: row.get::<String>(1)?.parse().map_err(|e| DbError::MappingError(format!("{e}")))?,
            outcome: outcome_from_str(&row.get::<String>(2)?)?,
            rule_applied: row.get(3)?,
            rationale: row.get(4)?,
            status: status_from_str(&row.get::<String>(5)?)?,
            params,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_by_session(&self, session_id: Uuid) -> Result<Option<Decision>, DbError> {
        let conn = self.client.connection()?;
        let sql = format!("SELECT {} FROM decisions WHERE session_id = ?1", Self::COLUMNS);
        let mut rows = conn.query(&sql, params![session_id.to_string()]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::map_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Lookup by decision id, used by the operator review endpoint.
    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<Option<Decision>, DbError> {
        let conn = self.client.connection()?;
        let sql = format!("SELECT {} FROM decisions WHERE id = ?1", Self::COLUMNS);
        let mut rows = conn.query(&sql, params![id.to_string()]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::map_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Creates the first decision for a session. The unique index on
    /// `session_id` is the uniqueness invariant from spec.md §3.
    #[instrument(skip(self, decision))]
    pub async fn insert(&self, decision: &Decision) -> Result<(), DbError> {
        let conn = self.client.connection()?;
        let params_json = decision
            .params
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| DbError::MappingError(e.to_string()))?;
        conn.execute(
            "INSERT INTO decisions (id, session_id, outcome, rule_applied, rationale, status, params_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                decision.id.to_string(),
                decision.session_id.to_string(),
                outcome_str(decision.outcome),
                decision.rule_applied.clone(),
                decision.rationale.clone(),
                status_str(decision.status),
                params_json,
            ],
        )
        .await?;
        Ok(())
    }

    /// Rewrites outcome/rule/rationale/params/status in place; the caller
    /// (Rule Engine, Reconciliation, Scheduled Re-evaluator, Suspension
    /// Registry) has already checked `is_automatically_mutable`.
    #[instrument(skip(self, decision))]
    pub async fn update_in_place(&self, decision: &Decision) -> Result<(), DbError> {
        let conn = self.client.connection()?;
        let params_json = decision
            .params
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| DbError::MappingError(e.to_string()))?;
        conn.execute(
            "UPDATE decisions SET outcome = ?2, rule_applied = ?3, rationale = ?4, status = ?5, params_json = ?6 WHERE id = ?1",
            params![
                decision.id.to_string(),
                outcome_str(decision.outcome),
                decision.rule_applied.clone(),
                decision.rationale.clone(),
                status_str(decision.status),
                params_json,
            ],
        )
        .await?;
        Ok(())
    }

    /// Up to `limit` ENFORCEMENT_CANDIDATE decisions in NEW/CANDIDATE,
    /// oldest session first, joined to their (necessarily-closed)
    /// session — the scan behind the Scheduled Re-evaluator (C6).
    #[instrument(skip(self))]
    pub async fn list_candidates_for_scheduled_scan(&self, limit: i64) -> Result<Vec<(Decision, Session)>, DbError> {
        let conn = self.client.connection()?;
        let sql = "SELECT d.id, d.session_id, d.outcome, d.rule_applied, d.rationale, d.status, d.params_json,
                           s.id, s.site_id, s.vrm, s.start_time, s.end_time, s.duration_minutes, s.entry_movement_id, s.exit_movement_id, s.status
                    FROM decisions d JOIN sessions s ON s.id = d.session_id
                    WHERE d.outcome = 'ENFORCEMENT_CANDIDATE' AND d.status IN ('NEW', 'CANDIDATE') AND s.end_time IS NOT NULL
                    ORDER BY s.start_time ASC LIMIT ?1";
        let mut rows = conn.query(sql, params![limit]).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            let decision = Self::map_row(&row)?;
            let session_status_raw: String = row.get(15)?;
            let session_status = match session_status_raw.as_str() {
                "PROVISIONAL" => anpr_domain_models::SessionStatus::Provisional,
                "COMPLETED" => anpr_domain_models::SessionStatus::Completed,
                "EXPIRED" => anpr_domain_models::SessionStatus::Expired,
                other => return Err(DbError::MappingError(format!("unknown session status {other}"))),
            };
            let session = Session {
                id: row.get::<String>(7)?.parse().map_err(|e| DbError::MappingError(format!("{e}")))?,
                site_id: row.get(8)?,
                vrm: row.get(9)?,
                start_time: crate::mapping::parse_ts(&row.get::<String>(10)?)?,
                end_time: crate::mapping::parse_ts_opt(row.get::<Option<String>>(11)?)?,
                duration_minutes: row.get(12)?,
                entry_movement_id: row.get::<String>(13)?.parse().map_err(|e| DbError::MappingError(format!("{e}")))?,
                exit_movement_id: row
                    .get::<Option<String>>(14)?
                    .map(|s| s.parse())
                    .transpose()
                    .map_err(|e| DbError::MappingError(format!("{e}")))?,
                status: session_status,
            };
            out.push((decision, session));
        }
        Ok(out)
    }
}
