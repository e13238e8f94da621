use crate::client::DbClient;
use crate::errors::DbError;
use crate::mapping::{parse_ts, parse_ts_opt, ts, ts_opt};
use anpr_domain_models::{Permit, PermitScope, PermitType};
use libsql::params;
use tracing::instrument;

pub struct PermitRepository {
    client: DbClient,
}

fn permit_type_str(permit_type: PermitType) -> &'static str {
    match permit_type {
        PermitType::Whitelist => "WHITELIST",
        PermitType::Resident => "RESIDENT",
        PermitType::Staff => "STAFF",
        PermitType::Contractor => "CONTRACTOR",
        PermitType::QrWhitelist => "QR_WHITELIST",
    }
}

fn permit_type_from_str(raw: &str) -> Result<PermitType, DbError> {
    match raw {
        "WHITELIST" => Ok(PermitType::Whitelist),
        "RESIDENT" => Ok(PermitType::Resident),
        "STAFF" => Ok(PermitType::Staff),
        "CONTRACTOR" => Ok(PermitType::Contractor),
        "QR_WHITELIST" => Ok(PermitType::QrWhitelist),
        other => Err(DbError::MappingError(format!("unknown permit type {other}"))),
    }
}

impl PermitRepository {
    pub fn new(client: DbClient) -> Self {
        Self { client }
    }

    fn map_row(row: &libsql::Row) -> Result<Permit, DbError> {
        let scope_site_id: Option<String> = row.get(2)?;
        let scope = match scope_site_id {
            Some(site_id) => PermitScope::Site(site_id),
            None => PermitScope::Global,
        };
        let permit_type = permit_type_from_str(&row.get::<String>(3)?)?;
        let metadata_json: Option<String> = row.get(8)?;
        let metadata = metadata_json
            .map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(|e| DbError::MappingError(e.to_string()))?;
        Ok(Permit {
            id: row.get::<String>(0)?.parse().map_err(|e| DbError::MappingError(format!("{e}")))?,
            vrm: row.get(1)?,
            scope,
            permit_type,
            active: row.get::<i64>(4)? != 0,
            start_date: parse_ts(&row.get::<String>(5)?)?,
            end_date: parse_ts_opt(row.get::<Option<String>>(6)?)?,
            source: row.get(7)?,
            metadata,
        })
    }

    const COLUMNS: &'static str =
        "id, vrm, scope_site_id, permit_type, active, start_date, end_date, source, metadata_json";

    #[instrument(skip(self))]
    pub async fn list_for_vrm(&self, vrm: &str) -> Result<Vec<Permit>, DbError> {
        let conn = self.client.connection()?;
        let sql = format!("SELECT {} FROM permits WHERE vrm = ?1", Self::COLUMNS);
        let mut rows = conn.query(&sql, params![vrm]).await?;
        let mut permits = Vec::new();
        while let Some(row) = rows.next().await? {
            permits.push(Self::map_row(&row)?);
        }
        Ok(permits)
    }

    /// Upsert keyed on the external board item id (spec.md §4.2).
    #[instrument(skip(self, permit))]
    pub async fn upsert_by_external_id(&self, permit: &Permit, external_board_item_id: &str) -> Result<(), DbError> {
        let conn = self.client.connection()?;
        let scope_site_id = match &permit.scope {
            PermitScope::Global => None,
            PermitScope::Site(site_id) => Some(site_id.clone()),
        };
        let metadata_json = permit
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| DbError::MappingError(e.to_string()))?;
        conn.execute(
            "INSERT INTO permits (id, vrm, scope_site_id, permit_type, active, start_date, end_date, source, external_board_item_id, metadata_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(external_board_item_id) DO UPDATE SET
                vrm = excluded.vrm, scope_site_id = excluded.scope_site_id, permit_type = excluded.permit_type,
                active = excluded.active, start_date = excluded.start_date, end_date = excluded.end_date,
                source = excluded.source, metadata_json = excluded.metadata_json",
            params![
                permit.id.to_string(),
                permit.vrm.clone(),
                scope_site_id,
                permit_type_str(permit.permit_type),
                permit.active as i64,
                ts(permit.start_date),
                ts_opt(permit.end_date),
                permit.source.clone(),
                external_board_item_id,
                metadata_json,
            ],
        )
        .await?;
        Ok(())
    }

    /// Upsert keyed on the natural key `(vrm, siteId, type)` when no
    /// external board item id is present.
    #[instrument(skip(self, permit))]
    pub async fn upsert_by_natural_key(&self, permit: &Permit) -> Result<(), DbError> {
        let conn = self.client.connection()?;
        let scope_site_id = match &permit.scope {
            PermitScope::Global => None,
            PermitScope::Site(site_id) => Some(site_id.clone()),
        };
        let metadata_json = permit
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| DbError::MappingError(e.to_string()))?;
        conn.execute(
            "INSERT INTO permits (id, vrm, scope_site_id, permit_type, active, start_date, end_date, source, external_board_item_id, metadata_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL, ?9)
             ON CONFLICT(vrm, scope_site_id, permit_type) WHERE external_board_item_id IS NULL DO UPDATE SET
                active = excluded.active, start_date = excluded.start_date, end_date = excluded.end_date,
                source = excluded.source, metadata_json = excluded.metadata_json",
            params![
                permit.id.to_string(),
                permit.vrm.clone(),
                scope_site_id,
                permit_type_str(permit.permit_type),
                permit.active as i64,
                ts(permit.start_date),
                ts_opt(permit.end_date),
                permit.source.clone(),
                metadata_json,
            ],
        )
        .await?;
        Ok(())
    }
}
