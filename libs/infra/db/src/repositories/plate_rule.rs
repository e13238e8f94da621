use crate::client::DbClient;
use crate::errors::DbError;
use anpr_domain_plate_validation::PlateRuleRecord;
use libsql::params;
use tracing::instrument;

pub struct PlateRuleRepository {
    client: DbClient,
}

impl PlateRuleRepository {
    pub fn new(client: DbClient) -> Self {
        Self { client }
    }

    /// All rows, active or not, ordered by priority — `RuleSet::load`
    /// applies the active filter and the built-in fallback itself.
    #[instrument(skip(self))]
    pub async fn list_active_ordered(&self) -> Result<Vec<PlateRuleRecord>, DbError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT id, rule_name, pattern, is_international, priority, active FROM plate_validation_rules ORDER BY priority ASC",
                (),
            )
            .await?;
        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            records.push(PlateRuleRecord {
                id: row.get(0)?,
                rule_name: row.get(1)?,
                pattern: row.get(2)?,
                is_international: row.get::<i64>(3)? != 0,
                priority: row.get(4)?,
                active: row.get::<i64>(5)? != 0,
            });
        }
        Ok(records)
    }
}
