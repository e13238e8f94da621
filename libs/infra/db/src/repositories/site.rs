use crate::client::DbClient;
use crate::errors::DbError;
use anpr_domain_models::Site;
use libsql::params;
use tracing::instrument;

pub struct SiteRepository {
    client: DbClient,
}

impl SiteRepository {
    pub fn new(client: DbClient) -> Self {
        Self { client }
    }

    fn map_row(row: &libsql::Row) -> Result<Site, DbError> {
        let id: String = row.get(0)?;
        let name: String = row.get(1)?;
        let active: i64 = row.get(2)?;
        let config_json: String = row.get(3)?;
        let config = serde_json::from_str(&config_json)
            .map_err(|e| DbError::MappingError(format!("site config for {id}: {e}")))?;
        Ok(Site {
            id,
            name,
            active: active != 0,
            config,
        })
    }

    #[instrument(skip(self))]
    pub async fn get(&self, site_id: &str) -> Result<Option<Site>, DbError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT id, name, active, config_json FROM sites WHERE id = ?1",
                params![site_id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::map_row(&row)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, site))]
    pub async fn upsert(&self, site: &Site) -> Result<(), DbError> {
        let conn = self.client.connection()?;
        let config_json = serde_json::to_string(&site.config)
            .map_err(|e| DbError::MappingError(e.to_string()))?;
        conn.execute(
            "INSERT INTO sites (id, name, active, config_json) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, active = excluded.active, config_json = excluded.config_json",
            params![site.id.clone(), site.name.clone(), site.active as i64, config_json],
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list_active(&self) -> Result<Vec<Site>, DbError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT id, name, active, config_json FROM sites WHERE active = 1",
                (),
            )
            .await?;
        let mut sites = Vec::new();
        while let Some(row) = rows.next().await? {
            sites.push(Self::map_row(&row)?);
        }
        Ok(sites)
    }
}
