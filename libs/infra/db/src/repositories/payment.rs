use crate::client::DbClient;
use crate::errors::DbError;
use crate::mapping::{parse_ts, ts};
use anpr_domain_models::Payment;
use libsql::params;
use tracing::instrument;

pub struct PaymentRepository {
    client: DbClient,
}

impl PaymentRepository {
    pub fn new(client: DbClient) -> Self {
        Self { client }
    }

    const COLUMNS: &'static str = "id, vrm, site_id, amount, start_time, expiry_time, source, external_reference";

    fn map_row(row: &libsql::Row) -> Result<Payment, DbError> {
        Ok(Payment {
            id: row.get::<String>(0)?.parse().map_err(|e| DbError::MappingError(format!("{e}")))?,
            vrm: row.get(1)?,
            site_id: row.get(2)?,
            amount: row.get(3)?,
            start_time: parse_ts(&row.get::<String>(4)?)?,
            expiry_time: parse_ts(&row.get::<String>(5)?)?,
            source: row.get(6)?,
            external_reference: row.get(7)?,
        })
    }

    #[instrument(skip(self))]
    pub async fn find_by_dedupe_key(&self, external_reference: &str, source: &str) -> Result<Option<Payment>, DbError> {
        let conn = self.client.connection()?;
        let sql = format!(
            "SELECT {} FROM payments WHERE external_reference = ?1 AND source = ?2",
            Self::COLUMNS
        );
        let mut rows = conn.query(&sql, params![external_reference, source]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(Self::map_row(&row)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, payment))]
    pub async fn insert(&self, payment: &Payment) -> Result<(), DbError> {
        let conn = self.client.connection()?;
        let result = conn
            .execute(
                "INSERT INTO payments (id, vrm, site_id, amount, start_time, expiry_time, source, external_reference)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    payment.id.to_string(),
                    payment.vrm.clone(),
                    payment.site_id.clone(),
                    payment.amount,
                    ts(payment.start_time),
                    ts(payment.expiry_time),
                    payment.source.clone(),
                    payment.external_reference.clone(),
                ],
            )
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(e) => Err(crate::errors::classify(e)),
        }
    }

    #[instrument(skip(self))]
    pub async fn list_for_vrm_site(&self, vrm: &str, site_id: &str) -> Result<Vec<Payment>, DbError> {
        let conn = self.client.connection()?;
        let sql = format!(
            "SELECT {} FROM payments WHERE vrm = ?1 AND site_id = ?2 ORDER BY start_time ASC",
            Self::COLUMNS
        );
        let mut rows = conn.query(&sql, params![vrm, site_id]).await?;
        let mut payments = Vec::new();
        while let Some(row) = rows.next().await? {
            payments.push(Self::map_row(&row)?);
        }
        Ok(payments)
    }

    /// Whether a site has ever had a payment recorded — the AUTO
    /// enforcement-model branch of the Rule Engine's clause 7.
    #[instrument(skip(self))]
    pub async fn site_has_any_payment(&self, site_id: &str) -> Result<bool, DbError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query("SELECT 1 FROM payments WHERE site_id = ?1 LIMIT 1", params![site_id])
            .await?;
        Ok(rows.next().await?.is_some())
    }
}
