use crate::errors::DbError;
use crate::schema::apply_schema;
use libsql::{Builder, Connection, Database};
use std::sync::Arc;
use tracing::{info, instrument};

/// Holds the libsql driver handle and, for in-memory databases, an extra
/// connection that keeps the in-memory database alive for the process
/// lifetime (SQLite drops an in-memory database once its last connection
/// closes).
#[derive(Clone)]
pub struct DbClient {
    database: Arc<Database>,
    _memory_anchor: Option<Arc<Connection>>,
}

impl DbClient {
    #[instrument(skip(auth_token))]
    pub async fn connect(url: &str, auth_token: Option<String>) -> Result<Self, DbError> {
        if url.is_empty() {
            return Err(DbError::ConnectionError("DATABASE_URL is empty".into()));
        }

        let is_remote = url.starts_with("libsql://") || url.starts_with("https://");
        let is_memory = url.contains(":memory:");

        info!(url, is_remote, is_memory, "connecting to database");

        let database = if is_remote {
            let token = auth_token
                .ok_or_else(|| DbError::ConnectionError("remote database requires an auth token".into()))?;
            Builder::new_remote(url.to_string(), token).build().await
        } else {
            Builder::new_local(url).build().await
        }
        .map_err(|e| DbError::ConnectionError(e.to_string()))?;

        let database = Arc::new(database);

        let anchor = if is_memory {
            let conn = database
                .connect()
                .map_err(|e| DbError::ConnectionError(e.to_string()))?;
            apply_schema(&conn).await.map_err(|e| DbError::ConnectionError(e.to_string()))?;
            Some(Arc::new(conn))
        } else {
            let conn = database
                .connect()
                .map_err(|e| DbError::ConnectionError(e.to_string()))?;
            apply_schema(&conn).await.map_err(|e| DbError::ConnectionError(e.to_string()))?;
            None
        };

        Ok(Self {
            database,
            _memory_anchor: anchor,
        })
    }

    pub fn connection(&self) -> Result<Connection, DbError> {
        self.database
            .connect()
            .map_err(|e| DbError::ConnectionError(e.to_string()))
    }
}
