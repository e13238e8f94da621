use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("database connection failed: {0}")]
    ConnectionError(String),

    #[error("query failed: {0}")]
    QueryError(#[from] libsql::Error),

    #[error("failed to map a row onto a domain type: {0}")]
    MappingError(String),

    #[error("no row found for the requested key")]
    NotFound,

    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
}

/// libsql reports constraint violations as a generic `SqliteFailure`
/// string; this is the only place that string-matches on it, so the
/// rest of the codebase can work with a typed `UniqueViolation`.
pub fn classify(error: libsql::Error) -> DbError {
    let message = error.to_string();
    if message.contains("UNIQUE constraint failed") {
        DbError::UniqueViolation(message)
    } else {
        DbError::QueryError(error)
    }
}
