use crate::errors::DbError;
use chrono::{DateTime, Utc};

pub fn parse_ts(raw: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::MappingError(format!("invalid timestamp '{raw}': {e}")))
}

pub fn ts(value: DateTime<Utc>) -> String {
    value.to_rfc3339()
}

pub fn parse_ts_opt(raw: Option<String>) -> Result<Option<DateTime<Utc>>, DbError> {
    raw.map(|s| parse_ts(&s)).transpose()
}

pub fn ts_opt(value: Option<DateTime<Utc>>) -> Option<String> {
    value.map(ts)
}

pub fn bool_from_i64(value: i64) -> bool {
    value != 0
}

pub fn i64_from_bool(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
