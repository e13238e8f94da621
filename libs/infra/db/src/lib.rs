//! libsql-backed persistence adapter. One repository per aggregate;
//! repositories hold business logic directly against a `libsql::Connection`
//! rather than sitting behind a trait — the same convention the rest of
//! this workspace's infra layer follows.

pub mod client;
pub mod errors;
pub mod mapping;
pub mod repositories;
pub mod schema;

pub use client::DbClient;
pub use errors::DbError;
pub use repositories::*;
