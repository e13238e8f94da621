use anyhow::{Context, Result};
use libsql::Connection;
use tracing::{debug, info, instrument};

/// Base tables, one per aggregate in the data model (spec.md §3). Created
/// with `IF NOT EXISTS` so `apply_schema` is idempotent across process
/// restarts and across every connection opened against an in-memory
/// database in tests.
const TABLES: &[(&str, &str)] = &[
    ("sites", r#"
        CREATE TABLE IF NOT EXISTS sites (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            config_json TEXT NOT NULL
        );
    "#),
    ("movements", r#"
        CREATE TABLE IF NOT EXISTS movements (
            id TEXT PRIMARY KEY,
            site_id TEXT NOT NULL,
            vrm TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            camera_id TEXT,
            direction TEXT NOT NULL,
            raw_payload_json TEXT NOT NULL,
            images_json TEXT NOT NULL,
            requires_review INTEGER NOT NULL DEFAULT 0,
            discarded INTEGER NOT NULL DEFAULT 0
        );
    "#),
    ("sessions", r#"
        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            site_id TEXT NOT NULL,
            vrm TEXT NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT,
            duration_minutes INTEGER,
            entry_movement_id TEXT NOT NULL,
            exit_movement_id TEXT,
            status TEXT NOT NULL
        );
    "#),
    ("permits", r#"
        CREATE TABLE IF NOT EXISTS permits (
            id TEXT PRIMARY KEY,
            vrm TEXT NOT NULL,
            scope_site_id TEXT,
            permit_type TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            start_date TEXT NOT NULL,
            end_date TEXT,
            source TEXT NOT NULL,
            external_board_item_id TEXT,
            metadata_json TEXT
        );
    "#),
    ("payments", r#"
        CREATE TABLE IF NOT EXISTS payments (
            id TEXT PRIMARY KEY,
            vrm TEXT NOT NULL,
            site_id TEXT NOT NULL,
            amount REAL NOT NULL,
            start_time TEXT NOT NULL,
            expiry_time TEXT NOT NULL,
            source TEXT NOT NULL,
            external_reference TEXT NOT NULL
        );
    "#),
    ("decisions", r#"
        CREATE TABLE IF NOT EXISTS decisions (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL,
            outcome TEXT NOT NULL,
            rule_applied TEXT NOT NULL,
            rationale TEXT NOT NULL,
            status TEXT NOT NULL,
            params_json TEXT
        );
    "#),
    ("plate_reviews", r#"
        CREATE TABLE IF NOT EXISTS plate_reviews (
            id TEXT PRIMARY KEY,
            movement_id TEXT NOT NULL,
            original_vrm TEXT NOT NULL,
            normalized_vrm TEXT NOT NULL,
            site_id TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            suspicion_reasons_json TEXT NOT NULL,
            validation_status TEXT NOT NULL,
            review_status TEXT NOT NULL,
            corrected_vrm TEXT,
            images_json TEXT NOT NULL
        );
    "#),
    ("enforcement_suspensions", r#"
        CREATE TABLE IF NOT EXISTS enforcement_suspensions (
            id TEXT PRIMARY KEY,
            site_id TEXT NOT NULL,
            start_date TEXT NOT NULL,
            end_date TEXT,
            reason TEXT NOT NULL,
            created_by TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1
        );
    "#),
    ("audit_entries", r#"
        CREATE TABLE IF NOT EXISTS audit_entries (
            id TEXT PRIMARY KEY,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            action TEXT NOT NULL,
            actor TEXT NOT NULL,
            actor_type TEXT NOT NULL,
            site_id TEXT,
            vrm TEXT,
            details_json TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            parent_audit_id TEXT
        );
    "#),
    ("plate_validation_rules", r#"
        CREATE TABLE IF NOT EXISTS plate_validation_rules (
            id TEXT PRIMARY KEY,
            rule_name TEXT NOT NULL,
            pattern TEXT NOT NULL,
            is_international INTEGER NOT NULL DEFAULT 0,
            priority INTEGER NOT NULL DEFAULT 0,
            active INTEGER NOT NULL DEFAULT 1
        );
    "#),
    ("scheduled_job_locks", r#"
        CREATE TABLE IF NOT EXISTS scheduled_job_locks (
            job_name TEXT PRIMARY KEY,
            locked_at TEXT,
            locked_by TEXT
        );
    "#),
];

/// Uniqueness/lookup indexes, several of which are the actual source of
/// truth for a concurrency invariant rather than a pure performance aid:
/// `idx_sessions_open` backs the at-most-one-open-session rule, and
/// `idx_decisions_session` backs the one-decision-per-session rule.
const INDEXES: &[(&str, &str)] = &[
    (
        "idx_movements_dedupe",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_movements_dedupe ON movements(site_id, vrm, timestamp);",
    ),
    (
        "idx_sessions_open",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_open ON sessions(site_id, vrm) WHERE end_time IS NULL;",
    ),
    (
        "idx_sessions_site_vrm",
        "CREATE INDEX IF NOT EXISTS idx_sessions_site_vrm ON sessions(site_id, vrm);",
    ),
    (
        "idx_decisions_session",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_decisions_session ON decisions(session_id);",
    ),
    (
        "idx_decisions_candidate_scan",
        "CREATE INDEX IF NOT EXISTS idx_decisions_candidate_scan ON decisions(outcome, status);",
    ),
    (
        "idx_payments_dedupe",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_payments_dedupe ON payments(external_reference, source);",
    ),
    (
        "idx_payments_vrm_site",
        "CREATE INDEX IF NOT EXISTS idx_payments_vrm_site ON payments(vrm, site_id);",
    ),
    (
        "idx_permits_external",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_permits_external ON permits(external_board_item_id) WHERE external_board_item_id IS NOT NULL;",
    ),
    (
        "idx_permits_natural",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_permits_natural ON permits(vrm, scope_site_id, permit_type) WHERE external_board_item_id IS NULL;",
    ),
    (
        "idx_permits_vrm",
        "CREATE INDEX IF NOT EXISTS idx_permits_vrm ON permits(vrm);",
    ),
    (
        "idx_plate_reviews_status",
        "CREATE INDEX IF NOT EXISTS idx_plate_reviews_status ON plate_reviews(review_status);",
    ),
    (
        "idx_suspensions_site",
        "CREATE INDEX IF NOT EXISTS idx_suspensions_site ON enforcement_suspensions(site_id, active);",
    ),
    (
        "idx_audit_entity",
        "CREATE INDEX IF NOT EXISTS idx_audit_entity ON audit_entries(entity_type, entity_id);",
    ),
];

#[instrument(skip(connection))]
pub async fn apply_schema(connection: &Connection) -> Result<()> {
    info!("applying schema");
    for (name, sql) in TABLES {
        debug!(table = *name, "creating table");
        connection
            .execute(sql, ())
            .await
            .with_context(|| format!("failed to create table {name}"))?;
    }
    for (name, sql) in INDEXES {
        debug!(index = *name, "creating index");
        connection
            .execute(sql, ())
            .await
            .with_context(|| format!("failed to create index {name}"))?;
    }
    Ok(())
}
