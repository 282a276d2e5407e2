//! SQLite schema for the claims log and checkpoint store.
//!
//! - `claims_log` is the append-only event log; `id` is the sequence and is
//!   `AUTOINCREMENT` so deleted rows never have their id handed out again
//! - `key_value` holds checkpoints (`last.check:<identifier>`) as opaque text
//! - `store_meta` tracks the schema version alongside `PRAGMA user_version`

/// Migration v1: log, checkpoint store, and metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS claims_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    identifier TEXT NOT NULL CHECK (length(trim(identifier)) > 0),
    subject TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL CHECK (status IN ('claimed', 'removed', 'unchanged', '#full-import')),
    occurred_at_us INTEGER NOT NULL,
    provenance TEXT,
    CHECK (status <> '#full-import' OR subject = '')
);

CREATE INDEX IF NOT EXISTS idx_claims_log_identifier
    ON claims_log(identifier, id);

CREATE TABLE IF NOT EXISTS key_value (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL
);

INSERT OR IGNORE INTO store_meta (id, schema_version) VALUES (1, 1);
";

/// Migration v2: per-subject history lookups.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_claims_log_subject
    ON claims_log(identifier, subject, id DESC);

CREATE INDEX IF NOT EXISTS idx_claims_log_anchor
    ON claims_log(identifier, id DESC)
    WHERE status = '#full-import';

UPDATE store_meta
SET schema_version = 2
WHERE id = 1;
";

/// Indexes expected by the read paths.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_claims_log_identifier",
    "idx_claims_log_subject",
    "idx_claims_log_anchor",
];
