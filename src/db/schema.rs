pub const SCHEMA: &str = r#"
-- One row per stored original. AUTOINCREMENT keeps ids from being reused
-- after a delete, since meta rows of deleted pictures are kept.
CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    sum BLOB UNIQUE,          -- 32-byte SHA-256 of the original
    name TEXT,                -- basename at ingest, display only
    added INTEGER,            -- epoch seconds
    taken INTEGER,            -- epoch seconds, 0 = unknown
    orient INTEGER,           -- EXIF orientation 1..8, 0 = unknown
    thumb BLOB                -- upright JPEG, NULL when none could be made
);

CREATE INDEX IF NOT EXISTS files_taken ON files(taken);

-- Append-only history of user-editable fields
CREATE TABLE IF NOT EXISTS meta (
    id INTEGER,
    time INTEGER,
    field TEXT,
    value TEXT
);
"#;

/// Applied after `SCHEMA` on every open. Failures are ignored so that
/// statements already applied to an existing database are harmless.
pub const MIGRATIONS: &[&str] = &[
    // Databases created without the UNIQUE column constraint
    "CREATE UNIQUE INDEX IF NOT EXISTS files_sum ON files(sum)",
    "CREATE INDEX IF NOT EXISTS meta_field ON meta(id, field, time)",
];
