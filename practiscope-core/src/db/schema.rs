//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings in UTC
//! (`2026-01-02T03:04:05.123456Z`) so text comparison matches time order.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: attempts and evaluator thresholds
    r#"
    CREATE TABLE IF NOT EXISTS attempts (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        child_id         TEXT NOT NULL,
        kind             TEXT NOT NULL CHECK (kind IN ('emotion', 'speech')),

        -- Emotion name or card title
        dimension_key    TEXT NOT NULL,
        category         TEXT,
        recorded_by      TEXT,

        score            REAL CHECK (score IS NULL OR (score >= 0 AND score <= 1)),
        passed           INTEGER NOT NULL,
        stars            INTEGER NOT NULL DEFAULT 0 CHECK (stars BETWEEN 0 AND 3),
        difficulty       TEXT NOT NULL DEFAULT 'easy',

        created_at       DATETIME NOT NULL
    );

    CREATE TABLE IF NOT EXISTS thresholds (
        child_id         TEXT NOT NULL,
        emotion          TEXT NOT NULL,
        level            INTEGER NOT NULL DEFAULT 1,
        threshold        REAL NOT NULL DEFAULT 0.75,
        hold_ms          INTEGER NOT NULL DEFAULT 1000,
        updated_at       DATETIME NOT NULL,

        PRIMARY KEY (child_id, emotion)
    );

    CREATE INDEX IF NOT EXISTS idx_attempts_child_created ON attempts(child_id, created_at DESC, id DESC);
    CREATE INDEX IF NOT EXISTS idx_attempts_created ON attempts(created_at);
    CREATE INDEX IF NOT EXISTS idx_attempts_kind_key ON attempts(kind, dimension_key);
    "#,
    // Version 2: outcome corrections keep created_at and record when they happened
    r#"
    ALTER TABLE attempts ADD COLUMN updated_at DATETIME;
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute(&format!("PRAGMA user_version = {}", version), [])?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}
