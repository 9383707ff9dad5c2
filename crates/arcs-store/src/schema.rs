use arcs_core::{ArcsError, ErrorInfo};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

/// Layout version written to the `meta` table.
pub const SCHEMA_VERSION: i64 = 1;

/// Creates the tables when missing and checks the stored layout version.
pub fn init_schema(conn: &Connection) -> Result<(), ArcsError> {
    conn.execute_batch(
        "BEGIN;
        CREATE TABLE IF NOT EXISTS meta(version INTEGER NOT NULL);
        CREATE TABLE IF NOT EXISTS profiles(
            student_id TEXT PRIMARY KEY NOT NULL,
            attention REAL,
            relevance REAL,
            confidence REAL,
            satisfaction REAL,
            label TEXT NOT NULL DEFAULT 'unanalyzed',
            updated_at TEXT NOT NULL
        );
        COMMIT;",
    )
    .map_err(|err| store_error("arcs_store.schema", err))?;
    set_version(conn, SCHEMA_VERSION)
}

fn set_version(conn: &Connection, version: i64) -> Result<(), ArcsError> {
    let existing: Option<i64> = conn
        .query_row("SELECT version FROM meta LIMIT 1", [], |row| row.get(0))
        .optional()
        .map_err(|err| store_error("arcs_store.schema", err))?;
    match existing {
        Some(current) if current == version => Ok(()),
        Some(current) => Err(ArcsError::Serde(
            ErrorInfo::new(
                "arcs_store.schema_version",
                format!("profile store schema {current} incompatible with expected {version}"),
            )
            .with_hint("migrate or recreate the database file"),
        )),
        None => {
            conn.execute("INSERT INTO meta(version) VALUES (?)", params![version])
                .map_err(|err| store_error("arcs_store.schema", err))?;
            Ok(())
        }
    }
}

/// Maps a SQLite failure onto the store error kinds: lock contention is
/// transient, everything else makes the store unavailable.
pub fn store_error(code: &str, err: rusqlite::Error) -> ArcsError {
    let contended = matches!(
        &err,
        rusqlite::Error::SqliteFailure(inner, _)
            if matches!(inner.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    );
    let info = ErrorInfo::new(code, err.to_string());
    if contended {
        ArcsError::StaleData(info)
    } else {
        ArcsError::StoreUnavailable(info)
    }
}
