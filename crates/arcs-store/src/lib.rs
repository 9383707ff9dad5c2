//! SQLite implementation of the ARCS profile store.

pub mod schema;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use arcs_core::{
    ArcsError, ArcsScores, ErrorInfo, MotivationLevel, MotivationProfile, ProfileStore, StudentId,
};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

pub use schema::{init_schema, store_error, SCHEMA_VERSION};

/// Profile store persisting one row per student.
///
/// Label saves run in a single transaction. Lock contention surfaces as
/// `StaleData` so callers can retry.
#[derive(Debug)]
pub struct SqliteProfileStore {
    conn: Mutex<Connection>,
}

impl SqliteProfileStore {
    /// Opens (creating if needed) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ArcsError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|err| {
            let mut failure = store_error("arcs_store.open", err);
            if let ArcsError::StoreUnavailable(info) | ArcsError::StaleData(info) = &mut failure {
                info.context.insert("path".into(), path.display().to_string());
            }
            failure
        })?;
        Self::from_connection(conn)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self, ArcsError> {
        let conn =
            Connection::open_in_memory().map_err(|err| store_error("arcs_store.open", err))?;
        Self::from_connection(conn)
    }

    /// Wraps an existing connection, creating the schema when missing.
    pub fn from_connection(conn: Connection) -> Result<Self, ArcsError> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// How long SQLite waits on a locked database before reporting contention.
    pub fn set_busy_timeout(&self, timeout: Duration) -> Result<(), ArcsError> {
        self.lock()?
            .busy_timeout(timeout)
            .map_err(|err| store_error("arcs_store.busy_timeout", err))
    }

    /// Number of stored profiles.
    pub fn count(&self) -> Result<usize, ArcsError> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM profiles", [], |row| row.get(0))
            .map_err(|err| store_error("arcs_store.query", err))?;
        Ok(count.max(0) as usize)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, ArcsError> {
        self.conn.lock().map_err(|_| {
            ArcsError::StoreUnavailable(ErrorInfo::new(
                "arcs_store.poisoned",
                "connection mutex was poisoned",
            ))
        })
    }
}

type ProfileRow = (
    String,
    Option<f64>,
    Option<f64>,
    Option<f64>,
    Option<f64>,
    String,
);

fn into_profile(row: ProfileRow) -> Result<MotivationProfile, ArcsError> {
    let (student_id, attention, relevance, confidence, satisfaction, label) = row;
    let scores = ArcsScores {
        attention,
        relevance,
        confidence,
        satisfaction,
    };
    let present = [attention, relevance, confidence, satisfaction]
        .iter()
        .any(Option::is_some);
    Ok(MotivationProfile {
        student_id: StudentId::new(student_id),
        scores: present.then_some(scores),
        label: MotivationLevel::parse(&label)?,
    })
}

impl ProfileStore for SqliteProfileStore {
    fn load_profiles(&self) -> Result<Vec<MotivationProfile>, ArcsError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT student_id, attention, relevance, confidence, satisfaction, label \
                 FROM profiles ORDER BY student_id",
            )
            .map_err(|err| store_error("arcs_store.query", err))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            })
            .map_err(|err| store_error("arcs_store.query", err))?;
        let rows: Vec<ProfileRow> = rows
            .collect::<Result<_, _>>()
            .map_err(|err| store_error("arcs_store.query", err))?;
        rows.into_iter().map(into_profile).collect()
    }

    fn save_labels(&self, labels: &BTreeMap<StudentId, MotivationLevel>) -> Result<(), ArcsError> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|err| store_error("arcs_store.save_labels", err))?;
        let now = Utc::now().to_rfc3339();
        {
            let mut lookup = tx
                .prepare(
                    "SELECT attention, relevance, confidence, satisfaction \
                     FROM profiles WHERE student_id = ?",
                )
                .map_err(|err| store_error("arcs_store.save_labels", err))?;
            let mut update = tx
                .prepare("UPDATE profiles SET label = ?, updated_at = ? WHERE student_id = ?")
                .map_err(|err| store_error("arcs_store.save_labels", err))?;
            for (student, label) in labels {
                let scores = lookup
                    .query_row([student.as_str()], |row| {
                        Ok(ArcsScores {
                            attention: row.get(0)?,
                            relevance: row.get(1)?,
                            confidence: row.get(2)?,
                            satisfaction: row.get(3)?,
                        })
                    })
                    .optional()
                    .map_err(|err| store_error("arcs_store.save_labels", err))?;
                let Some(scores) = scores else {
                    return Err(ArcsError::InvalidInput(
                        ErrorInfo::new("unknown-student", "label refers to an unknown student")
                            .with_context("student_id", student.as_str()),
                    ));
                };
                if label.is_analyzed() && !scores.is_complete() {
                    return Err(ArcsError::InvalidInput(
                        ErrorInfo::new(
                            "label-without-scores",
                            "analyzed labels require a complete ARCS vector",
                        )
                        .with_context("student_id", student.as_str()),
                    ));
                }
                update
                    .execute(params![label.as_str(), now, student.as_str()])
                    .map_err(|err| store_error("arcs_store.save_labels", err))?;
            }
        }
        tx.commit()
            .map_err(|err| store_error("arcs_store.save_labels", err))?;
        debug!(labels = labels.len(), "labels saved");
        Ok(())
    }

    fn record_arcs_response(
        &self,
        student: &StudentId,
        scores: ArcsScores,
    ) -> Result<(), ArcsError> {
        let conn = self.lock()?;
        let reset = !scores.is_complete();
        conn.execute(
            "INSERT INTO profiles(student_id, attention, relevance, confidence, satisfaction, label, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, 'unanalyzed', ?6) \
             ON CONFLICT(student_id) DO UPDATE SET \
                attention = excluded.attention, \
                relevance = excluded.relevance, \
                confidence = excluded.confidence, \
                satisfaction = excluded.satisfaction, \
                label = CASE WHEN ?7 THEN 'unanalyzed' ELSE profiles.label END, \
                updated_at = excluded.updated_at",
            params![
                student.as_str(),
                scores.attention,
                scores.relevance,
                scores.confidence,
                scores.satisfaction,
                Utc::now().to_rfc3339(),
                reset,
            ],
        )
        .map_err(|err| store_error("arcs_store.record_response", err))?;
        Ok(())
    }
}
