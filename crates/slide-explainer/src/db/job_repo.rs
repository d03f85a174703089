//! Job repository: CRUD operations for the `jobs` table.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};

/// A raw job row from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRow {
    pub id: String,
    pub filename: String,
    pub detail_level: String,
    pub language: String,
    pub status: String,
    pub error: Option<String>,
    pub user_id: Option<i64>,
    pub created_at: String,
    pub completed_at: Option<String>,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            filename: row.get("filename")?,
            detail_level: row.get("detail_level")?,
            language: row.get("language")?,
            status: row.get("status")?,
            error: row.get("error")?,
            user_id: row.get("user_id")?,
            created_at: row.get("created_at")?,
            completed_at: row.get("completed_at")?,
        })
    }
}

/// Inserts a new job row.
pub fn insert(db: &Database, job: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO jobs (id, filename, detail_level, language, status, error, user_id,
             created_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                job.id,
                job.filename,
                job.detail_level,
                job.language,
                job.status,
                job.error,
                job.user_id,
                job.created_at,
                job.completed_at,
            ],
        )?;
        Ok(())
    })
}

/// Updates the mutable columns (status, error, completed_at) only if the
/// stored status still equals `expected_status`. Returns `false` when the
/// row is missing or the guard did not match.
pub fn update_if_status(
    db: &Database,
    job: &JobRow,
    expected_status: &str,
) -> Result<bool, DatabaseError> {
    db.with_transaction(|tx| {
        let current: Option<String> = tx
            .query_row(
                "SELECT status FROM jobs WHERE id = ?1",
                params![job.id],
                |r| r.get(0),
            )
            .optional()?;

        if current.as_deref() != Some(expected_status) {
            return Ok(false);
        }

        tx.execute(
            "UPDATE jobs SET status = ?2, error = ?3, completed_at = ?4 WHERE id = ?1",
            params![job.id, job.status, job.error, job.completed_at],
        )?;
        Ok(true)
    })
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM jobs WHERE id = ?1",
                params![id],
                JobRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Lists jobs with the given status, oldest first. Ties on `created_at`
/// fall back to insertion order.
pub fn list_by_status_oldest_first(
    db: &Database,
    status: &str,
) -> Result<Vec<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM jobs WHERE status = ?1 ORDER BY created_at ASC, rowid ASC",
        )?;
        let rows = stmt
            .query_map(params![status], JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Most recent job a user submitted under `filename`.
pub fn find_latest_for_user(
    db: &Database,
    user_id: i64,
    filename: &str,
) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM jobs WHERE user_id = ?1 AND filename = ?2
                 ORDER BY created_at DESC, rowid DESC LIMIT 1",
                params![user_id, filename],
                JobRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// All jobs of a user, newest first.
pub fn list_for_user_newest_first(
    db: &Database,
    user_id: i64,
) -> Result<Vec<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM jobs WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC",
        )?;
        let rows = stmt
            .query_map(params![user_id], JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Counts jobs with the given status.
pub fn count_by_status(db: &Database, status: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM jobs WHERE status = ?1",
            params![status],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}
