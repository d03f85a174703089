//! Schema steps, applied in order and recorded in `PRAGMA user_version`.

use rusqlite::Connection;

use super::error::DatabaseError;

/// `(version, name, sql)`; versions are contiguous from 1.
const STEPS: &[(u32, &str, &str)] = &[
    (1, "users", include_str!("sql/001_create_users.sql")),
    (2, "jobs", include_str!("sql/002_create_jobs.sql")),
    (
        3,
        "jobs_by_status",
        include_str!("sql/003_index_jobs_status_created_at.sql"),
    ),
    (
        4,
        "jobs_by_user_filename",
        include_str!("sql/004_index_jobs_user_filename.sql"),
    ),
];

/// Version the schema reaches once every step has run.
pub fn latest_version() -> u32 {
    STEPS.last().map(|(v, _, _)| *v).unwrap_or(0)
}

/// Schema version currently recorded on `conn`.
pub fn schema_version(conn: &Connection) -> Result<u32, DatabaseError> {
    Ok(conn.pragma_query_value(None, "user_version", |r| r.get(0))?)
}

/// Brings `conn` up to [`latest_version`]. A failing step leaves the schema
/// at the previous version.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    let applied = schema_version(conn)?;

    for &(version, name, sql) in STEPS.iter().filter(|(v, _, _)| *v > applied) {
        log::info!("Applying schema step {version} ({name})");

        let step = |conn: &Connection| -> rusqlite::Result<()> {
            let tx = conn.unchecked_transaction()?;
            tx.execute_batch(sql)?;
            tx.pragma_update(None, "user_version", version)?;
            tx.commit()
        };

        step(conn).map_err(|source| DatabaseError::Migration {
            version,
            name,
            source,
        })?;
    }

    Ok(())
}
