//! User repository: submitters identified by email.

use rusqlite::{params, OptionalExtension};

use super::{Database, DatabaseError};

/// Returns the id of the user with `email`, creating the row if needed.
pub fn find_or_create(db: &Database, email: &str) -> Result<i64, DatabaseError> {
    db.with_transaction(|tx| {
        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM users WHERE email = ?1",
                params![email],
                |r| r.get(0),
            )
            .optional()?;

        if let Some(id) = existing {
            return Ok(id);
        }

        tx.execute("INSERT INTO users (email) VALUES (?1)", params![email])?;
        Ok(tx.last_insert_rowid())
    })
}

/// Looks up a user id by email.
pub fn find_by_email(db: &Database, email: &str) -> Result<Option<i64>, DatabaseError> {
    db.with_conn(|conn| {
        let id = conn
            .query_row(
                "SELECT id FROM users WHERE email = ?1",
                params![email],
                |r| r.get(0),
            )
            .optional()?;
        Ok(id)
    })
}

/// Looks up a user's email by id.
pub fn find_email(db: &Database, id: i64) -> Result<Option<String>, DatabaseError> {
    db.with_conn(|conn| {
        let email = conn
            .query_row(
                "SELECT email FROM users WHERE id = ?1",
                params![id],
                |r| r.get(0),
            )
            .optional()?;
        Ok(email)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_or_create_reuses_existing_row() {
        let db = Database::open_in_memory().unwrap();
        let first = find_or_create(&db, "ada@example.com").unwrap();
        let second = find_or_create(&db, "ada@example.com").unwrap();
        assert_eq!(first, second);

        let other = find_or_create(&db, "grace@example.com").unwrap();
        assert_ne!(first, other);
    }

    #[test]
    fn test_find_email() {
        let db = Database::open_in_memory().unwrap();
        let id = find_or_create(&db, "ada@example.com").unwrap();
        assert_eq!(
            find_email(&db, id).unwrap().as_deref(),
            Some("ada@example.com")
        );
        assert!(find_email(&db, id + 100).unwrap().is_none());
    }

    #[test]
    fn test_find_by_email() {
        let db = Database::open_in_memory().unwrap();
        assert!(find_by_email(&db, "ada@example.com").unwrap().is_none());

        let id = find_or_create(&db, "ada@example.com").unwrap();
        assert_eq!(find_by_email(&db, "ada@example.com").unwrap(), Some(id));
    }
}
