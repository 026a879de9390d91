use rusqlite::{Connection, OptionalExtension, Row};
use rusqlite::ffi;

use crate::error::constraint_code;
use crate::models::FeedbackRow;
use crate::{Database, StoreError};

const FEEDBACK_COLUMNS: &str = "id, title, content, username";

impl Database {
    // -- Feedback --

    /// Insert a feedback item owned by `username`. A missing owner is `NotFound`.
    pub fn create_feedback(
        &self,
        username: &str,
        title: &str,
        content: &str,
    ) -> Result<FeedbackRow, StoreError> {
        self.with_tx(|tx| {
            tx.query_row(
                &format!(
                    "INSERT INTO feedback (title, content, username) VALUES (?1, ?2, ?3)
                     RETURNING {FEEDBACK_COLUMNS}"
                ),
                (title, content, username),
                map_feedback,
            )
            .map_err(|e| match constraint_code(&e) {
                Some(ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => StoreError::NotFound,
                _ => e.into(),
            })
        })
    }

    pub fn get_feedback(&self, id: i64) -> Result<FeedbackRow, StoreError> {
        self.with_conn(|conn| query_feedback(conn, id))?
            .ok_or(StoreError::NotFound)
    }

    /// All feedback owned by `username`, oldest first.
    pub fn list_feedback_by_user(&self, username: &str) -> Result<Vec<FeedbackRow>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {FEEDBACK_COLUMNS} FROM feedback WHERE username = ?1 ORDER BY id"
            ))?;

            let rows = stmt
                .query_map([username], map_feedback)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Replace title and content. Owner and id never change.
    pub fn update_feedback(
        &self,
        id: i64,
        title: &str,
        content: &str,
    ) -> Result<FeedbackRow, StoreError> {
        self.with_tx(|tx| {
            tx.query_row(
                &format!(
                    "UPDATE feedback SET title = ?1, content = ?2 WHERE id = ?3
                     RETURNING {FEEDBACK_COLUMNS}"
                ),
                (title, content, id),
                map_feedback,
            )
            .optional()?
            .ok_or(StoreError::NotFound)
        })
    }

    pub fn delete_feedback(&self, id: i64) -> Result<(), StoreError> {
        self.with_tx(|tx| {
            let deleted = tx.execute("DELETE FROM feedback WHERE id = ?1", [id])?;
            if deleted == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
    }
}

fn map_feedback(row: &Row<'_>) -> rusqlite::Result<FeedbackRow> {
    Ok(FeedbackRow {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        username: row.get(3)?,
    })
}

fn query_feedback(conn: &Connection, id: i64) -> Result<Option<FeedbackRow>, StoreError> {
    let row = conn
        .query_row(
            &format!("SELECT {FEEDBACK_COLUMNS} FROM feedback WHERE id = ?1"),
            [id],
            map_feedback,
        )
        .optional()?;

    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::NewUser;
    use feedback_crypto::{Credentials, HashCost};

    fn setup() -> Database {
        let db = Database::open_in_memory().unwrap();
        let creds = Credentials::new(HashCost {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap();

        for (username, email) in [("alice", "a@x.com"), ("bob", "b@x.com")] {
            db.register_user(
                &creds,
                NewUser {
                    username,
                    password: "password123",
                    email,
                    first_name: "test",
                    last_name: "user",
                },
            )
            .unwrap();
        }
        db
    }

    #[test]
    fn create_assigns_fresh_ids() {
        let db = setup();
        let first = db.create_feedback("alice", "Great", "Loved it").unwrap();
        let second = db.create_feedback("alice", "Great", "Loved it").unwrap();

        assert_eq!(first.username, "alice");
        assert_eq!(first.title, "Great");
        assert_ne!(first.id, second.id);
        assert_eq!(db.get_feedback(first.id).unwrap(), first);
    }

    #[test]
    fn create_for_unknown_user_is_not_found() {
        let db = setup();
        let err = db.create_feedback("ghost", "Hi", "There").unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[test]
    fn list_is_per_user_in_insertion_order() {
        let db = setup();
        let a1 = db.create_feedback("alice", "one", "1").unwrap();
        db.create_feedback("bob", "bob's", "b").unwrap();
        let a2 = db.create_feedback("alice", "two", "2").unwrap();

        let listed = db.list_feedback_by_user("alice").unwrap();
        assert_eq!(listed, vec![a1, a2]);
        assert!(db.list_feedback_by_user("nobody").unwrap().is_empty());
    }

    #[test]
    fn update_replaces_title_and_content_only() {
        let db = setup();
        let original = db.create_feedback("alice", "Great", "Loved it").unwrap();

        let updated = db.update_feedback(original.id, "Okay", "It was fine").unwrap();
        assert_eq!(updated.id, original.id);
        assert_eq!(updated.username, "alice");
        assert_eq!(updated.title, "Okay");
        assert_eq!(updated.content, "It was fine");
        assert_eq!(db.get_feedback(original.id).unwrap(), updated);
    }

    #[test]
    fn missing_ids_are_not_found() {
        let db = setup();
        assert!(matches!(db.get_feedback(42), Err(StoreError::NotFound)));
        assert!(matches!(db.update_feedback(42, "t", "c"), Err(StoreError::NotFound)));
        assert!(matches!(db.delete_feedback(42), Err(StoreError::NotFound)));
    }

    #[test]
    fn delete_removes_row() {
        let db = setup();
        let fb = db.create_feedback("alice", "Great", "Loved it").unwrap();

        db.delete_feedback(fb.id).unwrap();
        assert!(matches!(db.get_feedback(fb.id), Err(StoreError::NotFound)));
        assert!(matches!(db.delete_feedback(fb.id), Err(StoreError::NotFound)));
    }

    #[test]
    fn deleting_user_cascades_to_feedback() {
        let db = setup();
        let a1 = db.create_feedback("alice", "one", "1").unwrap();
        let a2 = db.create_feedback("alice", "two", "2").unwrap();
        let b1 = db.create_feedback("bob", "bob's", "b").unwrap();

        db.delete_user("alice").unwrap();

        assert!(db.list_feedback_by_user("alice").unwrap().is_empty());
        assert!(matches!(db.get_feedback(a1.id), Err(StoreError::NotFound)));
        assert!(matches!(db.get_feedback(a2.id), Err(StoreError::NotFound)));
        assert_eq!(db.get_feedback(b1.id).unwrap(), b1);
    }

    #[test]
    fn ids_are_not_reused_after_delete() {
        let db = setup();
        let first = db.create_feedback("alice", "one", "1").unwrap();
        db.delete_feedback(first.id).unwrap();

        let second = db.create_feedback("alice", "two", "2").unwrap();
        assert!(second.id > first.id);
    }
}
