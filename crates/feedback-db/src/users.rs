use feedback_crypto::Credentials;
use feedback_types::validate::{capitalize, validate_stored_names};
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::info;

use crate::error::classify_user_conflict;
use crate::models::UserRow;
use crate::{ConflictField, Database, StoreError};

/// Registration input, already validated by the caller.
#[derive(Debug, Clone, Copy)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
}

impl Database {
    // -- Users --

    /// Hash the password, capitalize the names and insert the user in one transaction.
    ///
    /// Username collisions are reported before email collisions. Nothing is
    /// written when either collides, or when a capitalized name outgrows its column.
    pub fn register_user(
        &self,
        credentials: &Credentials,
        new: NewUser<'_>,
    ) -> Result<UserRow, StoreError> {
        let first_name = capitalize(new.first_name);
        let last_name = capitalize(new.last_name);
        validate_stored_names(&first_name, &last_name)?;

        // Hash before taking the lock; Argon2 is deliberately slow.
        let password = credentials.hash(new.password)?;

        let row = self.with_tx(|tx| {
            if user_exists(tx, new.username)? {
                return Err(StoreError::Conflict(ConflictField::Username));
            }
            if email_taken(tx, new.email)? {
                return Err(StoreError::Conflict(ConflictField::Email));
            }

            tx.query_row(
                &format!(
                    "INSERT INTO users
                         (username, password, email, first_name, last_name, session_generation)
                     VALUES (?1, ?2, ?3, ?4, ?5, lower(hex(randomblob(16))))
                     RETURNING {USER_COLUMNS}"
                ),
                (new.username, &password, new.email, &first_name, &last_name),
                map_user,
            )
            .map_err(|e| match classify_user_conflict(&e) {
                Some(field) => StoreError::Conflict(field),
                None => e.into(),
            })
        })?;

        info!("Registered user {}", row.username);
        Ok(row)
    }

    /// `None` both when the user does not exist and when the password is wrong.
    pub fn authenticate(
        &self,
        credentials: &Credentials,
        username: &str,
        raw_password: &str,
    ) -> Result<Option<UserRow>, StoreError> {
        let Some(user) = self.with_conn(|conn| query_user(conn, username))? else {
            credentials.verify_absent(raw_password);
            return Ok(None);
        };

        if credentials.verify(raw_password, &user.password) {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    pub fn get_user(&self, username: &str) -> Result<UserRow, StoreError> {
        self.with_conn(|conn| query_user(conn, username))?
            .ok_or(StoreError::NotFound)
    }

    /// Current session generation of `username`, `None` when no such user exists.
    pub fn session_generation(&self, username: &str) -> Result<Option<String>, StoreError> {
        self.with_conn(|conn| {
            let generation = conn
                .query_row(
                    "SELECT session_generation FROM users WHERE username = ?1",
                    [username],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(generation)
        })
    }

    /// Delete the user; their feedback goes with them via `ON DELETE CASCADE`.
    pub fn delete_user(&self, username: &str) -> Result<(), StoreError> {
        let removed_feedback = self.with_tx(|tx| {
            let feedback_count: i64 = tx.query_row(
                "SELECT COUNT(*) FROM feedback WHERE username = ?1",
                [username],
                |row| row.get(0),
            )?;

            let deleted = tx.execute("DELETE FROM users WHERE username = ?1", [username])?;
            if deleted == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(feedback_count)
        })?;

        info!(
            "Deleted user {} and {} feedback item(s)",
            username, removed_feedback
        );
        Ok(())
    }
}

const USER_COLUMNS: &str =
    "username, password, email, first_name, last_name, session_generation";

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        username: row.get(0)?,
        password: row.get(1)?,
        email: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        session_generation: row.get(5)?,
    })
}

fn user_exists(conn: &Connection, username: &str) -> Result<bool, StoreError> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
        [username],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn email_taken(conn: &Connection, email: &str) -> Result<bool, StoreError> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
        [email],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn query_user(conn: &Connection, username: &str) -> Result<Option<UserRow>, StoreError> {
    let row = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
            [username],
            map_user,
        )
        .optional()?;

    Ok(row)
}
