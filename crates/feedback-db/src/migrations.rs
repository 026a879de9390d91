use rusqlite::Connection;
use tracing::info;

use crate::StoreError;

pub fn run(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);"
    )?;

    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (users, feedback)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE users (
                username    TEXT PRIMARY KEY CHECK (length(username) BETWEEN 1 AND 20),
                password    TEXT NOT NULL,
                email       TEXT NOT NULL UNIQUE CHECK (length(email) <= 50),
                first_name  TEXT NOT NULL CHECK (length(first_name) <= 30),
                last_name   TEXT NOT NULL CHECK (length(last_name) <= 30)
            );

            CREATE TABLE feedback (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                title       TEXT NOT NULL CHECK (length(title) <= 100),
                content     TEXT NOT NULL,
                username    TEXT NOT NULL REFERENCES users(username) ON DELETE CASCADE
            );

            CREATE INDEX idx_feedback_username
                ON feedback(username, id);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            "
        )?;
    }

    if version < 2 {
        // Changes whenever a username is (re)created, so session tokens minted
        // for a deleted account never match a later account with the same name.
        info!("Running migration v2 (users.session_generation)");
        conn.execute_batch(
            "
            BEGIN;

            ALTER TABLE users ADD COLUMN session_generation TEXT NOT NULL DEFAULT '';
            UPDATE users SET session_generation = lower(hex(randomblob(16)));

            INSERT INTO schema_version (version) VALUES (2);

            COMMIT;
            "
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
