//! Database row types. These map directly to SQLite rows.
//! Distinct from feedback-types API models so the password hash never leaves
//! this crate by accident.

use feedback_types::models::{Feedback, User};

#[derive(Debug, Clone)]
pub struct UserRow {
    pub username: String,
    pub password: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Random per-account marker carried in session tokens.
    pub session_generation: String,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            username: row.username,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackRow {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub username: String,
}

impl From<FeedbackRow> for Feedback {
    fn from(row: FeedbackRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            content: row.content,
            username: row.username,
        }
    }
}
