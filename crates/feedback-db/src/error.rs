use std::fmt;

use feedback_crypto::CredentialError;
use feedback_types::validate::ValidationErrors;
use rusqlite::ErrorCode;
use rusqlite::ffi;
use thiserror::Error;

/// Which uniqueness rule a registration collided with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictField {
    Username,
    Email,
    /// A constraint fired that cannot be attributed to either column.
    Unclassified,
}

impl ConflictField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Username => "username",
            Self::Email => "email",
            Self::Unclassified => "account",
        }
    }
}

impl fmt::Display for ConflictField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} already exists")]
    Conflict(ConflictField),

    #[error("record not found")]
    NotFound,

    #[error(transparent)]
    Invalid(#[from] ValidationErrors),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("database lock poisoned")]
    LockPoisoned,

    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub(crate) fn constraint_code(err: &rusqlite::Error) -> Option<i32> {
    match err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
            Some(e.extended_code)
        }
        _ => None,
    }
}

/// Map a failed insert into `users` onto the column that collided, using the
/// extended result code. `username` is the primary key and `email` the only
/// other unique column, so the code alone identifies the field.
///
/// CHECK and NOT NULL failures are bad input, not collisions, and stay plain
/// SQLite errors.
pub(crate) fn classify_user_conflict(err: &rusqlite::Error) -> Option<ConflictField> {
    match constraint_code(err)? {
        ffi::SQLITE_CONSTRAINT_PRIMARYKEY => Some(ConflictField::Username),
        ffi::SQLITE_CONSTRAINT_UNIQUE => Some(ConflictField::Email),
        ffi::SQLITE_CONSTRAINT_CHECK | ffi::SQLITE_CONSTRAINT_NOTNULL => None,
        _ => Some(ConflictField::Unclassified),
    }
}
