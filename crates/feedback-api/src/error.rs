use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

use feedback_db::{ConflictField, StoreError};
use feedback_types::api::ErrorResponse;
use feedback_types::validate::ValidationErrors;

use crate::session::{AuthorizationFailure, SessionError, home_path};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    MalformedPayload(#[from] JsonRejection),

    #[error("{0} already exists")]
    Conflict(ConflictField),

    #[error("incorrect username/password")]
    InvalidCredentials,

    #[error(transparent)]
    Unauthorized(#[from] AuthorizationFailure),

    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(field) => Self::Conflict(field),
            StoreError::NotFound => Self::NotFound,
            StoreError::Invalid(errors) => Self::Validation(errors),
            other => Self::Internal(other.into()),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        Self::Internal(e.into())
    }
}

fn message(error: impl Into<String>) -> ErrorResponse {
    ErrorResponse {
        error: error.into(),
        field: None,
        redirect: None,
        fields: Vec::new(),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorResponse {
                    fields: errors.0,
                    ..message("Please correct the highlighted fields.")
                },
            ),
            ApiError::MalformedPayload(rejection) => {
                (rejection.status(), message(rejection.body_text()))
            }
            ApiError::Conflict(field) => {
                let (text, field) = match field {
                    ConflictField::Username => ("Username already exists.", Some(field)),
                    ConflictField::Email => {
                        ("Email address already exists.  Login instead?", Some(field))
                    }
                    ConflictField::Unclassified => ("Account could not be created.", None),
                };
                (
                    StatusCode::CONFLICT,
                    ErrorResponse {
                        field: field.map(|f| f.as_str().to_string()),
                        ..message(text)
                    },
                )
            }
            ApiError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                message("Incorrect username/password. Try again."),
            ),
            ApiError::Unauthorized(AuthorizationFailure::Anonymous) => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse {
                    redirect: Some("/login".to_string()),
                    ..message("Please login first.")
                },
            ),
            ApiError::Unauthorized(AuthorizationFailure::NotOwner { current }) => {
                warn!("Rejected request from {} on a resource it does not own", current);
                (
                    StatusCode::FORBIDDEN,
                    ErrorResponse {
                        redirect: Some(home_path(&current)),
                        ..message("Unauthorized!")
                    },
                )
            }
            ApiError::NotFound => (StatusCode::NOT_FOUND, message("Not found.")),
            ApiError::Internal(e) => {
                error!("Internal error: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    message("Internal server error."),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
