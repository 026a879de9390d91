use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use feedback_db::models::FeedbackRow;
use feedback_types::api::{FeedbackRequest, FormSchema, NoticeResponse};
use feedback_types::models::Feedback;
use feedback_types::validate::FEEDBACK_FIELDS;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::run_blocking;
use crate::session::Session;

pub async fn new_feedback_form(
    Path(username): Path<String>,
    Extension(session): Extension<Session>,
) -> Result<Json<FormSchema>, ApiError> {
    session.authorize(&username)?;
    Ok(Json(FormSchema {
        fields: &FEEDBACK_FIELDS,
    }))
}

pub async fn add_feedback(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(session): Extension<Session>,
    payload: Result<Json<FeedbackRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    session.authorize(&username)?;
    let Json(req) = payload?;
    req.validate()?;

    let db = state.clone();
    let row = run_blocking(move || {
        Ok(db.db.create_feedback(&username, &req.title, &req.content)?)
    })
    .await?;

    info!("User {} added feedback {}", row.username, row.id);
    Ok((StatusCode::CREATED, Json(Feedback::from(row))))
}

/// Fetch a feedback row for the caller, enforcing login, existence and ownership
/// in that order.
async fn load_owned(
    state: &AppState,
    session: &Session,
    id: i64,
) -> Result<FeedbackRow, ApiError> {
    session.require_login()?;

    let db = state.clone();
    let row = run_blocking(move || Ok(db.db.get_feedback(id)?)).await?;

    session.authorize(&row.username)?;
    Ok(row)
}

pub async fn get_feedback(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(session): Extension<Session>,
) -> Result<Json<Feedback>, ApiError> {
    let row = load_owned(&state, &session, id).await?;
    Ok(Json(row.into()))
}

pub async fn update_feedback(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(session): Extension<Session>,
    payload: Result<Json<FeedbackRequest>, JsonRejection>,
) -> Result<Json<Feedback>, ApiError> {
    load_owned(&state, &session, id).await?;
    let Json(req) = payload?;
    req.validate()?;

    let db = state.clone();
    let row = run_blocking(move || Ok(db.db.update_feedback(id, &req.title, &req.content)?))
        .await?;

    info!("User {} updated feedback {}", row.username, row.id);
    Ok(Json(row.into()))
}

pub async fn delete_feedback(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Extension(session): Extension<Session>,
) -> Result<impl IntoResponse, ApiError> {
    let row = load_owned(&state, &session, id).await?;

    let db = state.clone();
    run_blocking(move || Ok(db.db.delete_feedback(id)?)).await?;

    info!("User {} deleted feedback {}", row.username, id);
    Ok(Json(NoticeResponse {
        notice: "Feedback deleted.".to_string(),
    }))
}
