use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::info;

use feedback_types::api::{NoticeResponse, UserPageResponse};
use feedback_types::models::{Feedback, User};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::run_blocking;
use crate::session::Session;

/// The owner's page. Nobody else may read it.
pub async fn show_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(session): Extension<Session>,
) -> Result<Json<UserPageResponse>, ApiError> {
    session.authorize(&username)?;

    let db = state.clone();
    let (user, feedback) = run_blocking(move || {
        let user = db.db.get_user(&username)?;
        let feedback = db.db.list_feedback_by_user(&username)?;
        Ok((user, feedback))
    })
    .await?;

    Ok(Json(UserPageResponse {
        user: User::from(user).into(),
        feedback: feedback.into_iter().map(Feedback::from).collect(),
    }))
}

/// Delete the account and everything it posted, then end the session.
pub async fn delete_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(mut session): Extension<Session>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    session.authorize(&username)?;

    let db = state.clone();
    let deleted = username.clone();
    run_blocking(move || Ok(db.db.delete_user(&deleted)?)).await?;

    session.clear();
    let jar = state.sessions.store(jar, &session)?;

    info!("User {} deleted their account", username);
    Ok((
        jar,
        Json(NoticeResponse {
            notice: "User deleted.".to_string(),
        }),
    ))
}
