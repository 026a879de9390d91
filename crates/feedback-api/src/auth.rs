use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{info, warn};

use feedback_crypto::Credentials;
use feedback_db::Database;
use feedback_db::users::NewUser;
use feedback_types::api::{
    FormSchema, LoginRequest, LoginResponse, NoticeResponse, RegisterRequest, RegisterResponse,
};
use feedback_types::models::User;
use feedback_types::validate::{LOGIN_FIELDS, REGISTER_FIELDS};

use crate::error::ApiError;
use crate::run_blocking;
use crate::session::{Session, SessionKeys, home_path};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub credentials: Credentials,
    pub sessions: SessionKeys,
}

/// Logged-in users have no business on the register/login pages.
fn redirect_if_authenticated(session: &Session) -> Option<Response> {
    session
        .current()
        .map(|username| Redirect::to(&home_path(username)).into_response())
}

pub async fn home(Extension(session): Extension<Session>) -> Redirect {
    match session.current() {
        Some(username) => Redirect::to(&home_path(username)),
        None => Redirect::to("/register"),
    }
}

pub async fn register_form(Extension(session): Extension<Session>) -> Response {
    if let Some(redirect) = redirect_if_authenticated(&session) {
        return redirect;
    }
    Json(FormSchema {
        fields: &REGISTER_FIELDS,
    })
    .into_response()
}

pub async fn register(
    State(state): State<AppState>,
    Extension(mut session): Extension<Session>,
    jar: CookieJar,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    if let Some(redirect) = redirect_if_authenticated(&session) {
        return Ok(redirect);
    }
    let Json(req) = payload?;
    req.validate()?;

    // Argon2 and SQLite both block; keep them off the async workers
    let db = state.clone();
    let row = run_blocking(move || {
        let new = NewUser {
            username: &req.username,
            password: &req.password,
            email: &req.email,
            first_name: &req.first_name,
            last_name: &req.last_name,
        };
        Ok(db.db.register_user(&db.credentials, new)?)
    })
    .await?;

    session.set(row.username.clone(), row.session_generation.clone());
    let user = User::from(row);
    let jar = state.sessions.store(jar, &session)?;

    let notice = format!("Registration Complete! Welcome {}", user.full_name());
    Ok((
        StatusCode::CREATED,
        jar,
        Json(RegisterResponse {
            user: user.into(),
            notice,
        }),
    )
        .into_response())
}

pub async fn login_form(Extension(session): Extension<Session>) -> Response {
    if let Some(redirect) = redirect_if_authenticated(&session) {
        return redirect;
    }
    Json(FormSchema {
        fields: &LOGIN_FIELDS,
    })
    .into_response()
}

pub async fn login(
    State(state): State<AppState>,
    Extension(mut session): Extension<Session>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    if let Some(redirect) = redirect_if_authenticated(&session) {
        return Ok(redirect);
    }
    let Json(req) = payload?;
    req.validate()?;

    let attempted = req.username.clone();
    let db = state.clone();
    let user = run_blocking(move || {
        Ok(db
            .db
            .authenticate(&db.credentials, &req.username, &req.password)?)
    })
    .await?;

    let Some(user) = user else {
        warn!("Failed login attempt for {}", attempted);
        return Err(ApiError::InvalidCredentials);
    };

    info!("User {} logged in", user.username);
    session.set(user.username.clone(), user.session_generation);
    let jar = state.sessions.store(jar, &session)?;

    Ok((
        jar,
        Json(LoginResponse {
            username: user.username,
        }),
    )
        .into_response())
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(mut session): Extension<Session>,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let username = session.require_login()?.to_string();

    session.clear();
    let jar = state.sessions.store(jar, &session)?;

    info!("User {} logged out", username);
    Ok((
        jar,
        Json(NoticeResponse {
            notice: "Successfully logged out.".to_string(),
        }),
    ))
}
