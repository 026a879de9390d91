pub mod auth;
pub mod error;
pub mod feedback;
pub mod middleware;
pub mod session;
pub mod users;

use axum::{
    Json, Router,
    response::IntoResponse,
    routing::{get, post},
};
use tracing::error;

use crate::auth::AppState;
use crate::error::ApiError;

/// Every route, wrapped in the session-loading middleware.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(auth::home))
        .route("/register", get(auth::register_form).post(auth::register))
        .route("/login", get(auth::login_form).post(auth::login))
        .route("/logout", post(auth::logout))
        .route(
            "/users/{username}",
            get(users::show_user).delete(users::delete_user),
        )
        .route(
            "/users/{username}/feedback/new",
            get(feedback::new_feedback_form),
        )
        .route("/users/{username}/feedback", post(feedback::add_feedback))
        .route(
            "/feedback/{id}",
            get(feedback::get_feedback)
                .put(feedback::update_feedback)
                .delete(feedback::delete_feedback),
        )
        .route("/health", get(health))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::load_session,
        ))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Run blocking store work (SQLite, Argon2) on the blocking pool.
pub(crate) async fn run_blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.into())
        })?
}
