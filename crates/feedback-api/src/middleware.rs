use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::debug;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::run_blocking;
use crate::session::Session;

/// Resolve the session cookie and attach the resulting `Session` to the request.
///
/// An absent or invalid cookie yields an anonymous session, as does a token
/// whose account was deleted or re-registered since it was issued. Only a
/// failing store lookup rejects the request.
pub async fn load_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let session = match state.sessions.load(&jar) {
        Some(claims) => {
            let db = state.clone();
            let username = claims.sub.clone();
            let current = run_blocking(move || Ok(db.db.session_generation(&username)?)).await?;

            if current.as_deref() == Some(claims.generation.as_str()) {
                Session::authenticated(claims.sub, claims.generation)
            } else {
                debug!("Stale session token for {}", claims.sub);
                Session::anonymous()
            }
        }
        None => Session::anonymous(),
    };

    req.extensions_mut().insert(session);
    Ok(next.run(req).await)
}
