//! Per-request session identity and the owner-only guard.
//!
//! The identity travels in a signed, HttpOnly cookie. Middleware decodes it,
//! checks the carried session generation against the user's current one, and
//! hands the resulting [`Session`] to the handler explicitly. Handlers that log
//! in or out write the updated session back through [`SessionKeys::store`].

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const SESSION_COOKIE: &str = "feedback_session";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    /// Session generation of the account the token was issued for.
    pub generation: String,
    pub exp: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Identity {
    username: String,
    generation: String,
}

/// Anonymous, or authenticated as one username.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    identity: Option<Identity>,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("session expiry is out of range")]
    ExpiryOutOfRange,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorizationFailure {
    #[error("request is not authenticated")]
    Anonymous,

    #[error("{current} does not own this resource")]
    NotOwner { current: String },
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(username: impl Into<String>, generation: impl Into<String>) -> Self {
        let mut session = Self::default();
        session.set(username, generation);
        session
    }

    pub fn current(&self) -> Option<&str> {
        self.identity.as_ref().map(|id| id.username.as_str())
    }

    pub fn set(&mut self, username: impl Into<String>, generation: impl Into<String>) {
        self.identity = Some(Identity {
            username: username.into(),
            generation: generation.into(),
        });
    }

    pub fn clear(&mut self) {
        self.identity = None;
    }

    pub fn require_login(&self) -> Result<&str, AuthorizationFailure> {
        self.current().ok_or(AuthorizationFailure::Anonymous)
    }

    /// Succeeds only when the session belongs to `owner`.
    pub fn authorize(&self, owner: &str) -> Result<&str, AuthorizationFailure> {
        let current = self.require_login()?;
        if current != owner {
            return Err(AuthorizationFailure::NotOwner {
                current: current.to_string(),
            });
        }
        Ok(current)
    }
}

/// Path of a user's own page.
pub fn home_path(username: &str) -> String {
    format!("/users/{}", username)
}

/// Signs and checks session tokens (HS256 JWT).
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl SessionKeys {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn issue(&self, username: &str, generation: &str) -> Result<String, SessionError> {
        let expires = Utc::now()
            .checked_add_signed(self.ttl)
            .ok_or(SessionError::ExpiryOutOfRange)?;
        let claims = SessionClaims {
            sub: username.to_string(),
            generation: generation.to_string(),
            exp: usize::try_from(expires.timestamp())
                .map_err(|_| SessionError::ExpiryOutOfRange)?,
        };

        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    /// Claims of a validly signed, unexpired token. Tampered, expired or
    /// foreign tokens yield `None`.
    pub fn claims(&self, token: &str) -> Option<SessionClaims> {
        match decode::<SessionClaims>(token, &self.decoding, &Validation::default()) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                debug!("Rejected session token: {}", e);
                None
            }
        }
    }

    /// Decode the session cookie, if any. The caller still has to compare the
    /// generation with the account's current one.
    pub fn load(&self, jar: &CookieJar) -> Option<SessionClaims> {
        jar.get(SESSION_COOKIE)
            .and_then(|cookie| self.claims(cookie.value()))
    }

    /// Write `session` into the outgoing cookie jar: a fresh token when
    /// authenticated, a removal cookie when anonymous.
    pub fn store(
        &self,
        jar: CookieJar,
        session: &Session,
    ) -> Result<CookieJar, SessionError> {
        match &session.identity {
            Some(id) => {
                let token = self.issue(&id.username, &id.generation)?;
                let cookie = Cookie::build((SESSION_COOKIE, token))
                    .path("/")
                    .http_only(true)
                    .same_site(SameSite::Lax)
                    .build();
                Ok(jar.add(cookie))
            }
            None => Ok(jar.remove(Cookie::build(SESSION_COOKIE).path("/"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> SessionKeys {
        SessionKeys::new("test-secret", Duration::hours(1))
    }

    #[test]
    fn authorize_requires_owner() {
        let anon = Session::anonymous();
        assert_eq!(anon.authorize("alice"), Err(AuthorizationFailure::Anonymous));

        let alice = Session::authenticated("alice", "g1");
        assert_eq!(alice.authorize("alice"), Ok("alice"));
        assert_eq!(
            alice.authorize("bob"),
            Err(AuthorizationFailure::NotOwner {
                current: "alice".into()
            })
        );
    }

    #[test]
    fn set_and_clear_transition_state() {
        let mut session = Session::anonymous();
        assert_eq!(session.current(), None);

        session.set("alice", "g1");
        assert_eq!(session.current(), Some("alice"));

        session.clear();
        assert_eq!(session.require_login(), Err(AuthorizationFailure::Anonymous));
    }

    #[test]
    fn issued_token_carries_user_and_generation() {
        let keys = keys();
        let token = keys.issue("alice", "g1").unwrap();
        let claims = keys.claims(&token).unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.generation, "g1");
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let token = SessionKeys::new("other-secret", Duration::hours(1))
            .issue("alice", "g1")
            .unwrap();
        assert!(keys().claims(&token).is_none());
    }

    #[test]
    fn expired_token_is_rejected() {
        let expired = SessionKeys::new("test-secret", Duration::hours(-2));
        let token = expired.issue("alice", "g1").unwrap();
        assert!(keys().claims(&token).is_none());
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(keys().claims("not.a.token").is_none());
    }

    #[test]
    fn unrepresentable_expiry_is_an_error() {
        let keys = SessionKeys::new("test-secret", Duration::MAX);
        assert!(matches!(
            keys.issue("alice", "g1"),
            Err(SessionError::ExpiryOutOfRange)
        ));
    }

    #[test]
    fn store_and_load_through_cookie_jar() {
        let keys = keys();
        let jar = keys
            .store(CookieJar::new(), &Session::authenticated("alice", "g1"))
            .unwrap();

        let cookie = jar.get(SESSION_COOKIE).unwrap();
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
        let claims = keys.load(&jar).unwrap();
        assert_eq!((claims.sub.as_str(), claims.generation.as_str()), ("alice", "g1"));

        let jar = keys.store(jar, &Session::anonymous()).unwrap();
        assert!(jar.get(SESSION_COOKIE).is_none());
        assert!(keys.load(&jar).is_none());
    }
}
