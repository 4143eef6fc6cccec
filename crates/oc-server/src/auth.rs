//! Sessions and authorisation (spec.md §4.D, §9 "Session and cookies").
//!
//! A cookie maps 1:1 to an in-memory `Session`. Authentication against the
//! third-party identity provider is an external collaborator (spec.md §1);
//! this module only owns the cookie → session map and the authorisation
//! checks that consult it. The login flow itself (redirect construction,
//! OAuth code exchange) lives outside the core per spec.md §6.

use std::collections::HashMap;

use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::AppError;

/// Name of the cookie that carries the session id (spec.md §4.D).
pub const SESSION_COOKIE: &str = "oc_session";

/// Extract the session cookie's value from a request's `Cookie` header.
pub fn cookie_from_headers(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(axum::http::header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k.trim() == SESSION_COOKIE).then(|| v.trim().to_string())
    })
}

/// A row of the `User` table (spec.md §6): an authenticated identity tied
/// to the third-party provider.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserRecord {
    pub user_id: i64,
    pub user_name: String,
    pub twitch_id: String,
    pub is_mod: bool,
}

/// `{cookie, user-or-nil, login-redirect-target, oauth-csrf-token}`
/// (spec.md §4.D). Handed to every new socket so an endpoint can determine
/// user identity and authorisation.
#[derive(Debug, Clone)]
pub struct Session {
    pub cookie: String,
    pub user: Option<UserRecord>,
    pub login_redirect: Option<String>,
    pub oauth_csrf: String,
}

impl Session {
    pub fn anonymous() -> Self {
        Session {
            cookie: Uuid::new_v4().to_string(),
            user: None,
            login_redirect: None,
            oauth_csrf: Uuid::new_v4().to_string(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn is_mod(&self) -> bool {
        self.user.as_ref().is_some_and(|u| u.is_mod)
    }
}

/// Cookie → session map (spec.md §4.D).
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an existing session by cookie, or mint and register a fresh
    /// anonymous one.
    pub async fn get_or_create(&self, cookie: Option<&str>) -> Session {
        if let Some(cookie) = cookie {
            let sessions = self.sessions.read().await;
            if let Some(session) = sessions.get(cookie) {
                return session.clone();
            }
        }
        let session = Session::anonymous();
        self.sessions
            .write()
            .await
            .insert(session.cookie.clone(), session.clone());
        session
    }

    pub async fn get(&self, cookie: &str) -> Option<Session> {
        self.sessions.read().await.get(cookie).cloned()
    }

    pub async fn put(&self, session: Session) {
        self.sessions.write().await.insert(session.cookie.clone(), session);
    }

    /// Attach a logged-in user to an existing session after the OAuth code
    /// exchange completes (performed by the external identity-provider
    /// collaborator; only the result lands here).
    pub async fn log_in(&self, cookie: &str, user: UserRecord) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(cookie) {
            session.user = Some(user);
        }
    }
}

/// Host-only commands require `session.user` to be non-nil (spec.md §4.D).
pub fn require_user<'a>(session: &'a Session, action: &str) -> Result<&'a UserRecord, AppError> {
    session
        .user
        .as_ref()
        .ok_or_else(|| AppError::Unauthorized(format!("{action} requires an authenticated session")))
}

/// Moderator commands additionally require `session.user.is_mod` (spec.md
/// §4.D).
pub fn require_mod<'a>(session: &'a Session, action: &str) -> Result<&'a UserRecord, AppError> {
    let user = require_user(session, action)?;
    if !user.is_mod {
        return Err(AppError::Unauthorized(format!("{action} requires a moderator session")));
    }
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mod_user() -> UserRecord {
        UserRecord {
            user_id: 1,
            user_name: "alice".to_string(),
            twitch_id: "123".to_string(),
            is_mod: true,
        }
    }

    #[tokio::test]
    async fn get_or_create_mints_distinct_anonymous_sessions() {
        let store = SessionStore::new();
        let a = store.get_or_create(None).await;
        let b = store.get_or_create(None).await;
        assert_ne!(a.cookie, b.cookie);
    }

    #[tokio::test]
    async fn get_or_create_returns_same_session_for_known_cookie() {
        let store = SessionStore::new();
        let a = store.get_or_create(None).await;
        let b = store.get_or_create(Some(&a.cookie)).await;
        assert_eq!(a.cookie, b.cookie);
    }

    #[tokio::test]
    async fn log_in_attaches_user() {
        let store = SessionStore::new();
        let session = store.get_or_create(None).await;
        store.log_in(&session.cookie, mod_user()).await;
        let updated = store.get(&session.cookie).await.unwrap();
        assert!(updated.is_authenticated());
        assert!(updated.is_mod());
    }

    #[test]
    fn require_user_rejects_anonymous_session() {
        let session = Session::anonymous();
        assert!(require_user(&session, "host action").is_err());
    }

    #[test]
    fn require_mod_rejects_non_mod_user() {
        let mut session = Session::anonymous();
        session.user = Some(UserRecord {
            user_id: 2,
            user_name: "bob".to_string(),
            twitch_id: "456".to_string(),
            is_mod: false,
        });
        assert!(require_user(&session, "host action").is_ok());
        assert!(require_mod(&session, "moderator action").is_err());
    }

    #[test]
    fn require_mod_accepts_mod_user() {
        let mut session = Session::anonymous();
        session.user = Some(mod_user());
        assert!(require_mod(&session, "moderator action").is_ok());
    }
}
