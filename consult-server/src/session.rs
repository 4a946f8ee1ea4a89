//! Per-browser SMART launch state, keyed by the `consult_session` cookie.
//!
//! A launch starts a fresh session in the pending state; the redirect
//! consumes it and stores the access token and patient context. Nothing is
//! shared between sessions and nothing outlives the process.

use axum::http::{header, HeaderMap};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

pub const SESSION_COOKIE: &str = "consult_session";

/// How long a launch may wait for its redirect
const PENDING_TTL: Duration = Duration::from_secs(10 * 60);

/// Lifetime of an authorized session when the token response has no `expires_in`
const DEFAULT_GRANT_TTL: Duration = Duration::from_secs(60 * 60);

/// Upper bound on a grant's lifetime, whatever the token response says
const MAX_GRANT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Launch waiting for the authorization redirect
#[derive(Debug, Clone)]
pub struct PendingAuthorization {
    pub state: String,
    pub token_endpoint: String,
}

/// Access granted by the EHR for one patient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmartContext {
    pub api_base: String,
    pub access_token: String,
    pub patient_id: String,
    pub scope: Option<String>,
}

#[derive(Debug, Clone)]
enum SessionState {
    Pending(PendingAuthorization),
    Authorized(SmartContext),
}

#[derive(Debug)]
struct Session {
    state: SessionState,
    expires_at: Instant,
}

impl Session {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a launch under a fresh session id
    pub async fn begin(&self, pending: PendingAuthorization) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, s| !s.is_expired());
        sessions.insert(
            id.clone(),
            Session {
                state: SessionState::Pending(pending),
                expires_at: Instant::now() + PENDING_TTL,
            },
        );
        id
    }

    /// Drop session `id` and everything it held
    pub async fn clear(&self, id: &str) {
        self.sessions.write().await.remove(id);
    }

    /// Consume the pending launch of `id` when `state` matches it.
    ///
    /// The pending launch is removed either way; a redirect can be used once.
    pub async fn take_pending(&self, id: &str, state: &str) -> Option<PendingAuthorization> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.remove(id)?;
        if session.is_expired() {
            return None;
        }
        match session.state {
            SessionState::Pending(pending) if pending.state == state => Some(pending),
            _ => None,
        }
    }

    /// Store the granted context under `id`
    pub async fn authorize(&self, id: &str, context: SmartContext, expires_in: Option<u64>) {
        let ttl = expires_in
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_GRANT_TTL)
            .min(MAX_GRANT_TTL);
        self.sessions.write().await.insert(
            id.to_string(),
            Session {
                state: SessionState::Authorized(context),
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Authorized context of `id`, if any
    pub async fn context(&self, id: &str) -> Option<SmartContext> {
        let sessions = self.sessions.read().await;
        let session = sessions.get(id).filter(|s| !s.is_expired())?;
        match &session.state {
            SessionState::Authorized(context) => Some(context.clone()),
            SessionState::Pending(_) => None,
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Session id carried by the request's `Cookie` headers
pub fn session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// `Set-Cookie` value binding the browser to session `id`
pub fn session_cookie(id: &str) -> String {
    format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn pending(state: &str) -> PendingAuthorization {
        PendingAuthorization {
            state: state.to_string(),
            token_endpoint: "https://ehr.example/token".to_string(),
        }
    }

    fn context() -> SmartContext {
        SmartContext {
            api_base: "https://ehr.example/fhir".to_string(),
            access_token: "token-1".to_string(),
            patient_id: "p1".to_string(),
            scope: None,
        }
    }

    #[tokio::test]
    async fn test_pending_state_must_match() {
        let store = SessionStore::new();
        let id = store.begin(pending("abc")).await;

        assert!(store.take_pending(&id, "wrong").await.is_none());
        // consumed by the failed attempt
        assert!(store.take_pending(&id, "abc").await.is_none());

        let id = store.begin(pending("abc")).await;
        let taken = store.take_pending(&id, "abc").await.unwrap();
        assert_eq!(taken.token_endpoint, "https://ehr.example/token");
    }

    #[tokio::test]
    async fn test_authorize_and_relaunch_clears_session() {
        let store = SessionStore::new();
        let id = store.begin(pending("s")).await;
        assert!(store.context(&id).await.is_none());

        store.take_pending(&id, "s").await.unwrap();
        store.authorize(&id, context(), Some(3600)).await;
        assert_eq!(store.context(&id).await, Some(context()));

        store.clear(&id).await;
        let next = store.begin(pending("t")).await;
        assert_ne!(next, id);
        assert!(store.context(&id).await.is_none());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_expired_grant_is_not_returned() {
        let store = SessionStore::new();
        store.authorize("sid", context(), Some(0)).await;
        assert!(store.context("sid").await.is_none());
    }

    #[tokio::test]
    async fn test_huge_expires_in_is_capped() {
        let store = SessionStore::new();
        store.authorize("sid", context(), Some(u64::MAX)).await;
        assert_eq!(store.context("sid").await, Some(context()));

        let sessions = store.sessions.read().await;
        let remaining = sessions["sid"].expires_at - Instant::now();
        assert!(remaining <= MAX_GRANT_TTL);
    }

    #[test]
    fn test_session_id_from_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("theme=dark"));
        headers.append(
            header::COOKIE,
            HeaderValue::from_static("a=1; consult_session=abc-123 ; b=2"),
        );
        assert_eq!(session_id(&headers).as_deref(), Some("abc-123"));

        let empty = HeaderMap::new();
        assert!(session_id(&empty).is_none());
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("xyz");
        assert!(cookie.starts_with("consult_session=xyz;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
    }
}
