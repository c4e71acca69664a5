//! Admin session tokens.
//!
//! Sessions are short-lived, server-side-validated tokens handed to the
//! admin UI after a successful login; unlike [`strongbox_auth::permission::ApiKeyCache`]
//! they are mutated in place (issued and revoked one at a time, not reloaded
//! in bulk from a durable table), so a single [`parking_lot::RwLock`] over a
//! plain map is the right tool rather than a snapshot-then-swap structure.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::AdminError;

/// Default lifetime of a freshly issued session token.
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24;

/// A single authenticated admin session.
#[derive(Debug, Clone)]
pub struct Session {
    /// The admin username this session authenticates as.
    pub username: String,
    /// When the session was issued.
    pub created_at: DateTime<Utc>,
    /// When the session stops being valid.
    pub expires_at: DateTime<Utc>,
}

/// In-memory store of live admin session tokens.
#[derive(Debug)]
pub struct SessionStore {
    ttl: Duration,
    sessions: RwLock<HashMap<String, Session>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Duration::hours(DEFAULT_SESSION_TTL_HOURS))
    }
}

impl SessionStore {
    /// Create a session store whose tokens live for `ttl` after issuance.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Mint a new session token for `username`, valid for this store's TTL.
    pub fn issue(&self, username: &str) -> String {
        let token = Uuid::new_v4().to_string();
        let now = Utc::now();
        self.sessions.write().insert(
            token.clone(),
            Session {
                username: username.to_owned(),
                created_at: now,
                expires_at: now + self.ttl,
            },
        );
        token
    }

    /// Validate a session token, returning its [`Session`] if it exists and
    /// has not expired.
    ///
    /// An expired token is evicted as a side effect of the lookup so the map
    /// never grows unbounded from abandoned logins.
    pub fn authenticate(&self, token: &str) -> Result<Session, AdminError> {
        let now = Utc::now();
        {
            let sessions = self.sessions.read();
            match sessions.get(token) {
                Some(session) if session.expires_at > now => return Ok(session.clone()),
                Some(_) => {}
                None => return Err(AdminError::InvalidSession),
            }
        }
        self.sessions.write().remove(token);
        Err(AdminError::InvalidSession)
    }

    /// Invalidate a session token immediately (logout). Idempotent.
    pub fn revoke(&self, token: &str) {
        self.sessions.write().remove(token);
    }

    /// Remove every expired session. Intended to be called periodically by
    /// the maintenance loop so logout-less abandoned sessions don't linger.
    pub fn purge_expired(&self) {
        let now = Utc::now();
        self.sessions.write().retain(|_, session| session.expires_at > now);
    }

    /// Number of currently tracked sessions, expired or not. For tests and diagnostics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Whether the store currently tracks no sessions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_authenticate_freshly_issued_token() {
        let store = SessionStore::default();
        let token = store.issue("admin");
        let session = store.authenticate(&token).unwrap();
        assert_eq!(session.username, "admin");
    }

    #[test]
    fn test_should_reject_unknown_token() {
        let store = SessionStore::default();
        assert!(matches!(store.authenticate("nope"), Err(AdminError::InvalidSession)));
    }

    #[test]
    fn test_should_reject_revoked_token() {
        let store = SessionStore::default();
        let token = store.issue("admin");
        store.revoke(&token);
        assert!(matches!(store.authenticate(&token), Err(AdminError::InvalidSession)));
    }

    #[test]
    fn test_should_reject_expired_token() {
        let store = SessionStore::new(Duration::seconds(-1));
        let token = store.issue("admin");
        assert!(matches!(store.authenticate(&token), Err(AdminError::InvalidSession)));
    }

    #[test]
    fn test_should_evict_expired_token_on_lookup() {
        let store = SessionStore::new(Duration::seconds(-1));
        let token = store.issue("admin");
        let _ = store.authenticate(&token);
        assert!(store.is_empty());
    }

    #[test]
    fn test_should_purge_only_expired_sessions() {
        let store = SessionStore::default();
        let live = store.issue("admin");
        let expired_store = SessionStore::new(Duration::seconds(-1));
        let _expired = expired_store.issue("admin");

        store.purge_expired();
        assert_eq!(store.len(), 1);
        assert!(store.authenticate(&live).is_ok());
    }
}
