use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use chrono::{Duration, Utc};
use rand::Rng;

use crate::{
    models::auth::{AuthenticatedUser, Session},
    services::metrics::SESSIONS_GAUGE,
};

const TOKEN_LEN: usize = 48;
/// Keeps `now + ttl` well inside chrono's range.
const MAX_TTL_SECONDS: u64 = 10 * 365 * 24 * 60 * 60;

/// In-memory sessions keyed by an opaque random token. Nothing survives a
/// restart.
pub struct SessionStore {
    ttl: Duration,
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            ttl: Duration::seconds(ttl_seconds.min(MAX_TTL_SECONDS) as i64),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Stamp a new session with `user` and return its token.
    pub fn create(&self, user: AuthenticatedUser) -> String {
        let token: String = rand::thread_rng()
            .sample_iter(&rand::distributions::Alphanumeric)
            .take(TOKEN_LEN)
            .map(char::from)
            .collect();

        let now = Utc::now();
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.retain(|_, s| s.expires_at > now);
        sessions.insert(
            token.clone(),
            Session {
                user,
                expires_at: now + self.ttl,
            },
        );
        SESSIONS_GAUGE.set(sessions.len() as f64);
        token
    }

    /// The identity behind `token`, unless it is unknown or expired.
    pub fn resolve(&self, token: &str) -> Option<AuthenticatedUser> {
        let now = Utc::now();
        {
            let sessions = self.sessions.read().unwrap_or_else(PoisonError::into_inner);
            match sessions.get(token) {
                Some(s) if s.expires_at > now => return Some(s.user.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        // expired
        self.destroy(token);
        None
    }

    /// Returns whether a session was removed.
    pub fn destroy(&self, token: &str) -> bool {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let removed = sessions.remove(token).is_some();
        SESSIONS_GAUGE.set(sessions.len() as f64);
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::auth::Role;

    fn student() -> AuthenticatedUser {
        AuthenticatedUser {
            email: "stu1@u.edu".into(),
            role: Role::Student,
        }
    }

    #[test]
    fn test_create_resolve_destroy() {
        let store = SessionStore::new(3600);
        let token = store.create(student());

        assert_eq!(token.len(), TOKEN_LEN);
        assert_eq!(store.resolve(&token), Some(student()));
        assert!(store.destroy(&token));
        assert_eq!(store.resolve(&token), None);
        assert!(!store.destroy(&token));
    }

    #[test]
    fn test_tokens_are_distinct() {
        let store = SessionStore::new(3600);
        assert_ne!(store.create(student()), store.create(student()));
    }

    #[test]
    fn test_zero_ttl_session_is_expired() {
        let store = SessionStore::new(0);
        let token = store.create(student());
        assert_eq!(store.resolve(&token), None);
    }
}
