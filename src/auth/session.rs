use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::Serialize;
use ts_rs::TS;

use super::users::User;
use crate::time::now_ms;

const TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct Session {
    pub token: String,
    #[ts(type = "number")]
    pub user_id: i64,
    pub username: String,
    pub is_admin: bool,
    /// Unix epoch milliseconds.
    #[ts(type = "number")]
    pub expires_at: i64,
}

/// Bearer tokens held in process memory. Restarting the server signs
/// everyone out.
#[derive(Debug, Clone)]
pub struct SessionStore {
    ttl: Duration,
    inner: Arc<Mutex<HashMap<String, Session>>>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn issue(&self, user: &User) -> Session {
        self.issue_at(user, now_ms())
    }

    fn issue_at(&self, user: &User, now: i64) -> Session {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        let ttl_ms = i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX);
        let session = Session {
            token: URL_SAFE_NO_PAD.encode(bytes),
            user_id: user.id,
            username: user.username.clone(),
            is_admin: user.is_admin,
            expires_at: now.saturating_add(ttl_ms),
        };
        let mut sessions = self.sessions();
        sessions.retain(|_, s| s.expires_at > now);
        sessions.insert(session.token.clone(), session.clone());
        tracing::info!(
            target: "accountdeck",
            event = "session_issued",
            user_id = session.user_id,
            expires_at = session.expires_at
        );
        session
    }

    /// Looks a token up; expired tokens are removed and reported as absent.
    pub fn resolve(&self, token: &str) -> Option<Session> {
        self.resolve_at(token, now_ms())
    }

    fn resolve_at(&self, token: &str, now: i64) -> Option<Session> {
        let mut sessions = self.sessions();
        match sessions.get(token) {
            Some(session) if session.expires_at > now => Some(session.clone()),
            Some(_) => {
                sessions.remove(token);
                tracing::debug!(target: "accountdeck", event = "session_expired");
                None
            }
            None => None,
        }
    }

    /// Returns true when the token was live.
    pub fn revoke(&self, token: &str) -> bool {
        let removed = self.sessions().remove(token);
        if let Some(session) = &removed {
            tracing::info!(target: "accountdeck", event = "session_revoked", user_id = session.user_id);
        }
        removed.is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
