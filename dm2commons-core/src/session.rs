//! Per-user, time-bounded session state.
//!
//! A [`SessionState`] is created empty on first visit and filled in step by step:
//! artifact data after `start`, the temporary OAuth pair after `initiate`, the access
//! pair after the verifier exchange. The store expires a session after
//! `timeout` of inactivity, which invalidates whatever flow it was carrying.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use uuid::Uuid;

use crate::artifact::{ArtifactRecord, LicenseInfo};
use crate::error::SessionError;
use crate::oauth::OAuthCredential;

/// Server-issued session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        SessionId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        SessionId(value)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub artifact: Option<ArtifactRecord>,
    pub image_url: Option<String>,
    pub filename: Option<String>,
    pub license: Option<LicenseInfo>,
    pub request_token: Option<OAuthCredential>,
    pub access_token: Option<OAuthCredential>,
}

impl SessionState {
    /// Begins a new artifact flow. Any token from an earlier flow is dropped so the
    /// new artifact has to be authorized again.
    pub fn begin_flow(
        &mut self,
        artifact: ArtifactRecord,
        image_url: String,
        filename: String,
        license: LicenseInfo,
    ) {
        *self = SessionState {
            artifact: Some(artifact),
            image_url: Some(image_url),
            filename: Some(filename),
            license: Some(license),
            request_token: None,
            access_token: None,
        };
    }

    pub fn take_request_token(&mut self) -> Option<OAuthCredential> {
        self.request_token.take()
    }

    pub fn take_access_token(&mut self) -> Option<OAuthCredential> {
        self.access_token.take()
    }

    /// Clears the fields of a finished upload, including the access pair.
    pub fn finish_flow(&mut self) {
        self.artifact = None;
        self.image_url = None;
        self.filename = None;
        self.license = None;
        self.request_token = None;
        self.access_token = None;
    }

    pub fn has_artifact(&self) -> bool {
        self.artifact.is_some() && self.image_url.is_some() && self.filename.is_some()
    }
}

/// Storage for session state keyed by [`SessionId`].
///
/// Implementations must treat an expired session exactly like a missing one
/// from the caller's point of view, except for the error variant.
pub trait SessionStore: Send + Sync {
    /// Creates a new, empty session.
    fn create(&self) -> SessionId;

    /// Returns a copy of the session state and refreshes its inactivity timer.
    fn load(&self, id: &SessionId) -> Result<SessionState, SessionError>;

    /// Replaces the session state. Fails if the session expired in the meantime.
    fn save(&self, id: &SessionId, state: SessionState) -> Result<(), SessionError>;

    fn remove(&self, id: &SessionId);
}

struct Entry {
    state: SessionState,
    last_seen: Instant,
}

/// Process-local [`SessionStore`] with lazy expiry.
pub struct InMemorySessionStore {
    timeout: Duration,
    sessions: Mutex<HashMap<SessionId, Entry>>,
}

impl InMemorySessionStore {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SessionId, Entry>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_expired(&self, entry: &Entry, now: Instant) -> bool {
        now.duration_since(entry.last_seen) >= self.timeout
    }

    /// Drops every expired session and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, entry| now.duration_since(entry.last_seen) < self.timeout);
        let purged = before - sessions.len();
        if purged > 0 {
            debug!(purged, "Purged expired sessions");
        }
        purged
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for InMemorySessionStore {
    fn create(&self) -> SessionId {
        self.purge_expired();
        let id = SessionId::generate();
        self.lock().insert(
            id.clone(),
            Entry {
                state: SessionState::default(),
                last_seen: Instant::now(),
            },
        );
        debug!(session_id = %id, "Created session");
        id
    }

    fn load(&self, id: &SessionId) -> Result<SessionState, SessionError> {
        let now = Instant::now();
        let mut sessions = self.lock();
        let entry = sessions.get_mut(id).ok_or(SessionError::Unknown)?;
        if self.is_expired(entry, now) {
            sessions.remove(id);
            info!(session_id = %id, "Session expired, flow must restart");
            return Err(SessionError::Expired);
        }
        entry.last_seen = now;
        Ok(entry.state.clone())
    }

    fn save(&self, id: &SessionId, state: SessionState) -> Result<(), SessionError> {
        let now = Instant::now();
        let mut sessions = self.lock();
        let entry = sessions.get_mut(id).ok_or(SessionError::Unknown)?;
        if self.is_expired(entry, now) {
            sessions.remove(id);
            info!(session_id = %id, "Session expired before save, flow must restart");
            return Err(SessionError::Expired);
        }
        entry.state = state;
        entry.last_seen = now;
        Ok(())
    }

    fn remove(&self, id: &SessionId) {
        self.lock().remove(id);
    }
}
