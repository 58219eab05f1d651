//! Sessions and submission sequencing.
//!
//! A session is an explicit [`AuthSession`] value kept in a pluggable
//! [`SessionBackend`] under an opaque token. Handlers receive the
//! [`SessionManager`] through application state and look the token up per
//! request.
//!
//! Sign-in runs in demo mode: any email is accepted and no password is
//! checked.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Fixed uid handed out by demo login.
pub const DEMO_LOGIN_UID: &str = "demo-user-123";

/// Header carrying the session token.
pub const SESSION_HEADER: &str = "x-session-token";

/// The signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub uid: String,
    pub email: String,
    pub display_name: String,
    #[serde(default)]
    pub demo: bool,
}

impl AuthSession {
    fn demo(uid: String, email: &str) -> Self {
        let display_name = email.split('@').next().unwrap_or_default().to_string();
        Self {
            uid,
            email: email.to_string(),
            display_name,
            demo: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("email is required")]
    MissingEmail,

    #[error("invalid session token")]
    InvalidToken,

    #[error("session backend failed: {0}")]
    Backend(#[from] std::io::Error),

    #[error("stored session is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Key-value storage for serialized sessions.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, SessionError>;
    async fn set(&self, key: &str, value: String) -> Result<(), SessionError>;
    async fn clear(&self, key: &str) -> Result<(), SessionError>;
}

/// Sessions that live as long as the process.
#[derive(Default)]
pub struct MemorySessionBackend {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySessionBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionBackend for MemorySessionBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), SessionError> {
        self.entries.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<(), SessionError> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

/// One file per session under a directory, surviving restarts.
pub struct FileSessionBackend {
    dir: PathBuf,
}

impl FileSessionBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &str) -> Result<PathBuf, SessionError> {
        let valid = !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !valid {
            return Err(SessionError::InvalidToken);
        }
        Ok(self.dir.join(format!("{key}.session.json")))
    }
}

#[async_trait]
impl SessionBackend for FileSessionBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        match tokio::fs::read_to_string(self.path(key)?).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<(), SessionError> {
        let path = self.path(key)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(path, value).await?;
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<(), SessionError> {
        match tokio::fs::remove_file(self.path(key)?).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// Issues, resolves and ends sessions.
#[derive(Clone)]
pub struct SessionManager {
    backend: Arc<dyn SessionBackend>,
}

impl SessionManager {
    pub fn new(backend: Arc<dyn SessionBackend>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySessionBackend::new()))
    }

    /// Demo login: every email maps to the same demo account.
    pub async fn login(&self, email: &str) -> Result<(String, AuthSession), SessionError> {
        let email = require_email(email)?;
        self.start(AuthSession::demo(DEMO_LOGIN_UID.to_string(), email)).await
    }

    /// Demo signup: a fresh uid per call.
    pub async fn signup(&self, email: &str) -> Result<(String, AuthSession), SessionError> {
        let email = require_email(email)?;
        let uid = format!("demo-user-{}", Utc::now().timestamp_millis());
        self.start(AuthSession::demo(uid, email)).await
    }

    async fn start(&self, session: AuthSession) -> Result<(String, AuthSession), SessionError> {
        let token = uuid::Uuid::new_v4().to_string();
        self.backend
            .set(&token, serde_json::to_string(&session)?)
            .await?;
        info!(uid = %session.uid, "Session started");
        Ok((token, session))
    }

    /// The session for `token`, if any. Backend or decoding failures are
    /// treated as signed out.
    pub async fn current(&self, token: &str) -> Option<AuthSession> {
        let stored = match self.backend.get(token).await {
            Ok(stored) => stored?,
            Err(e) => {
                debug!(error = %e, "Session lookup failed");
                return None;
            }
        };

        match serde_json::from_str(&stored) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!(error = %e, "Discarding corrupt session");
                None
            }
        }
    }

    pub async fn logout(&self, token: &str) -> Result<(), SessionError> {
        self.backend.clear(token).await
    }
}

fn require_email(email: &str) -> Result<&str, SessionError> {
    let email = email.trim();
    if email.is_empty() {
        Err(SessionError::MissingEmail)
    } else {
        Ok(email)
    }
}

/// Hands out increasing request ids per key and remembers the latest.
///
/// A response computed for an id that is no longer the latest for its key
/// is stale and must not replace newer state.
#[derive(Clone, Default)]
pub struct SubmissionTracker {
    state: Arc<Mutex<Submissions>>,
}

#[derive(Default)]
struct Submissions {
    last_id: u64,
    latest: HashMap<String, u64>,
}

impl SubmissionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new submission for `key` and return its id.
    pub async fn begin(&self, key: &str) -> u64 {
        // Ids are allocated under the lock so a later id is never overwritten
        // by an earlier one.
        let mut state = self.state.lock().await;
        state.last_id += 1;
        let id = state.last_id;
        state.latest.insert(key.to_string(), id);
        id
    }

    pub async fn is_current(&self, key: &str, id: u64) -> bool {
        self.state.lock().await.latest.get(key) == Some(&id)
    }
}
