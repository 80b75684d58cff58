//! Short-lived OAuth session state.
//!
//! A session is created when an authorization URL is handed out and is
//! consumed exactly once by the matching callback.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::error::PlatformError;
use crate::models::Platform;

const DEFAULT_TTL: Duration = Duration::from_secs(10 * 60);

const VERIFIER_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

#[derive(Debug, Clone)]
pub struct OAuthSession {
    pub tenant_id: Option<i64>,
    pub platform: Platform,
    /// PKCE verifier, set only for platforms that use PKCE
    pub code_verifier: Option<String>,
    created_at: Instant,
}

pub struct OAuthSessionStore {
    ttl: Duration,
    sessions: Mutex<HashMap<String, OAuthSession>>,
}

impl Default for OAuthSessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl OAuthSessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn sessions(&self) -> std::sync::MutexGuard<'_, HashMap<String, OAuthSession>> {
        let mut guard = self
            .sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let ttl = self.ttl;
        guard.retain(|_, s| s.created_at.elapsed() < ttl);
        guard
    }

    /// Opens a session for a tenant and returns its `state` value
    pub fn begin(&self, tenant_id: i64, platform: Platform) -> String {
        let state = generate_state();
        self.sessions().insert(
            state.clone(),
            OAuthSession {
                tenant_id: Some(tenant_id),
                platform,
                code_verifier: None,
                created_at: Instant::now(),
            },
        );
        state
    }

    /// Stores a PKCE verifier under `state`, opening the session if needed
    pub fn attach_verifier(&self, state: &str, platform: Platform, verifier: String) {
        let mut sessions = self.sessions();
        let session = sessions.entry(state.to_string()).or_insert(OAuthSession {
            tenant_id: None,
            platform,
            code_verifier: None,
            created_at: Instant::now(),
        });
        session.code_verifier = Some(verifier);
    }

    /// Tenant that opened the session, without consuming it
    pub fn tenant_for(&self, state: &str, platform: Platform) -> Result<Option<i64>, PlatformError> {
        let sessions = self.sessions();
        let session = sessions
            .get(state)
            .ok_or_else(|| PlatformError::InvalidState("unknown or expired state".to_string()))?;
        if session.platform != platform {
            return Err(PlatformError::InvalidState(format!(
                "state was issued for {}",
                session.platform
            )));
        }
        Ok(session.tenant_id)
    }

    /// Removes and returns the session; a second call with the same state fails
    pub fn take(&self, state: &str, platform: Platform) -> Result<OAuthSession, PlatformError> {
        let session = self
            .sessions()
            .remove(state)
            .ok_or_else(|| PlatformError::InvalidState("unknown or expired state".to_string()))?;
        if session.platform != platform {
            return Err(PlatformError::InvalidState(format!(
                "state was issued for {}",
                session.platform
            )));
        }
        Ok(session)
    }
}

pub fn generate_state() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    hex::encode(bytes)
}

/// 64-character verifier drawn from the RFC 7636 unreserved set
pub fn generate_code_verifier() -> String {
    let mut rng = rand::rng();
    (0..64)
        .map(|_| VERIFIER_ALPHABET[rng.random_range(0..VERIFIER_ALPHABET.len())] as char)
        .collect()
}

/// S256 challenge: base64url(SHA-256(verifier)) without padding
pub fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}
