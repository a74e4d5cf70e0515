//! Sync authentication.

use axum::http::{HeaderMap, header};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};

/// Header accepted as an alternative to `Authorization: Bearer`.
pub const SYNC_TOKEN_HEADER: &str = "x-sync-token";

/// The shared secret expected from the sync agent.
#[derive(Clone)]
pub struct SyncCredential(String);

impl SyncCredential {
    /// Wrap a configured secret. Surrounding whitespace is dropped, the
    /// same as for presented tokens; blank secrets are treated as absent.
    pub fn new(secret: impl Into<String>) -> Option<Self> {
        let secret = secret.into();
        let secret = secret.trim();
        if secret.is_empty() {
            None
        } else {
            Some(Self(secret.to_string()))
        }
    }

    /// Exact comparison that does not stop at the first differing byte.
    fn matches(&self, presented: &str) -> bool {
        let expected = self.0.as_bytes();
        let presented = presented.as_bytes();

        let mut diff = expected.len() ^ presented.len();
        for (i, byte) in expected.iter().enumerate() {
            diff |= usize::from(byte ^ presented.get(i).copied().unwrap_or(0));
        }
        diff == 0
    }
}

impl std::fmt::Debug for SyncCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SyncCredential(<redacted>)")
    }
}

/// Guards the push endpoint.
#[derive(Debug, Clone)]
pub struct SyncGuard {
    credential: Option<SyncCredential>,
}

impl SyncGuard {
    /// Create a guard. Without a credential every request is refused.
    pub fn new(credential: Option<SyncCredential>) -> Self {
        Self { credential }
    }

    /// Whether a credential is configured.
    pub fn is_configured(&self) -> bool {
        self.credential.is_some()
    }

    /// Check a presented token against the configured credential.
    pub fn authorize(&self, presented: &str) -> bool {
        match &self.credential {
            Some(credential) => credential.matches(presented),
            None => false,
        }
    }

    /// Check the token carried by a request.
    pub fn authorize_request(&self, headers: &HeaderMap) -> bool {
        presented_token(headers).is_some_and(|token| self.authorize(token))
    }
}

/// Extract the token from `Authorization: Bearer` or `X-Sync-Token`.
pub fn presented_token(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    bearer.or_else(|| {
        headers
            .get(SYNC_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
    })
}

/// Generate a secure random token.
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}
