use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use tracing::{debug, info};

use super::principal::{Principal, UserId};
use super::session::SessionManager;

pub const BEARER_PREFIX: &str = "Bearer ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("malformed token")]
    Malformed,
    #[error("unknown token")]
    Unknown,
    #[error("token expired")]
    Expired,
    #[error("token revoked")]
    Revoked,
}

/// Verifies a bearer credential and returns the claims it carries.
pub trait IdentityVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<Principal, VerifyError>;
}

/// One-shot read of the currently signed-in identity, `None` when nobody is signed in.
#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn current_identity(&self) -> Option<UserId>;
}

/// Extract the token of an `Authorization: Bearer <token>` header.
/// The scheme prefix is matched literally, including case and the single space.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let raw = headers.get(AUTHORIZATION)?.to_str().ok()?;
    raw.strip_prefix(BEARER_PREFIX)
}

/// Resolves the signed-in identity from an optional bearer token.
pub struct TokenIdentity {
    verifier: Arc<dyn IdentityVerifier>,
    token: Option<String>,
}

impl TokenIdentity {
    pub fn new(verifier: Arc<dyn IdentityVerifier>, token: Option<String>) -> Self {
        Self { verifier, token }
    }
}

#[async_trait]
impl IdentityService for TokenIdentity {
    async fn current_identity(&self) -> Option<UserId> {
        let token = self.token.as_deref()?;
        match self.verifier.verify(token) {
            Ok(p) => Some(p.user_id),
            Err(e) => {
                debug!(target: "identity", "token did not resolve to an identity: {e}");
                None
            }
        }
    }
}

/// Seed a session manager from a JSON object of `token -> user id`.
pub fn load_tokens_file(sm: &SessionManager, path: &Path) -> Result<usize> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read tokens file: {}", path.display()))?;
    let map: HashMap<String, UserId> = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid tokens file: {}", path.display()))?;
    let n = map.len();
    for (token, uid) in map {
        sm.insert_token(token, Principal::new(uid))
            .context("Failed to mint a session id while seeding tokens")?;
    }
    info!(target: "identity", "Seeded {} token(s) from {}", n, path.display());
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(v: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(AUTHORIZATION, HeaderValue::from_str(v).unwrap());
        h
    }

    #[test]
    fn bearer_prefix_is_literal() {
        assert_eq!(bearer_token(&headers("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("bearer abc")), None);
        assert_eq!(bearer_token(&headers("Basic abc")), None);
        assert_eq!(bearer_token(&headers("Bearerabc")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn token_identity_resolves_or_yields_none() {
        let sm = SessionManager::default();
        let s = sm.issue(Principal::new(UserId::parse("u1").unwrap())).unwrap();
        let verifier: Arc<dyn IdentityVerifier> = Arc::new(sm);

        let signed_in = TokenIdentity::new(verifier.clone(), Some(s.token));
        assert_eq!(signed_in.current_identity().await.unwrap().as_str(), "u1");

        let bogus = TokenIdentity::new(verifier.clone(), Some("bogus".into()));
        assert!(bogus.current_identity().await.is_none());

        let anonymous = TokenIdentity::new(verifier, None);
        assert!(anonymous.current_identity().await.is_none());
    }

    #[test]
    fn tokens_file_seeds_manager() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("tokens.json");
        std::fs::write(&p, r#"{"t-1":"alice","t-2":"bob"}"#).unwrap();
        let sm = SessionManager::default();
        assert_eq!(load_tokens_file(&sm, &p).unwrap(), 2);
        assert_eq!(sm.validate("t-2").unwrap().user_id.as_str(), "bob");

        std::fs::write(&p, r#"{"t-3":"../root"}"#).unwrap();
        assert!(load_tokens_file(&sm, &p).is_err());
    }
}
