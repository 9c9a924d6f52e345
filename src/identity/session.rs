use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use parking_lot::RwLock;
use base64::Engine;
use tracing::error;
use crate::tprintln;

use super::principal::{Principal, UserId};
use super::provider::{IdentityVerifier, VerifyError};

pub type SessionToken = String;

#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub token: SessionToken,
    pub principal: Principal,
    pub issued_at: Instant,
    pub expires_at: Instant,
}

#[derive(Default)]
struct Tables {
    sessions: HashMap<SessionToken, Session>,
    user_index: HashMap<UserId, HashSet<SessionToken>>,
    revoked: HashSet<SessionToken>,
}

type EntropySource = fn(&mut [u8]) -> Result<(), getrandom::Error>;

fn gen_id(fill: EntropySource) -> Result<String, getrandom::Error> {
    // 256-bit random token base64url without padding
    let mut buf = [0u8; 32];
    fill(&mut buf).map_err(|e| {
        error!(target: "getit::identity", "random source failed, refusing to mint a session id: {e}");
        e
    })?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf))
}

/// In-memory bearer-token table standing in for the external identity service.
///
/// Cloning shares the same tables, so one manager can be handed to the HTTP
/// state and to whatever issues tokens.
#[derive(Clone)]
pub struct SessionManager {
    pub ttl: Duration,
    tables: Arc<RwLock<Tables>>,
    entropy: EntropySource,
}

impl Default for SessionManager {
    fn default() -> Self { Self::with_ttl(Duration::from_secs(60 * 60)) }
}

impl SessionManager {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self { ttl, tables: Arc::new(RwLock::new(Tables::default())), entropy: getrandom::getrandom }
    }

    #[cfg(test)]
    pub(crate) fn with_entropy(mut self, entropy: EntropySource) -> Self {
        self.entropy = entropy;
        self
    }

    /// Mint a fresh token. Fails without touching the tables if the OS random source errors.
    pub fn issue(&self, principal: Principal) -> Result<Session, getrandom::Error> {
        let token = gen_id(self.entropy)?;
        self.insert_token(token, principal)
    }

    /// Register an externally minted token (seeding from a tokens file, tests).
    pub fn insert_token<S: Into<String>>(&self, token: S, principal: Principal) -> Result<Session, getrandom::Error> {
        let session_id = gen_id(self.entropy)?;
        let now = Instant::now();
        let token = token.into();
        let sess = Session {
            session_id,
            token: token.clone(),
            principal: principal.clone(),
            issued_at: now,
            expires_at: now + self.ttl,
        };
        let mut t = self.tables.write();
        t.revoked.remove(&token);
        t.sessions.insert(token.clone(), sess.clone());
        t.user_index.entry(principal.user_id.clone()).or_default().insert(token);
        tprintln!("session.issue user={} sid={} ttl_secs={}", principal.user_id, sess.session_id, self.ttl.as_secs());
        Ok(sess)
    }

    pub fn validate(&self, token: &str) -> Result<Principal, VerifyError> {
        if token.is_empty() || token.chars().any(char::is_whitespace) {
            return Err(VerifyError::Malformed);
        }
        {
            let t = self.tables.read();
            if t.revoked.contains(token) { return Err(VerifyError::Revoked); }
            match t.sessions.get(token) {
                None => return Err(VerifyError::Unknown),
                Some(s) if s.expires_at > Instant::now() => return Ok(s.principal.clone()),
                Some(_) => {}
            }
        }
        // expired: prune under the write lock
        let mut t = self.tables.write();
        if let Some(s) = t.sessions.remove(token) {
            if let Some(set) = t.user_index.get_mut(&s.principal.user_id) { set.remove(token); }
        }
        Err(VerifyError::Expired)
    }

    pub fn logout(&self, token: &str) -> bool {
        let mut t = self.tables.write();
        let Some(s) = t.sessions.remove(token) else { return false; };
        if let Some(set) = t.user_index.get_mut(&s.principal.user_id) { set.remove(token); }
        t.revoked.insert(token.to_string());
        true
    }

    pub fn revoke_user(&self, user_id: &UserId) -> usize {
        let mut t = self.tables.write();
        let tokens = t.user_index.remove(user_id).unwrap_or_default();
        let mut count = 0usize;
        for tok in tokens {
            if t.sessions.remove(&tok).is_some() { count += 1; }
            t.revoked.insert(tok);
        }
        tprintln!("session.revoke user={} count={}", user_id, count);
        count
    }
}

impl IdentityVerifier for SessionManager {
    fn verify(&self, token: &str) -> Result<Principal, VerifyError> {
        self.validate(token)
    }
}
