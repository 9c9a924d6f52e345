//! Upload gateway: turns an authenticated request plus a video payload into a stored
//! artifact and the public path it is served from.
//!
//! Flow per request:
//! 1. `authenticate` checks the `Authorization: Bearer <token>` header and verifies the token.
//! 2. The HTTP layer pulls the `video` multipart field.
//! 3. `store` derives `<UserId>_<unixMillis><.ext>`, ensures the blob root exists and writes
//!    the bytes without ever overwriting an existing artifact.
//!
//! Nothing here retries an I/O failure and a partially written file is left in place.

mod blob;

use std::io::{self, ErrorKind};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use axum::http::HeaderMap;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::VIDEO_PREFIX;
use crate::error::AppError;
use crate::identity::{bearer_token, IdentityVerifier, Principal, UserId, VerifyError};

pub use blob::{is_safe_name, BlobStore, FsBlobStore};

/// Multipart field carrying the payload.
pub const VIDEO_FIELD: &str = "video";
/// Names advance by one millisecond per collision, at most this many times.
pub const MAX_NAME_ATTEMPTS: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("missing or non-bearer Authorization header")]
    MissingCredential,
    #[error("token verification failed: {0}")]
    InvalidToken(#[from] VerifyError),
    #[error("no `video` field in request")]
    NoFile,
    #[error("file name {0:?} has no usable extension")]
    NoExtension(String),
    #[error("malformed multipart body: {0}")]
    MalformedBody(String),
    #[error("request body exceeds the upload limit")]
    TooLarge,
    #[error("storage failure: {0}")]
    Storage(#[from] io::Error),
}

impl From<UploadError> for AppError {
    fn from(e: UploadError) -> Self {
        match e {
            UploadError::MissingCredential => AppError::unauthorized("unauthorized", "Unauthorized"),
            UploadError::InvalidToken(_) => AppError::unauthorized("invalid_token", "Invalid token"),
            UploadError::NoFile => AppError::bad_request("no_file", "No video file provided"),
            UploadError::NoExtension(_) => AppError::bad_request("no_extension", "Video file must have an extension"),
            UploadError::MalformedBody(_) => AppError::bad_request("malformed_body", "Malformed upload body"),
            UploadError::TooLarge => AppError::payload_too_large("too_large", "Video file too large"),
            UploadError::Storage(_) => AppError::server("upload_failed", "Failed to upload video"),
        }
    }
}

pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 { chrono::Utc::now().timestamp_millis() }
}

/// Clock pinned to a settable instant.
#[derive(Debug, Default)]
pub struct FixedClock(AtomicI64);

impl FixedClock {
    pub fn new(millis: i64) -> Self { Self(AtomicI64::new(millis)) }
    pub fn set(&self, millis: i64) { self.0.store(millis, Ordering::SeqCst) }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 { self.0.load(Ordering::SeqCst) }
}

/// Characters that cannot appear in an on-disk artifact name.
pub(crate) fn is_unsafe_char(c: char) -> bool {
    c == '/' || c == '\\' || c.is_control()
}

/// Extension of `filename` including the leading dot, taken from the last `.`.
pub fn file_extension(filename: &str) -> Result<&str, UploadError> {
    let no_ext = || UploadError::NoExtension(filename.to_string());
    let idx = filename.rfind('.').ok_or_else(no_ext)?;
    let ext = &filename[idx..];
    if ext.len() == 1 || ext.chars().any(is_unsafe_char) {
        return Err(no_ext());
    }
    Ok(ext)
}

pub fn artifact_name(user_id: &UserId, millis: i64, ext: &str) -> String {
    format!("{}_{}{}", user_id, millis, ext)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredArtifact {
    pub name: String,
    pub public_path: String,
}

impl StoredArtifact {
    fn new(name: String) -> Self {
        let public_path = format!("/{}/{}", VIDEO_PREFIX, name);
        Self { name, public_path }
    }
}

pub struct UploadGateway {
    verifier: Arc<dyn IdentityVerifier>,
    blobs: Arc<dyn BlobStore>,
    clock: Arc<dyn Clock>,
}

impl UploadGateway {
    pub fn new(verifier: Arc<dyn IdentityVerifier>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { verifier, blobs, clock: Arc::new(SystemClock) }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> { &self.blobs }

    /// Check the bearer credential. The verifier's reason stays inside `InvalidToken`.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, UploadError> {
        let token = bearer_token(headers).ok_or(UploadError::MissingCredential)?;
        Ok(self.verifier.verify(token)?)
    }

    pub async fn store(&self, user_id: &UserId, filename: &str, bytes: &[u8]) -> Result<StoredArtifact, UploadError> {
        let ext = file_extension(filename)?;

        if let Err(e) = self.blobs.ensure_ready().await {
            error!(target: "getit::upload", "failed to prepare video directory: {e}");
            return Err(e.into());
        }

        let mut millis = self.clock.now_millis();
        for _ in 0..MAX_NAME_ATTEMPTS {
            let name = artifact_name(user_id, millis, ext);
            match self.blobs.put_new(&name, bytes).await {
                Ok(()) => {
                    info!(target: "getit::upload", "stored {} ({} bytes) for user {}", name, bytes.len(), user_id);
                    return Ok(StoredArtifact::new(name));
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    warn!(target: "getit::upload", "artifact name {} taken, advancing timestamp", name);
                    millis += 1;
                }
                Err(e) => {
                    error!(target: "getit::upload", "failed to write {}: {e}", name);
                    return Err(e.into());
                }
            }
        }
        error!(target: "getit::upload", "no free artifact name for user {} after {} attempts", user_id, MAX_NAME_ATTEMPTS);
        Err(io::Error::new(ErrorKind::AlreadyExists, "artifact name space exhausted").into())
    }
}
