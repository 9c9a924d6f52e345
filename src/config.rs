//! Runtime configuration loaded from `GETIT_*` environment variables.
//! Every key has a default; fallbacks are logged so a bare start still explains itself.

use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use tracing::{info, warn};

pub const DEFAULT_HTTP_PORT: u16 = 3000;
pub const DEFAULT_FAILURE_REDIRECT_MS: u64 = 3000;
pub const DEFAULT_MAX_UPLOAD_MB: usize = 512;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 60 * 60;

/// Public URL prefix (and subdirectory of the public root) for uploaded videos.
pub const VIDEO_PREFIX: &str = "video";

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    /// Static-serving root; uploads land under `<public_dir>/video`.
    pub public_dir: PathBuf,
    /// Document-store root; user records live under `<data_dir>/users`.
    pub data_dir: PathBuf,
    /// Optional JSON map of bearer token -> user id used to seed the local verifier.
    pub tokens_file: Option<PathBuf>,
    pub max_upload_bytes: usize,
    pub failure_redirect_ms: u64,
    pub session_ttl_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            public_dir: PathBuf::from("public"),
            data_dir: PathBuf::from("data"),
            tokens_file: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
            failure_redirect_ms: DEFAULT_FAILURE_REDIRECT_MS,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let max_upload_mb: usize = try_load("GETIT_MAX_UPLOAD_MB", DEFAULT_MAX_UPLOAD_MB);
        Self {
            http_port: try_load("GETIT_HTTP_PORT", DEFAULT_HTTP_PORT),
            public_dir: PathBuf::from(try_load::<String>("GETIT_PUBLIC_DIR", "public".to_string())),
            data_dir: PathBuf::from(try_load::<String>("GETIT_DATA_DIR", "data".to_string())),
            tokens_file: var("GETIT_TOKENS_FILE").map(PathBuf::from),
            max_upload_bytes: max_upload_mb.saturating_mul(1024 * 1024),
            failure_redirect_ms: try_load("GETIT_FAILURE_REDIRECT_MS", DEFAULT_FAILURE_REDIRECT_MS),
            session_ttl_secs: try_load("GETIT_SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS),
        }
    }

    #[inline]
    pub fn video_dir(&self) -> PathBuf { self.public_dir.join(VIDEO_PREFIX) }

    #[inline]
    pub fn users_dir(&self) -> PathBuf { self.data_dir.join("users") }

    #[inline]
    pub fn failure_redirect_delay(&self) -> Duration { Duration::from_millis(self.failure_redirect_ms) }

    #[inline]
    pub fn session_ttl(&self) -> Duration { Duration::from_secs(self.session_ttl_secs) }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match var(key) {
        None => {
            info!("{key} not set, using default: {default}");
            default
        }
        Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value '{raw}': {e}; using default: {default}");
            default
        }),
    }
}
