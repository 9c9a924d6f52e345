//!
//! GetIT document store
//! --------------------
//! User records are key-addressed JSON documents, one per `UserId`. The router only
//! ever reads them; writes exist for seeding and tests.
//!
//! Two adapters implement `DocumentStore`:
//! - `FileDocumentStore`: `<root>/<UserId>.json` on disk.
//! - `MemoryDocumentStore`: a `parking_lot::RwLock<HashMap>` with a failure switch,
//!   handy for driving the router through its error paths.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::identity::UserId;

/// A user profile document. Only `role` is interpreted; everything else is carried verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(flatten)]
    pub profile: serde_json::Map<String, serde_json::Value>,
}

impl UserRecord {
    pub fn with_role<S: Into<String>>(role: S) -> Self {
        Self { role: Some(role.into()), profile: serde_json::Map::new() }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found for {0}")]
    NotFound(UserId),
    #[error("document store I/O failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed user record: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("document store unavailable")]
    Unavailable,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_user(&self, id: &UserId) -> Result<UserRecord, StoreError>;
}

#[derive(Debug, Clone)]
pub struct FileDocumentStore {
    root: PathBuf,
}

impl FileDocumentStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    fn record_path(&self, id: &UserId) -> PathBuf { self.root.join(format!("{}.json", id)) }

    pub async fn put_user(&self, id: &UserId, record: &UserRecord) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.root).await?;
        let bytes = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(self.record_path(id), bytes).await?;
        debug!(target: "getit::storage", "put_user: id='{}'", id);
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FileDocumentStore {
    async fn get_user(&self, id: &UserId) -> Result<UserRecord, StoreError> {
        let path = self.record_path(id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StoreError::NotFound(id.clone())),
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    records: RwLock<HashMap<UserId, UserRecord>>,
    unavailable: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&self, id: UserId, record: UserRecord) {
        self.records.write().insert(id, record);
    }

    /// While set, every read fails with `StoreError::Unavailable`.
    pub fn set_unavailable(&self, on: bool) {
        self.unavailable.store(on, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get_user(&self, id: &UserId) -> Result<UserRecord, StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        self.records.read().get(id).cloned().ok_or_else(|| StoreError::NotFound(id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(s: &str) -> UserId { UserId::parse(s).unwrap() }

    #[tokio::test]
    async fn file_store_roundtrips_free_form_profile() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDocumentStore::new(dir.path().join("users"));
        let mut rec = UserRecord::with_role("Student");
        rec.profile.insert("university".into(), serde_json::json!("MIT"));
        store.put_user(&uid("s1"), &rec).await.unwrap();

        let got = store.get_user(&uid("s1")).await.unwrap();
        assert_eq!(got.role.as_deref(), Some("Student"));
        assert_eq!(got.profile.get("university"), Some(&serde_json::json!("MIT")));
    }

    #[tokio::test]
    async fn file_store_error_kinds() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDocumentStore::new(dir.path());
        assert!(matches!(store.get_user(&uid("ghost")).await, Err(StoreError::NotFound(_))));

        std::fs::write(dir.path().join("broken.json"), b"{not json").unwrap();
        assert!(matches!(store.get_user(&uid("broken")).await, Err(StoreError::Decode(_))));
    }

    #[tokio::test]
    async fn record_without_role_decodes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("norole.json"), br#"{"name":"Ada"}"#).unwrap();
        let store = FileDocumentStore::new(dir.path());
        let rec = store.get_user(&uid("norole")).await.unwrap();
        assert!(rec.role.is_none());
        assert_eq!(rec.profile.get("name"), Some(&serde_json::json!("Ada")));
    }

    #[tokio::test]
    async fn memory_store_failure_switch() {
        let store = MemoryDocumentStore::new();
        store.insert(uid("r1"), UserRecord::with_role("recruiter"));
        assert!(store.get_user(&uid("r1")).await.is_ok());
        store.set_unavailable(true);
        assert!(matches!(store.get_user(&uid("r1")).await, Err(StoreError::Unavailable)));
    }
}
