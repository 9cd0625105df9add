//! Policy store — durable key/value backends for the policy record.
//!
//! DESIGN
//! ======
//! The coordinator is the only writer; every other context reads. The
//! trait mirrors a get-with-defaults / set key-value API: `load` never
//! fails because a record is missing, only because the backend is.
//!
//! ERROR HANDLING
//! ==============
//! `FileStore` writes to a sibling temp file and renames it into place, so
//! a failed or interrupted write leaves the previous record intact. Callers
//! treat any `StoreError` as "mutation did not happen".

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use policy::{ErrorCode, Policy};
use serde_json::{Map, Value};
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("store record is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl ErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Io(_) | Self::Unavailable(_) => "E_STORE_UNAVAILABLE",
            Self::Corrupt(_) => "E_STORE_CORRUPT",
        }
    }

    fn retryable(&self) -> bool {
        !matches!(self, Self::Corrupt(_))
    }
}

#[async_trait::async_trait]
pub trait PolicyStore: Send + Sync {
    /// Read the record, filling defaults for anything missing.
    async fn load(&self) -> Result<Policy, StoreError>;

    /// Replace the record.
    async fn save(&self, policy: &Policy) -> Result<(), StoreError>;
}

/// Persist the defaulted record once so the layout exists from first start.
///
/// # Errors
///
/// Returns the backend error if the read or the write fails.
pub async fn seed_defaults(store: &dyn PolicyStore) -> Result<Policy, StoreError> {
    let policy = store.load().await?;
    store.save(&policy).await?;
    info!(global = policy.global, overrides = policy.overrides.len(), "policy store initialized");
    Ok(policy)
}

// =============================================================================
// FILE STORE
// =============================================================================

/// JSON document on disk; the policy record lives under one key.
pub struct FileStore {
    path: PathBuf,
    key: String,
}

impl FileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self { path: path.into(), key: key.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> Result<Map<String, Value>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Map::new());
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait::async_trait]
impl PolicyStore for FileStore {
    async fn load(&self) -> Result<Policy, StoreError> {
        let mut document = self.read_document().await?;
        match document.remove(&self.key) {
            Some(record) => Ok(serde_json::from_value(record)?),
            None => Ok(Policy::default()),
        }
    }

    async fn save(&self, policy: &Policy) -> Result<(), StoreError> {
        // Other keys in the document belong to someone else; keep them.
        let mut document = self.read_document().await?;
        document.insert(self.key.clone(), serde_json::to_value(policy)?);
        let rendered = serde_json::to_vec_pretty(&Value::Object(document))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, rendered).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

// =============================================================================
// MEMORY STORE
// =============================================================================

/// In-process store. Supports injected failures for exercising error paths.
#[derive(Default)]
pub struct MemoryStore {
    record: Mutex<Option<Policy>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_policy(policy: Policy) -> Self {
        Self { record: Mutex::new(Some(policy)), ..Self::default() }
    }

    #[cfg(test)]
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    #[cfg(test)]
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful writes so far.
    #[cfg(test)]
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Raw stored record, `None` if nothing was ever written.
    #[must_use]
    pub fn snapshot(&self) -> Option<Policy> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait::async_trait]
impl PolicyStore for MemoryStore {
    async fn load(&self) -> Result<Policy, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected read failure".into()));
        }
        Ok(self.snapshot().unwrap_or_default())
    }

    async fn save(&self, policy: &Policy) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected write failure".into()));
        }
        *self.record.lock().unwrap_or_else(PoisonError::into_inner) = Some(policy.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
