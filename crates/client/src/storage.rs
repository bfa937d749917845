//! Durable key-value persistence for the bearer token.
//!
//! The contract is narrow: one key, survives process restart, single writer.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tally_core::Token;
use thiserror::Error;

/// Key under which the current bearer token is stored.
pub const TOKEN_KEY: &str = "auth_token";

/// Error type for token storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data could not be decoded
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// A lock guarding the store was poisoned
    #[error("token store lock poisoned")]
    Poisoned,
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence backend for the session token.
pub trait TokenStore: Send + Sync {
    /// Load the stored token, if any.
    fn load(&self) -> StorageResult<Option<Token>>;

    /// Store the token, replacing any previous one.
    fn save(&self, token: &Token) -> StorageResult<()>;

    /// Delete the stored token. Returns whether one was present.
    fn remove(&self) -> StorageResult<bool>;
}

/// Token persisted as a small JSON document on disk.
///
/// Writes go to a sibling temp file which is then renamed over the target,
/// so a crash never leaves a half-written token behind.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> StorageResult<BTreeMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content).map_err(|e| {
                StorageError::Encoding(format!("{}: {e}", self.path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_document(&self, doc: &BTreeMap<String, String>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let body = serde_json::to_vec_pretty(doc)
            .map_err(|e| StorageError::Encoding(e.to_string()))?;

        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, body)?;
        restrict_permissions(&tmp)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> StorageResult<Option<Token>> {
        let doc = self.read_document()?;
        match doc.get(TOKEN_KEY) {
            Some(raw) => Token::new(raw.clone())
                .map(Some)
                .map_err(|e| StorageError::Encoding(e.to_string())),
            None => Ok(None),
        }
    }

    fn save(&self, token: &Token) -> StorageResult<()> {
        let mut doc = BTreeMap::new();
        doc.insert(TOKEN_KEY.to_string(), token.as_str().to_string());
        self.write_document(&doc)?;
        tracing::debug!(path = %self.path.display(), "token persisted");
        Ok(())
    }

    fn remove(&self) -> StorageResult<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "token removed");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process token store (tests, ephemeral sessions).
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<Token>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds a token, as if left by a previous process.
    pub fn with_token(token: Token) -> Self {
        Self {
            token: Mutex::new(Some(token)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> StorageResult<Option<Token>> {
        let guard = self.token.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(guard.clone())
    }

    fn save(&self, token: &Token) -> StorageResult<()> {
        let mut guard = self.token.lock().map_err(|_| StorageError::Poisoned)?;
        *guard = Some(token.clone());
        Ok(())
    }

    fn remove(&self) -> StorageResult<bool> {
        let mut guard = self.token.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(guard.take().is_some())
    }
}
