//! Credential storage backends
//!
//! The pipeline only needs `get`, `set` and `clear`; where the credential
//! lives is up to the application. Three backends ship with the SDK:
//! in-memory, a JSON file in the platform data directory, and the OS keyring.

use super::types::{get_sdk_data_dir, AuthError, AuthResult, Credential};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Holder of the current access credential. Last write wins.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Current credential, if any
    async fn get(&self) -> AuthResult<Option<Credential>>;

    /// Replace the current credential
    async fn set(&self, credential: Credential) -> AuthResult<()>;

    /// Forget the current credential
    async fn clear(&self) -> AuthResult<()>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Process-local store
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    credential: RwLock<Option<Credential>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: impl Into<Credential>) -> Self {
        Self {
            credential: RwLock::new(Some(credential.into())),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self) -> AuthResult<Option<Credential>> {
        Ok(self.credential.read().clone())
    }

    async fn set(&self, credential: Credential) -> AuthResult<()> {
        *self.credential.write() = Some(credential);
        Ok(())
    }

    async fn clear(&self) -> AuthResult<()> {
        self.credential.write().take();
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// On-disk format of [`FileCredentialStore`]
#[derive(Serialize, Deserialize)]
struct CredentialFile {
    access_token: Credential,
}

/// JSON file store, `credential.json` under the SDK data directory by default
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    const FILE_NAME: &'static str = "credential.json";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the platform default location
    pub fn default_location() -> AuthResult<Self> {
        Ok(Self::new(get_sdk_data_dir()?.join(Self::FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(&self) -> AuthResult<Option<Credential>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AuthError::StorageError(format!(
                    "Failed to read {}: {e}",
                    self.path.display()
                )))
            }
        };

        let file: CredentialFile = serde_json::from_str(&content).map_err(|e| {
            AuthError::StorageError(format!("Corrupt credential file {}: {e}", self.path.display()))
        })?;
        Ok(Some(file.access_token))
    }

    async fn set(&self, credential: Credential) -> AuthResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AuthError::StorageError(format!("Failed to create {}: {e}", parent.display())))?;
        }

        let content = serde_json::to_vec_pretty(&CredentialFile {
            access_token: credential,
        })
        .map_err(|e| AuthError::StorageError(e.to_string()))?;

        // Write then rename so readers never observe a half-written file
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| AuthError::StorageError(format!("Failed to write {}: {e}", tmp.display())))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(|e| AuthError::StorageError(e.to_string()))?;
        }

        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| AuthError::StorageError(format!("Failed to persist credential: {e}")))?;

        debug!("Stored credential at {}", self.path.display());
        Ok(())
    }

    async fn clear(&self) -> AuthResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AuthError::StorageError(format!(
                "Failed to remove {}: {e}",
                self.path.display()
            ))),
        }
    }

    fn name(&self) -> &str {
        "file"
    }
}

/// OS keyring store
pub struct KeyringCredentialStore {
    service: String,
    account: String,
}

impl KeyringCredentialStore {
    pub const DEFAULT_SERVICE: &'static str = "tokenguard";
    pub const DEFAULT_ACCOUNT: &'static str = "access_token";

    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
        }
    }

    /// Keyring calls block, so they run on the blocking pool
    async fn with_entry<T, F>(&self, op: F) -> AuthResult<T>
    where
        T: Send + 'static,
        F: FnOnce(keyring::Entry) -> AuthResult<T> + Send + 'static,
    {
        let service = self.service.clone();
        let account = self.account.clone();
        tokio::task::spawn_blocking(move || {
            let entry = keyring::Entry::new(&service, &account)
                .map_err(|e| AuthError::StorageError(format!("Keyring unavailable: {e}")))?;
            op(entry)
        })
        .await
        .map_err(|e| AuthError::StorageError(format!("Keyring task failed: {e}")))?
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SERVICE, Self::DEFAULT_ACCOUNT)
    }
}

#[async_trait]
impl CredentialStore for KeyringCredentialStore {
    async fn get(&self) -> AuthResult<Option<Credential>> {
        self.with_entry(|entry| match entry.get_password() {
            Ok(token) => Ok(Some(Credential::new(token))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(AuthError::StorageError(format!("Keyring read failed: {e}"))),
        })
        .await
    }

    async fn set(&self, credential: Credential) -> AuthResult<()> {
        self.with_entry(move |entry| {
            entry
                .set_password(credential.expose())
                .map_err(|e| AuthError::StorageError(format!("Keyring write failed: {e}")))
        })
        .await
    }

    async fn clear(&self) -> AuthResult<()> {
        self.with_entry(|entry| match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(AuthError::StorageError(format!("Keyring delete failed: {e}"))),
        })
        .await
    }

    fn name(&self) -> &str {
        "keyring"
    }
}
