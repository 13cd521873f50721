use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use async_trait::async_trait;
use keyring::Entry;
use tracing::{debug, warn};

/// Key holding the raw bearer token
pub const TOKEN_KEY: &str = "token";

/// Key holding the JSON-serialized `UserProfile`
pub const USER_KEY: &str = "user";

/// Both session keys, for batch removal
pub const SESSION_KEYS: [&str; 2] = [TOKEN_KEY, USER_KEY];

const SERVICE_NAME: &str = "vegandex";

/// Credential file name in cache directory
const CREDENTIALS_FILE: &str = "credentials.json";

/// Attempts per key before a keychain deletion is reported as failed
const MAX_REMOVE_ATTEMPTS: u32 = 3;

/// Key-value storage for the session token and profile snapshot.
///
/// `remove_all` is a single batch from the caller's point of view.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    async fn remove_all(&self, keys: &[&str]) -> Result<()>;
}

// ============================================================================
// OS keychain
// ============================================================================

/// Credential store backed by the OS keychain, one entry per key.
pub struct KeyringCredentialStore {
    service: String,
}

impl KeyringCredentialStore {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    pub fn with_service(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry> {
        Entry::new(&self.service, key).context("Failed to create keyring entry")
    }

    fn delete(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete credential from keychain"),
        }
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for KeyringCredentialStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve credential from keychain"),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entry(key)?
            .set_password(value)
            .context("Failed to store credential in keychain")
    }

    async fn remove_all(&self, keys: &[&str]) -> Result<()> {
        let mut failed = Vec::new();
        for key in keys {
            let mut attempt = 1;
            loop {
                match self.delete(key) {
                    Ok(()) => break,
                    Err(e) if attempt < MAX_REMOVE_ATTEMPTS => {
                        debug!(key = *key, attempt, error = %e, "Retrying keychain deletion");
                        attempt += 1;
                    }
                    Err(e) => {
                        warn!(key = *key, error = %e, "Giving up on keychain deletion");
                        failed.push(*key);
                        break;
                    }
                }
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(anyhow::anyhow!(
                "Failed to delete keychain entries: {}",
                failed.join(", ")
            ))
        }
    }
}

// ============================================================================
// JSON file
// ============================================================================

/// Credential store backed by a single JSON object file.
///
/// Every mutation rewrites the whole file through a temp file and rename, so a
/// batch removal lands on disk all at once.
pub struct FileCredentialStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileCredentialStore {
    /// Store credentials in `credentials.json` under `cache_dir`
    pub fn new(cache_dir: &Path) -> Self {
        Self::at_path(cache_dir.join(CREDENTIALS_FILE))
    }

    pub fn at_path(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)
            .context("Failed to read credentials file")?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&contents).context("Failed to parse credentials file")
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<()> {
        if map.is_empty() {
            if self.path.exists() {
                std::fs::remove_file(&self.path).context("Failed to remove credentials file")?;
            }
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let contents = serde_json::to_string_pretty(map)?;
        std::fs::write(&tmp, contents).context("Failed to write credentials file")?;
        restrict_permissions(&tmp)?;
        std::fs::rename(&tmp, &self.path).context("Failed to replace credentials file")?;
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .context("Failed to restrict credentials file permissions")
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.guard();
        Ok(self.read_map()?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.guard();
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)
    }

    async fn remove_all(&self, keys: &[&str]) -> Result<()> {
        let _guard = self.guard();
        let mut map = match self.read_map() {
            Ok(map) => map,
            Err(e) => {
                // Unreadable file: the only way to drop the keys is to start over
                warn!(path = %self.path.display(), error = %e, "Discarding unreadable credentials file");
                BTreeMap::new()
            }
        };
        for key in keys {
            map.remove(*key);
        }
        self.write_map(&map)
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// Process-local credential store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryCredentialStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_all(&self, keys: &[&str]) -> Result<()> {
        let mut entries = self.entries();
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }
}
