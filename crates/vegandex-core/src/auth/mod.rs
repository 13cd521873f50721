//! Authentication module for managing user sessions and credentials.
//!
//! This module provides:
//! - `SessionManager`: the session lifecycle (startup restore, login,
//!   registration, logout, profile bookkeeping)
//! - `Session`: the in-memory session state consumers read
//! - `CredentialStore`: persistence for the token and profile snapshot, with
//!   keychain, file and in-memory backends
//!
//! A token and a profile snapshot are always stored together or not at all.

pub mod credentials;
pub mod error;
pub mod manager;
pub mod session;

pub use credentials::{
    CredentialStore, FileCredentialStore, KeyringCredentialStore, MemoryCredentialStore,
    SESSION_KEYS, TOKEN_KEY, USER_KEY,
};
pub use error::SessionError;
pub use manager::SessionManager;
pub use session::{Session, SessionStatus};

use std::sync::Arc;

use anyhow::Result;

use crate::config::{Config, CredentialBackend};

/// Open the credential store the configuration asks for.
pub fn open_credential_store(config: &Config) -> Result<Arc<dyn CredentialStore>> {
    let store: Arc<dyn CredentialStore> = match config.credential_backend {
        CredentialBackend::Keyring => Arc::new(KeyringCredentialStore::new()),
        CredentialBackend::File => Arc::new(FileCredentialStore::new(&config.cache_dir()?)),
    };
    Ok(store)
}
