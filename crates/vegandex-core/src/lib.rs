//! vegandex-core - Core library for vegandex
//!
//! This crate provides the session subsystem of the vegandex client:
//! - API client for the `/api/auth` endpoints
//! - Credential storage (OS keychain or file)
//! - Session lifecycle management
//! - Configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

// Re-export commonly used types
pub use api::{ApiClient, ApiError, AuthService};
pub use auth::{
    open_credential_store, CredentialStore, Session, SessionError, SessionManager, SessionStatus,
};
pub use config::{Config, CredentialBackend};
pub use models::{ProfileUpdate, UserProfile};
