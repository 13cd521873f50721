//! REST API client module for the vegandex backend.
//!
//! This module provides the `AuthService` trait the session layer talks to,
//! and `ApiClient`, its reqwest implementation against the `/api/auth/*`
//! endpoints.
//!
//! Authenticated calls carry `Authorization: Bearer <token>`.

pub mod client;
pub mod error;
pub mod service;

pub use client::ApiClient;
pub use error::ApiError;
pub use service::AuthService;
