//! API client for the vegandex REST backend.
//!
//! This module provides the `ApiClient` struct, the reqwest-backed
//! implementation of `AuthService`.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::config::Config;
use crate::models::{AuthResponse, ProfileUpdate, UserProfile};

use super::{ApiError, AuthService};

// ============================================================================
// Constants
// ============================================================================

/// Default base URL for the backend API
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";

/// HTTP request timeout in seconds.
/// Bounds the whole request, connect through body.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// API client for the vegandex backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Create a client using the configured base URL and timeout
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.api_base_url(), config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: &str) -> Self {
        Self {
            client: self.client.clone(), // Cheap clone, shares connection pool
            base_url: self.base_url.clone(),
            token: Some(token.to_string()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn auth_headers(&self) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
        if let Some(ref token) = self.token {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
                ApiError::Unauthorized(Some("Stored token is not a valid header value".to_string()))
            })?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn send(&self, request: RequestBuilder, url: &str) -> Result<Response, ApiError> {
        let response = request.send().await.map_err(|e| {
            let err = ApiError::from_transport(e);
            warn!(url = url, error = %err, "Request failed before a response arrived");
            err
        })?;
        debug!(url = url, status = response.status().as_u16(), "API response");
        Self::check_response(response).await
    }

    async fn parse_json<T: DeserializeOwned>(response: Response, url: &str) -> Result<T, ApiError> {
        let text = response.text().await.map_err(ApiError::from_transport)?;
        serde_json::from_str(&text).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", url, e))
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        let request = self.client.get(&url).headers(self.auth_headers()?);
        let response = self.send(request, &url).await?;
        Self::parse_json(response, &url).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        let url = self.url(path);
        let request = self.client.post(&url).headers(self.auth_headers()?).json(body);
        let response = self.send(request, &url).await?;
        Self::parse_json(response, &url).await
    }

    async fn put<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        let url = self.url(path);
        let request = self.client.put(&url).headers(self.auth_headers()?).json(body);
        let response = self.send(request, &url).await?;
        Self::parse_json(response, &url).await
    }

    /// POST without a body where only the status matters.
    async fn post_ack(&self, path: &str) -> Result<(), ApiError> {
        let url = self.url(path);
        let request = self.client.post(&url).headers(self.auth_headers()?);
        self.send(request, &url).await?;
        Ok(())
    }
}

#[async_trait]
impl AuthService for ApiClient {
    async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        let body = serde_json::json!({
            "email": email,
            "password": password,
        });
        self.post("/auth/login", &body).await
    }

    async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, ApiError> {
        let body = serde_json::json!({
            "email": email,
            "password": password,
            "username": username,
        });
        self.post("/auth/register", &body).await
    }

    async fn fetch_profile(&self, token: &str) -> Result<UserProfile, ApiError> {
        self.with_token(token).get("/auth/profile").await
    }

    async fn logout(&self, token: &str) -> Result<(), ApiError> {
        self.with_token(token).post_ack("/auth/logout").await
    }

    async fn update_profile(
        &self,
        token: &str,
        update: &ProfileUpdate,
    ) -> Result<UserProfile, ApiError> {
        self.with_token(token).put("/auth/profile", update).await
    }

    async fn verify_email(&self, verification_token: &str) -> Result<(), ApiError> {
        let url = self.url("/auth/verify-email");
        let request = self
            .client
            .get(&url)
            .headers(self.auth_headers()?)
            .query(&[("token", verification_token)]);
        self.send(request, &url).await?;
        Ok(())
    }

    async fn resend_verification(&self, token: &str) -> Result<(), ApiError> {
        self.with_token(token).post_ack("/auth/resend-verification").await
    }
}
