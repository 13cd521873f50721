use async_trait::async_trait;

use crate::models::{AuthResponse, ProfileUpdate, UserProfile};

use super::ApiError;

/// Remote authentication service.
///
/// Each call is an independent request/response pair; none of them retry.
#[async_trait]
pub trait AuthService: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError>;

    async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, ApiError>;

    /// Fetch the canonical profile for the holder of `token`.
    async fn fetch_profile(&self, token: &str) -> Result<UserProfile, ApiError>;

    async fn logout(&self, token: &str) -> Result<(), ApiError>;

    async fn update_profile(
        &self,
        token: &str,
        update: &ProfileUpdate,
    ) -> Result<UserProfile, ApiError>;

    /// Confirm an email address with the token from the verification mail.
    async fn verify_email(&self, verification_token: &str) -> Result<(), ApiError>;

    async fn resend_verification(&self, token: &str) -> Result<(), ApiError>;
}
