//! Session lifecycle: startup rehydration, sign-in, sign-out and local profile
//! bookkeeping.
//!
//! `SessionManager` is the single owner of the in-memory `Session`. It keeps
//! the credential store in step with it: the store holds a token and a profile
//! snapshot together or holds neither.
//!
//! Every mutating operation runs under one async mutex, so a second `login`
//! fired while the first is in flight waits for it instead of interleaving
//! store writes. The in-memory state sits behind a plain `RwLock` that is
//! never held across an await, which keeps reads synchronous for UI code.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::api::{ApiError, AuthService};
use crate::models::{AuthResponse, ProfileUpdate, UserProfile};

use super::credentials::{CredentialStore, SESSION_KEYS, TOKEN_KEY, USER_KEY};
use super::error::SessionError;
use super::session::{Session, SessionStatus};

const LOGIN_FAILED: &str = "Login failed. Please check your credentials.";
const REGISTER_FAILED: &str = "Registration failed. Please try again.";
const PROFILE_FAILED: &str = "Could not load your profile. Please try again.";
const UPDATE_FAILED: &str = "Could not update your profile. Please try again.";
const VERIFY_FAILED: &str = "Email verification failed. Please try again.";
const RESEND_FAILED: &str = "Could not resend the verification email. Please try again.";

pub struct SessionManager<A: ?Sized, S: ?Sized> {
    auth: Arc<A>,
    store: Arc<S>,
    session: RwLock<Session>,
    /// Held for the whole of every mutating operation
    operation: Mutex<()>,
    initialized: watch::Sender<bool>,
}

/// Marks initialization finished when dropped, on every exit path.
struct InitCompletion<'a> {
    session: &'a RwLock<Session>,
    initialized: &'a watch::Sender<bool>,
}

impl Drop for InitCompletion<'_> {
    fn drop(&mut self) {
        let status = {
            let mut session = self.session.write().unwrap_or_else(PoisonError::into_inner);
            session.finish_initializing();
            session.status()
        };
        self.initialized.send_replace(true);
        info!(?status, "Session initialization complete");
    }
}

impl<A, S> SessionManager<A, S>
where
    A: AuthService + ?Sized,
    S: CredentialStore + ?Sized,
{
    pub fn new(auth: Arc<A>, store: Arc<S>) -> Self {
        let (initialized, _) = watch::channel(false);
        Self {
            auth,
            store,
            session: RwLock::new(Session::new()),
            operation: Mutex::new(()),
            initialized,
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    fn read(&self) -> RwLockReadGuard<'_, Session> {
        self.session.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Session> {
        self.session.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current session state
    pub fn snapshot(&self) -> Session {
        self.read().clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.read().status()
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().is_authenticated()
    }

    pub fn token(&self) -> Option<String> {
        self.read().token().map(str::to_string)
    }

    pub fn profile(&self) -> Option<Arc<UserProfile>> {
        self.read().profile().cloned()
    }

    pub fn last_error(&self) -> Option<String> {
        self.read().last_error().map(str::to_string)
    }

    pub fn is_initialized(&self) -> bool {
        *self.initialized.borrow()
    }

    /// Resolves once `initialize` has finished, immediately if it already has.
    pub async fn wait_until_initialized(&self) {
        let mut rx = self.initialized.subscribe();
        // Only errors if the sender is gone, which cannot outlive `self`
        let _ = rx.wait_for(|done| *done).await;
    }

    // =========================================================================
    // Startup
    // =========================================================================

    /// Restore the stored session, if any. Runs once; later calls return
    /// immediately. Never fails: anything unusable is discarded.
    pub async fn initialize(&self) {
        let _op = self.operation.lock().await;
        if self.is_initialized() {
            debug!("Session already initialized");
            return;
        }

        let _completion = InitCompletion {
            session: &self.session,
            initialized: &self.initialized,
        };
        self.rehydrate().await;
    }

    async fn rehydrate(&self) {
        let stored = match (self.store.get(TOKEN_KEY).await, self.store.get(USER_KEY).await) {
            (Ok(token), Ok(user)) => (token, user),
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "Failed to read stored session");
                self.discard_stored_session().await;
                self.write().clear();
                return;
            }
        };

        // The stored profile is only a presence check; the server copy wins
        let token = match stored {
            (Some(token), Some(_)) => token,
            (None, None) => {
                debug!("No stored session");
                self.write().clear();
                return;
            }
            (token, _) => {
                warn!(has_token = token.is_some(), "Stored session is incomplete, discarding");
                self.discard_stored_session().await;
                self.write().clear();
                return;
            }
        };

        let profile = match self.auth.fetch_profile(&token).await {
            Ok(profile) => Arc::new(profile),
            Err(e) => {
                warn!(
                    error = %e,
                    unauthorized = e.is_unauthorized(),
                    "Could not restore session, signing out"
                );
                self.discard_stored_session().await;
                self.write().clear();
                return;
            }
        };

        if let Err(e) = self.persist_profile(&profile).await {
            warn!(error = %e, "Failed to persist refreshed profile, signing out");
            self.discard_stored_session().await;
            self.write().clear();
            return;
        }

        info!(user_id = %profile.id, "Session restored");
        self.write().authenticate(token, profile);
    }

    // =========================================================================
    // Sign-in / sign-out
    // =========================================================================

    /// Sign in with email and password.
    ///
    /// Refused while already signed in. On failure the message is also kept
    /// in `last_error`.
    pub async fn login(&self, email: &str, password: &str) -> Result<Arc<UserProfile>, SessionError> {
        let _op = self.operation.lock().await;
        self.write().clear_error();
        if self.is_authenticated() {
            return self.settle("login", Err(SessionError::AlreadyAuthenticated));
        }
        debug!("Attempting login");

        let result = match self.auth.login(email, password).await {
            Ok(response) => self.establish(response, LOGIN_FAILED).await,
            Err(e) => Err(SessionError::from_api(&e, LOGIN_FAILED)),
        };
        self.settle("login", result)
    }

    /// Create an account and sign in to it.
    ///
    /// Password confirmation is the caller's job.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Arc<UserProfile>, SessionError> {
        let _op = self.operation.lock().await;
        self.write().clear_error();
        if self.is_authenticated() {
            return self.settle("register", Err(SessionError::AlreadyAuthenticated));
        }
        debug!("Attempting registration");

        let result = match self.auth.register(username, email, password).await {
            Ok(response) => self.establish(response, REGISTER_FAILED).await,
            Err(e) => Err(SessionError::from_api(&e, REGISTER_FAILED)),
        };
        self.settle("register", result)
    }

    /// Turn a login/register response into a signed-in session.
    ///
    /// The token is written before the profile is fetched. If anything after
    /// that write fails, both keys are removed again and the session is
    /// cleared.
    async fn establish(
        &self,
        response: AuthResponse,
        fallback: &str,
    ) -> Result<Arc<UserProfile>, SessionError> {
        let token = response
            .token()
            .ok_or_else(|| SessionError::Validation("missing token".to_string()))?
            .to_string();

        match self.persist_and_fetch(&token, fallback).await {
            Ok(profile) => {
                info!(user_id = %profile.id, "Signed in");
                self.write().authenticate(token, profile.clone());
                Ok(profile)
            }
            Err(e) => {
                self.discard_stored_session().await;
                self.write().clear();
                Err(e)
            }
        }
    }

    async fn persist_and_fetch(
        &self,
        token: &str,
        fallback: &str,
    ) -> Result<Arc<UserProfile>, SessionError> {
        self.store
            .set(TOKEN_KEY, token)
            .await
            .map_err(SessionError::Storage)?;

        let profile = self
            .auth
            .fetch_profile(token)
            .await
            .map_err(|e| SessionError::from_api(&e, fallback))?;
        let profile = Arc::new(profile);

        self.persist_profile(&profile).await?;
        Ok(profile)
    }

    /// Sign out. The server is told on a best-effort basis; local state is
    /// always cleared.
    pub async fn logout(&self) {
        let _op = self.operation.lock().await;
        let token = {
            let mut session = self.write();
            session.clear_error();
            session.token().map(str::to_string)
        };

        if let Some(token) = token {
            if let Err(e) = self.auth.logout(&token).await {
                warn!(error = %e, "Remote logout failed, clearing local session anyway");
            }
        }

        self.discard_stored_session().await;
        self.write().clear();
        info!("Signed out");
    }

    // =========================================================================
    // Profile
    // =========================================================================

    /// Append a product the user just created to the cached profile.
    ///
    /// Local bookkeeping only; the server already knows. Does nothing when
    /// signed out.
    pub async fn record_uploaded_product(&self, product_id: &str) {
        let _op = self.operation.lock().await;
        let current = {
            let mut session = self.write();
            session.clear_error();
            if session.is_authenticated() {
                session.profile().cloned()
            } else {
                None
            }
        };
        let Some(current) = current else {
            debug!(product_id, "Not signed in, ignoring uploaded product");
            return;
        };

        let updated = Arc::new(current.with_uploaded_product(product_id));
        if let Err(e) = self.persist_profile(&updated).await {
            warn!(product_id, error = %e, "Failed to persist uploaded product");
        }
        self.write().replace_profile(updated);
        debug!(product_id, "Recorded uploaded product");
    }

    /// Re-fetch the canonical profile from the server.
    pub async fn refresh_profile(&self) -> Result<Arc<UserProfile>, SessionError> {
        let _op = self.operation.lock().await;
        self.write().clear_error();

        let result: Result<_, SessionError> = async {
            let token = self.current_token()?;
            let profile = match self.auth.fetch_profile(&token).await {
                Ok(profile) => Arc::new(profile),
                Err(e) => return Err(self.authenticated_call_failed(e, PROFILE_FAILED).await),
            };
            self.adopt_profile(profile).await
        }
        .await;
        self.settle("refresh profile", result)
    }

    /// Change username and/or email.
    pub async fn update_profile(
        &self,
        update: &ProfileUpdate,
    ) -> Result<Arc<UserProfile>, SessionError> {
        let _op = self.operation.lock().await;
        self.write().clear_error();

        let result: Result<_, SessionError> = async {
            let token = self.current_token()?;
            if update.is_empty() {
                return self.profile().ok_or(SessionError::NotAuthenticated);
            }
            let profile = match self.auth.update_profile(&token, update).await {
                Ok(profile) => Arc::new(profile),
                Err(e) => return Err(self.authenticated_call_failed(e, UPDATE_FAILED).await),
            };
            self.adopt_profile(profile).await
        }
        .await;
        self.settle("update profile", result)
    }

    /// Confirm an email address with the token from the verification mail.
    /// Works signed in or out.
    pub async fn verify_email(&self, verification_token: &str) -> Result<(), SessionError> {
        let _op = self.operation.lock().await;
        self.write().clear_error();

        let result = self
            .auth
            .verify_email(verification_token)
            .await
            .map_err(|e| SessionError::from_api(&e, VERIFY_FAILED));
        if result.is_ok() {
            info!("Email verified");
        }
        self.settle("verify email", result)
    }

    pub async fn resend_verification(&self) -> Result<(), SessionError> {
        let _op = self.operation.lock().await;
        self.write().clear_error();

        let result: Result<(), SessionError> = async {
            let token = self.current_token()?;
            match self.auth.resend_verification(&token).await {
                Ok(()) => Ok(()),
                Err(e) => Err(self.authenticated_call_failed(e, RESEND_FAILED).await),
            }
        }
        .await;
        self.settle("resend verification", result)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn current_token(&self) -> Result<String, SessionError> {
        let session = self.read();
        if !session.is_authenticated() {
            return Err(SessionError::NotAuthenticated);
        }
        session
            .token()
            .map(str::to_string)
            .ok_or(SessionError::NotAuthenticated)
    }

    /// Persist a fresh server profile and make it current.
    async fn adopt_profile(&self, profile: Arc<UserProfile>) -> Result<Arc<UserProfile>, SessionError> {
        self.persist_profile(&profile).await?;
        self.write().replace_profile(profile.clone());
        Ok(profile)
    }

    async fn persist_profile(&self, profile: &UserProfile) -> Result<(), SessionError> {
        let json = serde_json::to_string(profile)
            .map_err(|e| SessionError::Storage(anyhow::Error::from(e)))?;
        self.store
            .set(USER_KEY, &json)
            .await
            .map_err(SessionError::Storage)
    }

    /// A 401 on an authenticated call means the token is dead: sign out
    /// locally.
    async fn authenticated_call_failed(&self, err: ApiError, fallback: &str) -> SessionError {
        if err.is_unauthorized() {
            warn!("Token rejected by server, clearing session");
            self.discard_stored_session().await;
            self.write().clear();
        }
        SessionError::from_api(&err, fallback)
    }

    async fn discard_stored_session(&self) {
        if let Err(e) = self.store.remove_all(&SESSION_KEYS).await {
            warn!(error = %e, "Failed to remove stored session");
        }
    }

    fn settle<T>(&self, operation: &str, result: Result<T, SessionError>) -> Result<T, SessionError> {
        if let Err(ref e) = result {
            warn!(operation, error = %e, "Session operation failed");
            self.write().set_error(e.to_string());
        }
        result
    }
}
