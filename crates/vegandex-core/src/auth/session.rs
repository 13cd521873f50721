use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::models::UserProfile;

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum SessionStatus {
    /// Startup rehydration has not finished yet
    Initializing,
    Unauthenticated,
    Authenticated,
}

/// Token and profile of a signed-in user. They only exist together.
#[derive(Debug, Clone)]
struct SessionData {
    token: String,
    profile: Arc<UserProfile>,
}

/// In-memory session state.
///
/// Cloning is cheap; the profile is shared, never mutated in place.
#[derive(Debug, Clone)]
pub struct Session {
    status: SessionStatus,
    data: Option<SessionData>,
    last_error: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            status: SessionStatus::Initializing,
            data: None,
            last_error: None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Get the bearer token if signed in
    pub fn token(&self) -> Option<&str> {
        self.data.as_ref().map(|d| d.token.as_str())
    }

    pub fn profile(&self) -> Option<&Arc<UserProfile>> {
        self.data.as_ref().map(|d| &d.profile)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }

    /// Sign in with a token and its profile
    pub(crate) fn authenticate(&mut self, token: String, profile: Arc<UserProfile>) {
        self.data = Some(SessionData { token, profile });
        self.status = SessionStatus::Authenticated;
    }

    /// Swap in a newer profile for the current token. Ignored when signed out.
    pub(crate) fn replace_profile(&mut self, profile: Arc<UserProfile>) {
        if let Some(ref mut data) = self.data {
            data.profile = profile;
        }
    }

    /// Drop token and profile
    pub(crate) fn clear(&mut self) {
        self.data = None;
        self.status = SessionStatus::Unauthenticated;
    }

    /// Leave `Initializing` if still there.
    pub(crate) fn finish_initializing(&mut self) {
        if self.status == SessionStatus::Initializing {
            self.status = if self.data.is_some() {
                SessionStatus::Authenticated
            } else {
                SessionStatus::Unauthenticated
            };
        }
    }

    pub(crate) fn set_error(&mut self, message: String) {
        self.last_error = Some(message);
    }

    pub(crate) fn clear_error(&mut self) {
        self.last_error = None;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
