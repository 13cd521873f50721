//! Data models shared by the API client and the session layer.
//!
//! - `UserProfile`: the signed-in user, in the same JSON shape the server
//!   returns and the credential store persists
//! - `AuthResponse`: login/registration responses
//! - `ProfileUpdate`: partial profile edits

pub mod user;

pub use user::{AuthResponse, ProfileUpdate, UserProfile};
