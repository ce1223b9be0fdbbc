use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::models::Profile;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("no active session")]
    NotSignedIn,
    #[error("identity provider error: {0}")]
    Provider(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

/// Session lifecycle notifications the shell reacts to (route to sign-in
/// screen, reload profile, and so on).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum SessionChange {
    SignedIn { user_id: String },
    SignedOut,
    TokenRefreshed,
}

/// Identity collaborator. Sign-in/sign-up/sign-out and profile lookup live in
/// the managed backend; this crate only consumes the surface.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<(), AuthError>;

    async fn sign_up(&self, account: NewAccount) -> Result<(), AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    async fn profile(&self, user_id: &str) -> Result<Profile, AuthError>;

    /// Subscribe to session-changed events.
    fn subscribe(&self) -> broadcast::Receiver<SessionChange>;
}
