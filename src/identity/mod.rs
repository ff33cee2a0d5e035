//! Identity provider integration.
//!
//! The provider is the service of record for credentials: it checks
//! passwords, issues and invalidates bearer tokens, and resolves a token back
//! to an identity. This module defines the [`IdentityProvider`] seam and its
//! implementations:
//! - [`HttpIdentityProvider`] - GoTrue-style REST provider (`/auth/v1/...`)
//! - [`MemoryIdentityProvider`] - in-process provider for development and tests
//!
//! [`TokenVerifier`] sits in front of a provider for the per-request token
//! check done by the auth middleware.

pub mod credentials;
pub mod http;
pub mod memory;
pub mod verifier;

pub use http::HttpIdentityProvider;
pub use memory::MemoryIdentityProvider;
pub use verifier::TokenVerifier;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::{IdentityBackend, IdentityConfig};

/// An identity as held by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Result of a successful password grant.
#[derive(Clone)]
pub struct ProviderSession {
    pub access_token: String,
    pub identity: Identity,
}

impl std::fmt::Debug for ProviderSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSession")
            .field("access_token", &"<redacted>")
            .field("identity", &self.identity)
            .finish()
    }
}

/// Metadata attached to a new account.
#[derive(Debug, Clone, Serialize)]
pub struct SignupMetadata {
    pub display_name: String,
}

/// Errors reported by an identity provider.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// The password grant was refused.
    #[error("{0}")]
    InvalidCredentials(String),

    /// The bearer token is unknown, malformed, or expired.
    #[error("{0}")]
    InvalidToken(String),

    /// The provider refused the request (duplicate email, weak password, ...).
    #[error("{0}")]
    Rejected(String),

    /// The provider answered with an unexpected error status.
    #[error("Identity provider error ({status}): {message}")]
    Upstream { status: u16, message: String },

    /// The provider could not be reached or its response could not be read.
    #[error("Identity provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),
}

impl IdentityError {
    /// The provider's own wording, without the variant prefix.
    pub fn provider_message(&self) -> String {
        match self {
            Self::InvalidCredentials(message)
            | Self::InvalidToken(message)
            | Self::Rejected(message) => message.clone(),
            Self::Upstream { message, .. } if !message.trim().is_empty() => message.clone(),
            Self::Upstream { .. } | Self::Transport(_) => self.to_string(),
        }
    }
}

/// Operations this system needs from an identity provider.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Password-grant authentication.
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<ProviderSession, IdentityError>;

    /// Create an account. Never returns a session.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignupMetadata,
    ) -> Result<Identity, IdentityError>;

    /// Resolve a bearer token to its identity.
    async fn get_user(&self, token: &str) -> Result<Identity, IdentityError>;

    /// Invalidate the provider session behind a bearer token.
    async fn sign_out(&self, token: &str) -> Result<(), IdentityError>;

    /// Name of this provider backend, for logging.
    fn name(&self) -> &str;
}

/// Build the configured identity provider.
pub fn provider_from_config(config: &IdentityConfig) -> anyhow::Result<Arc<dyn IdentityProvider>> {
    let provider: Arc<dyn IdentityProvider> = match config.backend {
        IdentityBackend::Http => Arc::new(HttpIdentityProvider::new(
            &config.url,
            config.api_key.clone(),
            config.timeout(),
        )?),
        IdentityBackend::Memory => {
            tracing::warn!("Using in-memory identity provider; accounts are lost on restart");
            Arc::new(MemoryIdentityProvider::new())
        }
    };
    Ok(provider)
}
