pub mod middleware;

use serde::Serialize;

use crate::identity::Identity;

/// Verified caller attached to request extensions by the auth middleware.
#[derive(Clone, Serialize)]
pub struct AuthUser {
    pub user_id: String,
    pub email: String,
    /// The bearer token the request was verified with, kept so handlers can
    /// act on the caller's provider session (logout).
    #[serde(skip)]
    pub token: String,
}

impl AuthUser {
    pub fn new(identity: Identity, token: String) -> Self {
        Self {
            user_id: identity.id,
            email: identity.email,
            token,
        }
    }

    pub fn identity(&self) -> Identity {
        Identity {
            id: self.user_id.clone(),
            email: self.email.clone(),
            created_at: None,
        }
    }
}

impl std::fmt::Debug for AuthUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthUser")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("token", &"<redacted>")
            .finish()
    }
}
