//! In-process identity provider.
//!
//! Behaves like the HTTP provider from the gateway's point of view: emails
//! are unique (case-insensitive), passwords are argon2-hashed, tokens are
//! opaque and stay valid until signed out. Nothing is persisted.

use std::collections::HashMap;
use std::sync::RwLock;

use uuid::Uuid;

use super::credentials;
use super::{Identity, IdentityError, IdentityProvider, ProviderSession, SignupMetadata};

const MIN_PASSWORD_LEN: usize = 6;

struct Account {
    identity: Identity,
    password_hash: String,
    display_name: String,
}

#[derive(Default)]
struct State {
    /// Keyed by lowercased email.
    accounts: HashMap<String, Account>,
    /// Token fingerprint -> lowercased email.
    sessions: HashMap<String, String>,
}

#[derive(Default)]
pub struct MemoryIdentityProvider {
    state: RwLock<State>,
}

impl MemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered accounts.
    pub fn account_count(&self) -> usize {
        self.state.read().expect("identity state poisoned").accounts.len()
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.state.read().expect("identity state poisoned").sessions.len()
    }

    /// Display name recorded at signup for an email, if the account exists.
    pub fn display_name(&self, email: &str) -> Option<String> {
        self.state
            .read()
            .expect("identity state poisoned")
            .accounts
            .get(&email.trim().to_lowercase())
            .map(|account| account.display_name.clone())
    }

    /// Drop every live session, as if the provider expired all tokens.
    pub fn revoke_all_sessions(&self) {
        self.state
            .write()
            .expect("identity state poisoned")
            .sessions
            .clear();
    }
}

fn internal(err: argon2::password_hash::Error) -> IdentityError {
    IdentityError::Upstream {
        status: 500,
        message: format!("Password hashing failed: {err}"),
    }
}

#[async_trait::async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<ProviderSession, IdentityError> {
        let key = email.trim().to_lowercase();
        let invalid = || IdentityError::InvalidCredentials("Invalid login credentials".to_string());

        let identity = {
            let state = self.state.read().expect("identity state poisoned");
            let account = state.accounts.get(&key).ok_or_else(invalid)?;
            if !credentials::verify_password(password, &account.password_hash).map_err(internal)? {
                return Err(invalid());
            }
            account.identity.clone()
        };

        let access_token = credentials::generate_access_token();
        self.state
            .write()
            .expect("identity state poisoned")
            .sessions
            .insert(credentials::fingerprint(&access_token), key);

        tracing::debug!(user_id = %identity.id, "Memory provider issued token");
        Ok(ProviderSession {
            access_token,
            identity,
        })
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignupMetadata,
    ) -> Result<Identity, IdentityError> {
        let email = email.trim();
        if !email.contains('@') {
            return Err(IdentityError::Rejected(
                "Unable to validate email address: invalid format".to_string(),
            ));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(IdentityError::Rejected(format!(
                "Password should be at least {MIN_PASSWORD_LEN} characters."
            )));
        }

        let password_hash = credentials::hash_password(password).map_err(internal)?;
        let key = email.to_lowercase();

        let mut state = self.state.write().expect("identity state poisoned");
        if state.accounts.contains_key(&key) {
            return Err(IdentityError::Rejected(
                "User already registered".to_string(),
            ));
        }

        let identity = Identity {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            created_at: Some(chrono::Utc::now().to_rfc3339()),
        };
        state.accounts.insert(
            key,
            Account {
                identity: identity.clone(),
                password_hash,
                display_name: metadata.display_name.clone(),
            },
        );

        tracing::debug!(user_id = %identity.id, "Memory provider created account");
        Ok(identity)
    }

    async fn get_user(&self, token: &str) -> Result<Identity, IdentityError> {
        let state = self.state.read().expect("identity state poisoned");
        state
            .sessions
            .get(&credentials::fingerprint(token))
            .and_then(|key| state.accounts.get(key))
            .map(|account| account.identity.clone())
            .ok_or_else(|| IdentityError::InvalidToken("invalid JWT: token is invalid".to_string()))
    }

    async fn sign_out(&self, token: &str) -> Result<(), IdentityError> {
        let removed = self
            .state
            .write()
            .expect("identity state poisoned")
            .sessions
            .remove(&credentials::fingerprint(token));

        match removed {
            Some(_) => Ok(()),
            None => Err(IdentityError::InvalidToken(
                "invalid JWT: token is invalid".to_string(),
            )),
        }
    }

    fn name(&self) -> &str {
        "memory"
    }
}
