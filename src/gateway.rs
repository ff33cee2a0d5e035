//! Identity gateway: login, signup, logout, and profile reads.
//!
//! Orchestrates the identity provider and the profile store. Holds no
//! per-user state; every call stands alone.

use std::sync::Arc;

use crate::config::ProfileInsertPolicy;
use crate::db::Database;
use crate::error::AppError;
use crate::identity::{Identity, IdentityProvider, SignupMetadata, TokenVerifier};
use crate::profiles::{self, Profile, UserProfile};

pub const LOGIN_FIELDS_REQUIRED: &str = "Email and password are required";
pub const SIGNUP_FIELDS_REQUIRED: &str = "Name, email and password are required";
pub const LOGIN_PROFILE_MISSING: &str = "User authenticated, but failed to fetch user profile.";
pub const SIGNUP_PROFILE_MISSING: &str = "Account created, but the user profile could not be saved.";

/// Successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: String,
    pub user: UserProfile,
}

/// Successful signup. `profile_error` is set when the identity was created
/// but the profile insert failed and the policy still reports success.
#[derive(Debug, Clone)]
pub struct SignupOutcome {
    pub identity: Identity,
    pub profile_error: Option<String>,
}

#[derive(Clone)]
pub struct IdentityGateway {
    provider: Arc<dyn IdentityProvider>,
    verifier: Arc<TokenVerifier>,
    db: Database,
    insert_policy: ProfileInsertPolicy,
}

/// True when any of the fields is empty or whitespace.
pub fn any_blank(fields: &[&str]) -> bool {
    fields.iter().any(|f| f.trim().is_empty())
}

impl IdentityGateway {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        verifier: Arc<TokenVerifier>,
        db: Database,
        insert_policy: ProfileInsertPolicy,
    ) -> Self {
        Self {
            provider,
            verifier,
            db,
            insert_policy,
        }
    }

    /// Password login followed by the profile read. A missing profile fails
    /// the whole login even though the provider accepted the password.
    ///
    /// Every provider failure, outages included, is reported as 401.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, AppError> {
        if any_blank(&[email, password]) {
            return Err(AppError::Validation(LOGIN_FIELDS_REQUIRED.to_string()));
        }

        tracing::info!(email = %email, "Login attempt");

        let session = self
            .provider
            .sign_in_with_password(email, password)
            .await
            .map_err(|err| {
                tracing::warn!(email = %email, error = %err, "Provider rejected login");
                AppError::Unauthorized(err.provider_message())
            })?;

        let profile = match profiles::get_profile(&self.db, &session.identity.id) {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                tracing::error!(user_id = %session.identity.id, "No profile for authenticated user");
                return Err(AppError::UpstreamInconsistency(LOGIN_PROFILE_MISSING.to_string()));
            }
            Err(err) => {
                tracing::error!(user_id = %session.identity.id, error = %err, "Profile fetch failed");
                return Err(AppError::UpstreamInconsistency(LOGIN_PROFILE_MISSING.to_string()));
            }
        };

        tracing::info!(user_id = %session.identity.id, "Login succeeded");
        Ok(LoginOutcome {
            token: session.access_token,
            user: UserProfile::from_parts(profile, &session.identity),
        })
    }

    /// Create the identity, then its profile. Never issues a token.
    /// Every provider failure is reported as 400.
    pub async fn signup(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<SignupOutcome, AppError> {
        if any_blank(&[email, password, name]) {
            return Err(AppError::Validation(SIGNUP_FIELDS_REQUIRED.to_string()));
        }

        tracing::info!(email = %email, "Signup attempt");

        let metadata = SignupMetadata {
            display_name: name.to_string(),
        };
        let identity = self
            .provider
            .sign_up(email, password, &metadata)
            .await
            .map_err(|err| {
                tracing::warn!(email = %email, error = %err, "Provider rejected signup");
                AppError::Validation(err.provider_message())
            })?;

        let profile = Profile::for_signup(&identity.id, name);
        let profile_error = match profiles::insert_profile(&self.db, &profile) {
            Ok(()) => None,
            Err(err) => {
                // The identity already exists at the provider; nothing here
                // removes it again.
                tracing::error!(
                    user_id = %identity.id,
                    error = %err,
                    policy = %self.insert_policy,
                    "Profile insert failed after identity creation"
                );
                match self.insert_policy {
                    ProfileInsertPolicy::Fail => {
                        return Err(AppError::UpstreamInconsistency(
                            SIGNUP_PROFILE_MISSING.to_string(),
                        ));
                    }
                    ProfileInsertPolicy::Log | ProfileInsertPolicy::Degraded => {
                        Some(err.to_string())
                    }
                }
            }
        };

        tracing::info!(user_id = %identity.id, "Signup succeeded");
        Ok(SignupOutcome {
            identity,
            profile_error,
        })
    }

    /// Invalidate the provider session behind an already verified token.
    pub async fn logout(&self, token: &str) -> Result<(), AppError> {
        self.verifier.forget(token);
        self.provider.sign_out(token).await.map_err(|err| {
            tracing::error!(error = %err, "Provider logout failed");
            AppError::Provider(err.to_string())
        })
    }

    /// Profile of a verified identity, with the provider's email merged in.
    pub fn profile(&self, identity: &Identity) -> Result<UserProfile, AppError> {
        let profile = profiles::get_profile(&self.db, &identity.id)?.ok_or_else(|| {
            tracing::warn!(user_id = %identity.id, "Profile not found");
            AppError::NotFound("Profile not found.".to_string())
        })?;
        Ok(UserProfile::from_parts(profile, identity))
    }

    pub fn insert_policy(&self) -> ProfileInsertPolicy {
        self.insert_policy
    }
}
