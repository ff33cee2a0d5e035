//! GoTrue-style REST identity provider.
//!
//! Endpoints used, relative to the configured base URL:
//!
//! ```text
//! POST /auth/v1/token?grant_type=password   password grant
//! POST /auth/v1/signup                      account creation
//! GET  /auth/v1/user                        token -> identity
//! POST /auth/v1/logout                      session invalidation
//! ```
//!
//! Every call carries the project key in the `apikey` header.

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;
use url::Url;

use super::{Identity, IdentityError, IdentityProvider, ProviderSession, SignupMetadata};
use crate::net::HttpClient;

const TOKEN_PATH: &str = "auth/v1/token";
const SIGNUP_PATH: &str = "auth/v1/signup";
const USER_PATH: &str = "auth/v1/user";
const LOGOUT_PATH: &str = "auth/v1/logout";

/// Identity provider reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpIdentityProvider {
    base: Url,
    api_key: Option<String>,
    http: HttpClient,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: Identity,
}

/// Signup answers with the bare user when email confirmation is on, and with
/// `{user, session}` when it is off.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignupResponse {
    Wrapped { user: Identity },
    Bare(Identity),
}

/// Error bodies differ between provider versions and endpoints.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

impl ErrorBody {
    fn into_message(self, status: StatusCode) -> String {
        self.error_description
            .or(self.msg)
            .or(self.message)
            .or(self.error)
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Identity provider error")
                    .to_string()
            })
    }
}

impl HttpIdentityProvider {
    /// Create a provider client for the given base URL.
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        // A trailing slash keeps any base path when endpoints are joined on.
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base = Url::parse(&normalized)
            .map_err(|e| anyhow::anyhow!("Invalid identity provider URL '{base_url}': {e}"))?;

        Ok(Self {
            base,
            api_key,
            http: HttpClient::builder().request_timeout(timeout).build(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, IdentityError> {
        self.base.join(path).map_err(|e| IdentityError::Upstream {
            status: 0,
            message: format!("Invalid provider endpoint '{path}': {e}"),
        })
    }

    fn with_api_key(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("apikey", key),
            None => request,
        }
    }

    async fn error_message(response: Response) -> (StatusCode, String) {
        let status = response.status();
        let body: ErrorBody = response.json().await.unwrap_or_default();
        (status, body.into_message(status))
    }
}

#[async_trait::async_trait]
impl IdentityProvider for HttpIdentityProvider {
    #[instrument(skip(self, password))]
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<ProviderSession, IdentityError> {
        let mut url = self.endpoint(TOKEN_PATH)?;
        url.query_pairs_mut().append_pair("grant_type", "password");

        let response = self
            .with_api_key(self.http.inner().post(url))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        if response.status().is_success() {
            let token: TokenResponse = response.json().await?;
            return Ok(ProviderSession {
                access_token: token.access_token,
                identity: token.user,
            });
        }

        let (status, message) = Self::error_message(response).await;
        if status.is_client_error() {
            Err(IdentityError::InvalidCredentials(message))
        } else {
            Err(IdentityError::Upstream {
                status: status.as_u16(),
                message,
            })
        }
    }

    #[instrument(skip(self, password, metadata))]
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignupMetadata,
    ) -> Result<Identity, IdentityError> {
        let url = self.endpoint(SIGNUP_PATH)?;

        let response = self
            .with_api_key(self.http.inner().post(url))
            .json(&json!({ "email": email, "password": password, "data": metadata }))
            .send()
            .await?;

        if response.status().is_success() {
            let identity = match response.json::<SignupResponse>().await? {
                SignupResponse::Wrapped { user } | SignupResponse::Bare(user) => user,
            };
            return Ok(identity);
        }

        let (status, message) = Self::error_message(response).await;
        if status.is_client_error() {
            Err(IdentityError::Rejected(message))
        } else {
            Err(IdentityError::Upstream {
                status: status.as_u16(),
                message,
            })
        }
    }

    #[instrument(skip(self, token))]
    async fn get_user(&self, token: &str) -> Result<Identity, IdentityError> {
        let url = self.endpoint(USER_PATH)?;

        let response = self
            .with_api_key(self.http.inner().get(url))
            .bearer_auth(token)
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(response.json().await?);
        }

        let (status, message) = Self::error_message(response).await;
        if status.is_client_error() {
            Err(IdentityError::InvalidToken(message))
        } else {
            Err(IdentityError::Upstream {
                status: status.as_u16(),
                message,
            })
        }
    }

    #[instrument(skip(self, token))]
    async fn sign_out(&self, token: &str) -> Result<(), IdentityError> {
        let url = self.endpoint(LOGOUT_PATH)?;

        let response = self
            .with_api_key(self.http.inner().post(url))
            .bearer_auth(token)
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(());
        }

        let (status, message) = Self::error_message(response).await;
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(IdentityError::InvalidToken(message))
            }
            _ => Err(IdentityError::Upstream {
                status: status.as_u16(),
                message,
            }),
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}
