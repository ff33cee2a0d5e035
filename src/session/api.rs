//! Client side of the REST surface.

use std::time::Duration;

use reqwest::Response;
use serde::de::DeserializeOwned;
use tracing::instrument;
use url::Url;

use super::error::ClientError;
use crate::api::types::{
    ErrorBody, LoginRequest, LoginResponse, SignupRequest, SignupResponse,
};
use crate::net::HttpClient;
use crate::profiles::UserProfile;

/// The gateway operations the session manager depends on.
#[async_trait::async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ClientError>;

    async fn signup(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<SignupResponse, ClientError>;

    async fn logout(&self, token: &str) -> Result<(), ClientError>;

    async fn fetch_profile(&self, token: &str) -> Result<UserProfile, ClientError>;
}

/// [`AuthApi`] over HTTP against a running server.
#[derive(Debug, Clone)]
pub struct HttpAuthApi {
    base: Url,
    http: HttpClient,
}

impl HttpAuthApi {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| anyhow::anyhow!("Invalid API URL '{base_url}': {e}"))?;
        Ok(Self {
            base,
            http: HttpClient::builder().request_timeout(timeout).build(),
        })
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        self.base
            .join(path)
            .map_err(|e| ClientError::Network(format!("Invalid URL for '{path}': {e}")))
    }

    /// Decode a success body or turn an error response into a [`ClientError`].
    async fn read<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status
                .canonical_reason()
                .unwrap_or("Unexpected response")
                .to_string(),
        };
        tracing::debug!(status = status.as_u16(), error = %message, "Request failed");
        Err(ClientError::from_status(status.as_u16(), message))
    }
}

#[async_trait::async_trait]
impl AuthApi for HttpAuthApi {
    #[instrument(skip(self, password))]
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ClientError> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let response = self
            .http
            .inner()
            .post(self.url("/api/auth/login")?)
            .json(&body)
            .send()
            .await?;
        Self::read(response).await
    }

    #[instrument(skip(self, password))]
    async fn signup(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<SignupResponse, ClientError> {
        let body = SignupRequest {
            email: email.to_string(),
            password: password.to_string(),
            name: name.to_string(),
        };
        let response = self
            .http
            .inner()
            .post(self.url("/api/auth/signup")?)
            .json(&body)
            .send()
            .await?;
        Self::read(response).await
    }

    #[instrument(skip(self, token))]
    async fn logout(&self, token: &str) -> Result<(), ClientError> {
        let response = self
            .http
            .inner()
            .post(self.url("/api/auth/logout")?)
            .bearer_auth(token)
            .send()
            .await?;
        Self::read::<serde_json::Value>(response).await.map(|_| ())
    }

    #[instrument(skip(self, token))]
    async fn fetch_profile(&self, token: &str) -> Result<UserProfile, ClientError> {
        let response = self
            .http
            .inner()
            .get(self.url("/api/user/profile")?)
            .bearer_auth(token)
            .send()
            .await?;
        Self::read(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api(server: &MockServer) -> HttpAuthApi {
        HttpAuthApi::new(&server.uri(), Duration::from_secs(5)).unwrap()
    }

    fn profile_json() -> serde_json::Value {
        json!({"id": "u1", "display_name": "Jane", "username": "Jane", "email": "new@x.com"})
    }

    #[tokio::test]
    async fn test_login_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .and(body_json(json!({"email": "new@x.com", "password": "pw123456"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": "Login successful",
                "token": "psg-abc",
                "user": profile_json(),
            })))
            .mount(&server)
            .await;

        let resp = api(&server).login("new@x.com", "pw123456").await.unwrap();
        assert_eq!(resp.token, "psg-abc");
        assert_eq!(resp.user.display_name, "Jane");
    }

    #[tokio::test]
    async fn test_login_401_is_authentication_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/login"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({"error": "Invalid login credentials"})),
            )
            .mount(&server)
            .await;

        let err = api(&server).login("a@x.com", "nope").await.unwrap_err();
        assert!(matches!(err, ClientError::Authentication(ref m) if m == "Invalid login credentials"));
    }

    #[tokio::test]
    async fn test_signup_400_is_validation_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/signup"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({"error": "User already registered"})),
            )
            .mount(&server)
            .await;

        let err = api(&server).signup("a@x.com", "pw123456", "A").await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(ref m) if m == "User already registered"));
    }

    #[tokio::test]
    async fn test_fetch_profile_sends_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/user/profile"))
            .and(header("authorization", "Bearer psg-abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(profile_json()))
            .mount(&server)
            .await;

        let profile = api(&server).fetch_profile("psg-abc").await.unwrap();
        assert_eq!(profile.email, "new@x.com");
    }

    #[tokio::test]
    async fn test_server_error_without_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/logout"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = api(&server).logout("psg-abc").await.unwrap_err();
        assert!(matches!(err, ClientError::Server(ref m) if m == "Internal Server Error"));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let api = HttpAuthApi::new(&format!("http://{addr}"), Duration::from_secs(2)).unwrap();
        let err = api.fetch_profile("psg-abc").await.unwrap_err();
        assert!(matches!(err, ClientError::Network(_)));
    }
}
