//! Wire types of the REST surface, shared by the handlers and the client.

use serde::{Deserialize, Serialize};

use crate::identity::Identity;
use crate::profiles::UserProfile;

pub const LOGIN_SUCCESS: &str = "Login successful";
pub const SIGNUP_SUCCESS: &str = "Signup successful.";
pub const LOGOUT_SUCCESS: &str = "Logout successful";
pub const API_RUNNING: &str = "API is running";

/// Body of `POST /api/auth/login`. Absent fields decode as empty strings so
/// the handler reports them as missing.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Body of `POST /api/auth/signup`.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl std::fmt::Debug for SignupRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignupRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    pub user: UserProfile,
}

impl std::fmt::Debug for LoginResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginResponse")
            .field("message", &self.message)
            .field("token", &"<redacted>")
            .field("user", &self.user)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupResponse {
    pub message: String,
    pub user: Identity,
    /// Present only under the `degraded` insert policy when the profile
    /// could not be stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

/// `{"error": "..."}`, as rendered by `AppError`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_request_missing_fields_default_empty() {
        let req: LoginRequest = serde_json::from_str("{}").unwrap();
        assert!(req.email.is_empty());
        assert!(req.password.is_empty());
    }

    #[test]
    fn test_request_debug_redacts_password() {
        let req = SignupRequest {
            email: "a@x.com".into(),
            password: "hunter22".into(),
            name: "A".into(),
        };
        let debug = format!("{req:?}");
        assert!(debug.contains("a@x.com"));
        assert!(!debug.contains("hunter22"));
    }

    #[test]
    fn test_signup_response_omits_absent_warning() {
        let resp = SignupResponse {
            message: SIGNUP_SUCCESS.into(),
            user: Identity {
                id: "u1".into(),
                email: "a@x.com".into(),
                created_at: None,
            },
            warning: None,
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json.get("warning").is_none());
        assert_eq!(json["user"]["id"], "u1");
    }
}
