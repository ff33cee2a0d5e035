/// Errors surfaced to callers of the client API and the session manager.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The server refused the input (400).
    #[error("{0}")]
    Validation(String),

    /// Bad credentials or an invalid token (401).
    #[error("{0}")]
    Authentication(String),

    #[error("{0}")]
    NotFound(String),

    /// The server failed (5xx) or answered with something unreadable.
    #[error("{0}")]
    Server(String),

    /// The server could not be reached.
    #[error("Network error: {0}")]
    Network(String),

    /// The session actor is gone.
    #[error("Session manager is not running")]
    Closed,
}

impl ClientError {
    /// Map a non-success response status and its error message.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            400 => Self::Validation(message),
            401 | 403 => Self::Authentication(message),
            404 => Self::NotFound(message),
            _ => Self::Server(message),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Server(format!("Malformed server response: {err}"))
        } else {
            Self::Network(err.to_string())
        }
    }
}
