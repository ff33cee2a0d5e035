//! Client-resident session handling: secure token storage, the HTTP client
//! for the REST surface, and the [`SessionManager`] state machine that ties
//! them together.

pub mod api;
pub mod error;
pub mod manager;
pub mod storage;

pub use api::{AuthApi, HttpAuthApi};
pub use error::ClientError;
pub use manager::{AuthState, SessionManager, SessionStatus};
pub use storage::{StorageError, TOKEN_KEY, TokenStorage};
