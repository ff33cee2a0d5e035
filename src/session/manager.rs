//! Client session state machine.
//!
//! ```text
//! Uninitialized -> Restoring -> Authenticated <-> Unauthenticated
//! ```
//!
//! A single actor task owns the state. [`SessionManager`] handles send it
//! commands and read the state through a watch channel, so commands apply in
//! arrival order and a command sent during restoration waits for it.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};

use super::api::AuthApi;
use super::error::ClientError;
use super::storage::{TOKEN_KEY, TokenStorage};
use crate::api::types::SignupResponse;
use crate::profiles::UserProfile;

const COMMAND_BUFFER: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Uninitialized,
    Restoring,
    Authenticated,
    Unauthenticated,
}

/// Snapshot of the client session as the UI sees it.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthState {
    pub status: SessionStatus,
    pub user: Option<UserProfile>,
    pub token: Option<String>,
}

impl AuthState {
    fn initial() -> Self {
        Self {
            status: SessionStatus::Uninitialized,
            user: None,
            token: None,
        }
    }

    fn signed_out() -> Self {
        Self {
            status: SessionStatus::Unauthenticated,
            user: None,
            token: None,
        }
    }

    fn signed_in(user: UserProfile, token: String) -> Self {
        Self {
            status: SessionStatus::Authenticated,
            user: Some(user),
            token: Some(token),
        }
    }

    /// True until the one restoration attempt has finished.
    pub fn loading(&self) -> bool {
        matches!(
            self.status,
            SessionStatus::Uninitialized | SessionStatus::Restoring
        )
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthState")
            .field("status", &self.status)
            .field("user", &self.user)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

enum Command {
    SignIn {
        email: String,
        password: String,
        reply: oneshot::Sender<Result<UserProfile, ClientError>>,
    },
    SignUp {
        email: String,
        password: String,
        name: String,
        reply: oneshot::Sender<Result<SignupResponse, ClientError>>,
    },
    SignOut {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to the session actor. Cheap to clone; the actor stops once every
/// handle is dropped.
#[derive(Clone)]
pub struct SessionManager {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<AuthState>,
}

impl SessionManager {
    /// Spawn the session actor. Its first act is restoring a persisted
    /// session; nothing else ever triggers restoration.
    pub fn start(api: Arc<dyn AuthApi>, storage: Arc<dyn TokenStorage>) -> Self {
        let (state_tx, state_rx) = watch::channel(AuthState::initial());
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);

        let actor = SessionActor {
            api,
            storage,
            state: state_tx,
            commands: command_rx,
        };
        tokio::spawn(actor.run());

        Self {
            commands: command_tx,
            state: state_rx,
        }
    }

    /// Current state.
    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.clone()
    }

    /// Wait until restoration has finished and return the resulting state.
    pub async fn ready(&self) -> Result<AuthState, ClientError> {
        let mut rx = self.state.clone();
        let state = rx
            .wait_for(|state| !state.loading())
            .await
            .map_err(|_| ClientError::Closed)?;
        Ok(state.clone())
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<UserProfile, ClientError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::SignIn {
            email: email.to_string(),
            password: password.to_string(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| ClientError::Closed)?
    }

    /// Create an account. Does not sign in.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<SignupResponse, ClientError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::SignUp {
            email: email.to_string(),
            password: password.to_string(),
            name: name.to_string(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| ClientError::Closed)?
    }

    /// Sign out. The local session is cleared before the server-side logout
    /// is attempted, and that logout's outcome is only logged.
    pub async fn sign_out(&self) -> Result<(), ClientError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::SignOut { reply }).await?;
        rx.await.map_err(|_| ClientError::Closed)
    }

    async fn send(&self, command: Command) -> Result<(), ClientError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ClientError::Closed)
    }
}

struct SessionActor {
    api: Arc<dyn AuthApi>,
    storage: Arc<dyn TokenStorage>,
    state: watch::Sender<AuthState>,
    commands: mpsc::Receiver<Command>,
}

impl SessionActor {
    async fn run(mut self) {
        self.restore().await;

        while let Some(command) = self.commands.recv().await {
            match command {
                Command::SignIn {
                    email,
                    password,
                    reply,
                } => {
                    let result = self.sign_in(&email, &password).await;
                    let _ = reply.send(result);
                }
                Command::SignUp {
                    email,
                    password,
                    name,
                    reply,
                } => {
                    let result = self.api.signup(&email, &password, &name).await;
                    if let Err(err) = &result {
                        tracing::info!(error = %err, "Signup failed");
                    }
                    let _ = reply.send(result);
                }
                Command::SignOut { reply } => self.sign_out(reply).await,
            }
        }

        tracing::debug!("Session manager stopped");
    }

    fn set(&self, state: AuthState) {
        tracing::debug!(status = ?state.status, "Session state changed");
        self.state.send_replace(state);
    }

    async fn restore(&self) {
        self.set(AuthState {
            status: SessionStatus::Restoring,
            ..AuthState::initial()
        });

        let token = match self.storage.load(TOKEN_KEY) {
            Ok(token) => token,
            Err(err) => {
                tracing::warn!(error = %err, backend = self.storage.name(), "Failed to read persisted token");
                None
            }
        };

        let Some(token) = token else {
            tracing::debug!("No persisted session");
            self.set(AuthState::signed_out());
            return;
        };

        match self.api.fetch_profile(&token).await {
            Ok(user) => {
                tracing::info!(user_id = %user.id, "Session restored");
                self.set(AuthState::signed_in(user, token));
            }
            Err(err) => {
                tracing::info!(error = %err, "Persisted session rejected; discarding token");
                self.discard_token();
                self.set(AuthState::signed_out());
            }
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<UserProfile, ClientError> {
        let response = self.api.login(email, password).await.map_err(|err| {
            tracing::info!(error = %err, "Sign-in failed");
            err
        })?;

        if let Err(err) = self.storage.save(TOKEN_KEY, &response.token) {
            tracing::warn!(
                error = %err,
                backend = self.storage.name(),
                "Failed to persist token; session will not survive a restart"
            );
        }

        tracing::info!(user_id = %response.user.id, "Signed in");
        self.set(AuthState::signed_in(response.user.clone(), response.token));
        Ok(response.user)
    }

    async fn sign_out(&self, reply: oneshot::Sender<()>) {
        let token = self.state.borrow().token.clone();

        self.set(AuthState::signed_out());
        self.discard_token();

        if let Some(token) = token {
            match self.api.logout(&token).await {
                Ok(()) => tracing::info!("Signed out"),
                Err(err) => tracing::warn!(error = %err, "Server-side logout failed"),
            }
        }
        let _ = reply.send(());
    }

    fn discard_token(&self) {
        if let Err(err) = self.storage.remove(TOKEN_KEY) {
            tracing::warn!(error = %err, backend = self.storage.name(), "Failed to delete persisted token");
        }
    }
}
