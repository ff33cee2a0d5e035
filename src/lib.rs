pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod net;
pub mod profiles;
pub mod server;
pub mod session;

use crate::config::Config;
use crate::db::Database;
use crate::gateway::IdentityGateway;
use crate::identity::{IdentityProvider, TokenVerifier};

use std::sync::Arc;

/// Shared application state accessible from all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub gateway: IdentityGateway,
    pub verifier: Arc<TokenVerifier>,
}

impl AppState {
    /// Wire the gateway and token verifier around one identity provider.
    pub fn new(config: Arc<Config>, db: Database, provider: Arc<dyn IdentityProvider>) -> Self {
        let verifier = Arc::new(TokenVerifier::new(
            provider.clone(),
            config.identity.verify_cache_ttl(),
        ));
        let gateway = IdentityGateway::new(
            provider,
            verifier.clone(),
            db,
            config.signup.profile_insert_policy,
        );
        Self {
            config,
            gateway,
            verifier,
        }
    }
}
