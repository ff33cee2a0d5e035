use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use passage::AppState;
use passage::config::Config;
use passage::db::Database;
use passage::identity::MemoryIdentityProvider;
use passage::server::build_app;
use passage::session::storage::MemoryTokenStorage;
use passage::session::{HttpAuthApi, SessionManager};

pub struct TestServer {
    pub addr: SocketAddr,
    pub provider: Arc<MemoryIdentityProvider>,
    pub db: Database,
}

impl TestServer {
    /// Serve the full application on an ephemeral port with an in-memory
    /// store and identity provider.
    pub async fn start(config: Config) -> Self {
        let provider = Arc::new(MemoryIdentityProvider::new());
        let db = Database::open_in_memory().unwrap();
        let state = AppState::new(Arc::new(config), db.clone(), provider.clone());
        let app = build_app(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, provider, db }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub fn api(&self) -> HttpAuthApi {
        HttpAuthApi::new(&format!("http://{}", self.addr), Duration::from_secs(5)).unwrap()
    }

    /// A fresh client session against this server, sharing `storage`.
    pub fn session(&self, storage: &MemoryTokenStorage) -> SessionManager {
        SessionManager::start(Arc::new(self.api()), Arc::new(storage.clone()))
    }
}
