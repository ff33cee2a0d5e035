use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Environment override tracking
// ---------------------------------------------------------------------------

/// Tracks which configuration settings are overridden by environment variables.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    overrides: HashMap<String, String>,
}

impl EnvOverrides {
    /// Check whether a setting key (e.g. "server.host") is overridden by an env var.
    pub fn is_overridden(&self, key: &str) -> bool {
        self.overrides.contains_key(key)
    }

    /// Get the env var name that overrides the given setting key.
    pub fn env_var_for(&self, key: &str) -> Option<&str> {
        self.overrides.get(key).map(String::as_str)
    }

    pub fn all(&self) -> &HashMap<String, String> {
        &self.overrides
    }

    fn record(&mut self, key: &str, env_var: &str) {
        self.overrides.insert(key.to_string(), env_var.to_string());
    }
}

// ---------------------------------------------------------------------------
// Main configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub signup: SignupConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Env var overrides are not serialized to TOML.
    #[serde(skip)]
    pub env_overrides: EnvOverrides,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Identity provider connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IdentityConfig {
    #[serde(default)]
    pub backend: IdentityBackend,
    /// Base URL of the provider (the `/auth/v1/...` paths are appended).
    #[serde(default = "default_identity_url")]
    pub url: String,
    /// Project API key sent as the `apikey` header on every provider call.
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// How long a verified token may be trusted without asking the provider
    /// again. Zero disables the cache and every protected request is verified.
    #[serde(default)]
    pub verify_cache_ttl_secs: u64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            backend: IdentityBackend::default(),
            url: default_identity_url(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            verify_cache_ttl_secs: 0,
        }
    }
}

impl IdentityConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn verify_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.verify_cache_ttl_secs)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IdentityBackend {
    #[default]
    Http,
    Memory,
}

impl std::fmt::Display for IdentityBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

impl FromStr for IdentityBackend {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "memory" => Ok(Self::Memory),
            _ => Err(format!("Unknown identity backend: {s}")),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct SignupConfig {
    #[serde(default)]
    pub profile_insert_policy: ProfileInsertPolicy,
}

/// What signup does when the identity was created but the profile insert
/// failed. The identity is never rolled back.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProfileInsertPolicy {
    /// Log the failure and report plain success.
    #[default]
    Log,
    /// Report success with a warning in the response body.
    Degraded,
    /// Report an upstream inconsistency (500).
    Fail,
}

impl std::fmt::Display for ProfileInsertPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Log => write!(f, "log"),
            Self::Degraded => write!(f, "degraded"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

impl FromStr for ProfileInsertPolicy {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "log" => Ok(Self::Log),
            "degraded" => Ok(Self::Degraded),
            "fail" => Ok(Self::Fail),
            _ => Err(format!("Unknown profile insert policy: {s}")),
        }
    }
}

/// Settings for the client-side session commands.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_storage_backend")]
    pub storage_backend: StorageBackend,
    #[serde(default = "default_token_storage_dir")]
    pub token_storage_dir: PathBuf,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            storage_backend: default_storage_backend(),
            token_storage_dir: default_token_storage_dir(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    File,
    Keyring,
    Memory,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Keyring => write!(f, "keyring"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

impl FromStr for StorageBackend {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "file" => Ok(Self::File),
            "keyring" => Ok(Self::Keyring),
            "memory" => Ok(Self::Memory),
            _ => Err(format!("Unknown storage backend: {s}")),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

const fn default_port() -> u16 {
    4000
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_db_path() -> PathBuf {
    PathBuf::from("passage.db")
}
fn default_identity_url() -> String {
    "http://127.0.0.1:9999".to_string()
}
const fn default_timeout_secs() -> u64 {
    30
}
fn default_api_url() -> String {
    "http://127.0.0.1:4000".to_string()
}
fn default_token_storage_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("passage")
}
fn default_storage_backend() -> StorageBackend {
    StorageBackend::File
}
fn default_log_level() -> String {
    "info".to_string()
}

// ---------------------------------------------------------------------------
// Config loading and env overrides
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a TOML file, then apply environment variable
    /// overrides. Any setting prefixed with `PASSAGE_` takes precedence over
    /// the file value and is tracked in `env_overrides`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            config
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    fn apply_env_overrides(&mut self) {
        let mut ov = EnvOverrides::default();

        macro_rules! env_str {
            ($key:expr, $env:expr, $field:expr) => {
                if let Ok(val) = std::env::var($env) {
                    $field = val;
                    ov.record($key, $env);
                }
            };
        }
        macro_rules! env_bool {
            ($key:expr, $env:expr, $field:expr) => {
                if let Ok(val) = std::env::var($env) {
                    $field = matches!(val.to_lowercase().as_str(), "1" | "true" | "yes" | "on");
                    ov.record($key, $env);
                }
            };
        }
        macro_rules! env_parse {
            ($key:expr, $env:expr, $field:expr) => {
                if let Ok(val) = std::env::var($env) {
                    if let Ok(parsed) = val.parse() {
                        $field = parsed;
                        ov.record($key, $env);
                    }
                }
            };
        }
        macro_rules! env_path {
            ($key:expr, $env:expr, $field:expr) => {
                if let Ok(val) = std::env::var($env) {
                    $field = PathBuf::from(val);
                    ov.record($key, $env);
                }
            };
        }
        macro_rules! env_opt_str {
            ($key:expr, $env:expr, $field:expr) => {
                if let Ok(val) = std::env::var($env) {
                    $field = if val.is_empty() { None } else { Some(val) };
                    ov.record($key, $env);
                }
            };
        }

        // -- Server --
        env_str!("server.host", "PASSAGE_SERVER_HOST", self.server.host);
        env_parse!("server.port", "PASSAGE_SERVER_PORT", self.server.port);
        if let Ok(val) = std::env::var("PASSAGE_SERVER_CORS_ORIGINS") {
            self.server.cors_origins = val
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            ov.record("server.cors_origins", "PASSAGE_SERVER_CORS_ORIGINS");
        }

        // -- Database --
        env_path!("database.path", "PASSAGE_DATABASE_PATH", self.database.path);

        // -- Identity provider --
        env_parse!(
            "identity.backend",
            "PASSAGE_IDENTITY_BACKEND",
            self.identity.backend
        );
        env_str!("identity.url", "PASSAGE_IDENTITY_URL", self.identity.url);
        env_opt_str!(
            "identity.api_key",
            "PASSAGE_IDENTITY_API_KEY",
            self.identity.api_key
        );
        env_parse!(
            "identity.timeout_secs",
            "PASSAGE_IDENTITY_TIMEOUT",
            self.identity.timeout_secs
        );
        env_parse!(
            "identity.verify_cache_ttl_secs",
            "PASSAGE_IDENTITY_VERIFY_CACHE_TTL",
            self.identity.verify_cache_ttl_secs
        );

        // -- Signup --
        env_parse!(
            "signup.profile_insert_policy",
            "PASSAGE_SIGNUP_PROFILE_POLICY",
            self.signup.profile_insert_policy
        );

        // -- Client --
        env_str!("client.api_url", "PASSAGE_CLIENT_API_URL", self.client.api_url);
        env_parse!(
            "client.storage_backend",
            "PASSAGE_CLIENT_STORAGE_BACKEND",
            self.client.storage_backend
        );
        env_path!(
            "client.token_storage_dir",
            "PASSAGE_CLIENT_TOKEN_DIR",
            self.client.token_storage_dir
        );
        env_parse!(
            "client.timeout_secs",
            "PASSAGE_CLIENT_TIMEOUT",
            self.client.timeout_secs
        );

        // -- Logging --
        env_str!("logging.level", "PASSAGE_LOG_LEVEL", self.logging.level);
        env_bool!("logging.json", "PASSAGE_LOG_JSON", self.logging.json);

        self.env_overrides = ov;
    }
}

// Helper for default token storage directory
mod dirs {
    use std::path::PathBuf;

    pub fn data_local_dir() -> Option<PathBuf> {
        std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".local").join("share"))
            })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
