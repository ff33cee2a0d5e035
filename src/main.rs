//! Passage -- identity gateway server and session client.
//!
//! `serve` wires together:
//!   - Configuration loading
//!   - Database initialization
//!   - Identity provider + token verifier
//!   - HTTP server with CORS, request ids and tracing
//!   - Graceful shutdown on SIGTERM / SIGINT
//!
//! The client commands drive a `SessionManager` against a running server.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use passage::AppState;
use passage::config::Config;
use passage::db::Database;
use passage::identity::provider_from_config;
use passage::server::build_app;
use passage::session::storage::storage_from_config;
use passage::session::{HttpAuthApi, SessionManager};

// ---------------------------------------------------------------------------
// CLI argument parsing (minimal, no clap dependency)
// ---------------------------------------------------------------------------

enum Command {
    Serve,
    Client(ClientCommand),
}

enum ClientCommand {
    Signup {
        email: String,
        password: String,
        name: String,
    },
    Signin {
        email: String,
        password: String,
    },
    Signout,
    Whoami,
}

const DEFAULT_CONFIG_PATH: &str = "passage.toml";

struct CliArgs {
    /// Set only by `--config`.
    config_path: Option<PathBuf>,
    command: Command,
}

fn parse_args() -> CliArgs {
    match parse_args_from(std::env::args().skip(1)) {
        Ok(Some(cli)) => cli,
        Ok(None) => std::process::exit(0),
        Err(message) => {
            eprintln!("Error: {message}");
            eprintln!("Run with --help for usage information.");
            std::process::exit(1);
        }
    }
}

/// `Ok(None)` means help or version was printed.
fn parse_args_from(args: impl IntoIterator<Item = String>) -> Result<Option<CliArgs>, String> {
    let mut args = args.into_iter();
    let mut config_path = None;
    let mut positional = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = args
                    .next()
                    .ok_or_else(|| "--config requires a path argument".to_string())?;
                config_path = Some(PathBuf::from(path));
            }
            "--help" | "-h" => {
                print_usage();
                return Ok(None);
            }
            "--version" | "-V" => {
                println!("passage {}", env!("CARGO_PKG_VERSION"));
                return Ok(None);
            }
            other if other.starts_with('-') => {
                return Err(format!("Unknown argument: {other}"));
            }
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    let command = match positional.next().as_deref() {
        None | Some("serve") => Command::Serve,
        Some("signup") => {
            let (Some(email), Some(password), Some(name)) =
                (positional.next(), positional.next(), positional.next())
            else {
                return Err("signup requires <EMAIL> <PASSWORD> <NAME>".to_string());
            };
            Command::Client(ClientCommand::Signup {
                email,
                password,
                name,
            })
        }
        Some("signin") => {
            let (Some(email), Some(password)) = (positional.next(), positional.next()) else {
                return Err("signin requires <EMAIL> <PASSWORD>".to_string());
            };
            Command::Client(ClientCommand::Signin { email, password })
        }
        Some("signout") => Command::Client(ClientCommand::Signout),
        Some("whoami") => Command::Client(ClientCommand::Whoami),
        Some(other) => return Err(format!("Unknown command: {other}")),
    };

    if let Some(extra) = positional.next() {
        return Err(format!("Unexpected argument: {extra}"));
    }

    Ok(Some(CliArgs {
        config_path,
        command,
    }))
}

fn print_usage() {
    println!(
        "\
passage {version} -- identity gateway and session client

USAGE:
    passage [OPTIONS] [COMMAND]

COMMANDS:
    serve                              Run the HTTP server (default)
    signup <EMAIL> <PASSWORD> <NAME>   Create an account
    signin <EMAIL> <PASSWORD>          Sign in and persist the session token
    signout                            Sign out and delete the session token
    whoami                             Restore the persisted session and show it

OPTIONS:
    -c, --config <PATH>    Path to configuration file [default: passage.toml]
    -h, --help             Print this help message
    -V, --version          Print version information

ENVIRONMENT:
    RUST_LOG               Override log level (e.g. RUST_LOG=debug)
    PASSAGE_CONFIG         Config path used when --config is not given
",
        version = env!("CARGO_PKG_VERSION")
    );
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = parse_args();

    let config_path = resolve_config_path(cli.config_path, std::env::var("PASSAGE_CONFIG").ok());

    let config = Config::load(&config_path)?;
    init_tracing(&config);

    match cli.command {
        Command::Serve => serve(config, config_path).await,
        Command::Client(command) => run_client(config, command).await,
    }
}

/// `--config` wins over `PASSAGE_CONFIG`, which wins over the default.
fn resolve_config_path(flag: Option<PathBuf>, env: Option<String>) -> PathBuf {
    flag.or_else(|| env.filter(|v| !v.is_empty()).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

async fn serve(config: Config, config_path: PathBuf) -> anyhow::Result<()> {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        "Starting passage"
    );

    let db = Database::open(&config.database.path)?;
    tracing::info!(path = %config.database.path.display(), "Database opened");

    let provider = provider_from_config(&config.identity)?;
    tracing::info!(
        provider = provider.name(),
        verify_cache_ttl_secs = config.identity.verify_cache_ttl_secs,
        profile_insert_policy = %config.signup.profile_insert_policy,
        "Identity provider ready"
    );

    let listen_addr = config.listen_addr();
    let state = AppState::new(Arc::new(config), db, provider);
    let app = build_app(state);

    let listener = TcpListener::bind(&listen_addr).await?;
    tracing::info!(addr = %listen_addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down gracefully");
    Ok(())
}

async fn run_client(config: Config, command: ClientCommand) -> anyhow::Result<()> {
    let api = HttpAuthApi::new(&config.client.api_url, config.client.timeout())?;
    let storage = storage_from_config(&config.client)?;
    let session = SessionManager::start(Arc::new(api), storage);

    let restored = session.ready().await?;

    match command {
        ClientCommand::Signup {
            email,
            password,
            name,
        } => {
            let resp = session.sign_up(&email, &password, &name).await?;
            println!("{} ({})", resp.message, resp.user.email);
            if let Some(warning) = resp.warning {
                println!("warning: {warning}");
            }
            println!("Sign in to start a session.");
        }
        ClientCommand::Signin { email, password } => {
            let user = session.sign_in(&email, &password).await?;
            println!("Signed in as {} <{}>", user.display_name, user.email);
        }
        ClientCommand::Signout => {
            if !restored.is_authenticated() {
                println!("No active session.");
            }
            session.sign_out().await?;
            println!("Signed out.");
        }
        ClientCommand::Whoami => match restored.user {
            Some(user) => println!(
                "{} <{}> (username: {}, id: {})",
                user.display_name, user.email, user.username, user.id
            ),
            None => println!("Not signed in."),
        },
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tracing initialization
// ---------------------------------------------------------------------------

/// Set up the tracing subscriber based on configuration.
fn init_tracing(config: &Config) {
    // RUST_LOG env var takes precedence over config file
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.logging.level;
        EnvFilter::new(format!("passage={level},tower_http={level},warn"))
    });

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if config.logging.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

// ---------------------------------------------------------------------------
// Graceful shutdown
// ---------------------------------------------------------------------------

/// Wait for a shutdown signal (SIGTERM or SIGINT / Ctrl+C).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl+C)");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Option<CliArgs>, String> {
        parse_args_from(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_print_usage_does_not_panic() {
        print_usage();
    }

    #[test]
    fn test_default_is_serve() {
        let cli = parse(&[]).unwrap().unwrap();
        assert!(matches!(cli.command, Command::Serve));
        assert!(cli.config_path.is_none());
    }

    #[test]
    fn test_config_flag_and_signin() {
        let cli = parse(&["-c", "alt.toml", "signin", "a@x.com", "pw123456"])
            .unwrap()
            .unwrap();
        assert_eq!(cli.config_path, Some(PathBuf::from("alt.toml")));
        match cli.command {
            Command::Client(ClientCommand::Signin { email, password }) => {
                assert_eq!(email, "a@x.com");
                assert_eq!(password, "pw123456");
            }
            _ => panic!("expected signin"),
        }
    }

    #[test]
    fn test_signup_requires_three_arguments() {
        assert!(parse(&["signup", "a@x.com", "pw"]).is_err());
        let cli = parse(&["signup", "a@x.com", "pw123456", "Jane"])
            .unwrap()
            .unwrap();
        assert!(matches!(
            cli.command,
            Command::Client(ClientCommand::Signup { ref name, .. }) if name == "Jane"
        ));
    }

    #[test]
    fn test_config_flag_beats_environment() {
        assert_eq!(
            resolve_config_path(Some("flag.toml".into()), Some("env.toml".into())),
            PathBuf::from("flag.toml")
        );
        assert_eq!(
            resolve_config_path(None, Some("env.toml".into())),
            PathBuf::from("env.toml")
        );
        assert_eq!(
            resolve_config_path(None, Some(String::new())),
            PathBuf::from(DEFAULT_CONFIG_PATH)
        );
        assert_eq!(resolve_config_path(None, None), PathBuf::from(DEFAULT_CONFIG_PATH));
    }

    #[test]
    fn test_rejects_unknown_input() {
        assert!(parse(&["--bogus"]).is_err());
        assert!(parse(&["dance"]).is_err());
        assert!(parse(&["whoami", "extra"]).is_err());
        assert!(parse(&["--config"]).is_err());
    }
}
