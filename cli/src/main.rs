//! Command-line front-end to the session gate.
//!
//! Keeps the session in a JSON file and talks to the same API as the browser
//! client, so gate decisions and expiry handling can be exercised from a shell.

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use gatehouse::{
    ApiClient, AuthError, ConfigError, GateConfig, LoginRequest, NoopNavigator, Notice, Notifier, RequestError,
    RoutePolicy, SessionController, SessionState,
};
use serde_json::Value;

mod store;
mod transport;


use store::FileStore;
use transport::ReqwestTransport;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("no place for the credential file; pass --store or set GATEHOUSE_STORE")]
    NoStorePath,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("{path} is not accessible; the gate redirects to {target}")]
    Denied { path: String, target: String },
    #[error("password read failed: {0}")]
    Prompt(#[from] io::Error),
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "gatehouse-cli", about = "Session gate CLI for the dashboard API")]
struct Cli {
    /// API origin; overrides the environment config.
    #[arg(long, env = "GATE_API_BASE_URL")]
    api_base_url: Option<String>,

    /// Credential file (default: `~/.config/gatehouse/session.json`).
    #[arg(long, env = "GATEHOUSE_STORE")]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and persist the session.
    Login {
        #[arg(long)]
        email: String,
        /// Read from stdin when omitted.
        #[arg(long, env = "GATEHOUSE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Clear the persisted session.
    Logout,
    /// Show the current session claims (never the token).
    Status,
    /// Ask the gate whether the current session may open a dashboard path.
    Check { path: String },
    /// Authenticated GET; prints the JSON response.
    Get { path: String },
    /// Create an account (starts unapproved).
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "GATEHOUSE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Request a password reset link.
    ForgotPassword {
        #[arg(long)]
        email: String,
    },
    /// Set a new password with a reset token.
    ResetPassword {
        #[arg(long)]
        token: String,
        #[arg(long, env = "GATEHOUSE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
}

/// Reports expiry on stderr; the CLI has no banner.
struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&self, notice: Notice) {
        tracing::warn!(?notice, "session notice");
        eprintln!("{}", notice.message());
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let config = build_config(cli.api_base_url.as_deref())?;
    let store_path = cli.store.or_else(FileStore::default_path).ok_or(CliError::NoStorePath)?;
    tracing::debug!(store = %store_path.display(), api = %config.api_base_url, "starting");

    let controller = Arc::new(SessionController::new(
        config.clone(),
        Arc::new(FileStore::new(store_path)),
        Arc::new(ReqwestTransport::new(config)),
        Arc::new(NoopNavigator),
    ));
    let api = ApiClient::new(controller, Arc::new(StderrNotifier));

    run(&api, cli.command).await
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

fn build_config(api_base_url: Option<&str>) -> Result<GateConfig, CliError> {
    let config = GateConfig::from_env()?;
    match api_base_url {
        Some(url) => Ok(config.with_api_base_url(url)?),
        None => Ok(config),
    }
}

async fn run(api: &ApiClient, command: Command) -> Result<(), CliError> {
    let controller = api.controller();
    match command {
        Command::Login { email, password } => {
            let password = password_or_stdin(password)?;
            let state = controller.login(&LoginRequest::new(email, password)).await?;
            print_json(&session_summary(&state, controller.landing(&state)))
        }
        Command::Logout => {
            controller.logout();
            println!("logged out");
            Ok(())
        }
        Command::Status => {
            let state = controller.current();
            print_json(&session_summary(&state, controller.landing(&state)))
        }
        Command::Check { path } => {
            let state = controller.current();
            match check_path(&RoutePolicy::default(), &state, controller.routes(), &path) {
                Ok(()) => {
                    println!("allow");
                    Ok(())
                }
                Err(target) => Err(CliError::Denied { path, target }),
            }
        }
        Command::Get { path } => {
            let body: Value = api.get_json(&path).await?;
            print_json(&body)
        }
        Command::Register { name, email, password } => {
            let password = password_or_stdin(password)?;
            api.register(&name, &email, &password).await?;
            println!("registered; an administrator must approve the account before it can be used");
            Ok(())
        }
        Command::ForgotPassword { email } => {
            api.forgot_password(&email).await?;
            println!("if the address has an account, a reset link has been sent");
            Ok(())
        }
        Command::ResetPassword { token, password } => {
            let password = password_or_stdin(password)?;
            api.reset_password(&token, &password).await?;
            println!("password updated");
            Ok(())
        }
    }
}

/// `Ok` when the gate allows `path`, else the redirect target.
fn check_path(
    policy: &RoutePolicy,
    state: &SessionState,
    routes: &gatehouse::RoutePaths,
    path: &str,
) -> Result<(), String> {
    match policy.check(state, path).redirect_target(routes) {
        None => Ok(()),
        Some(target) => Err(target.to_owned()),
    }
}

fn session_summary(state: &SessionState, landing: &str) -> Value {
    serde_json::json!({
        "authenticated": state.is_authenticated(),
        "email": state.email(),
        "isAdmin": state.is_admin(),
        "isApproved": state.is_approved(),
        "landing": landing,
    })
}

fn password_or_stdin(password: Option<String>) -> Result<String, CliError> {
    match password {
        Some(password) => Ok(password),
        None => {
            eprint!("password: ");
            Ok(read_password_line(io::stdin().lock())?)
        }
    }
}

fn read_password_line(mut reader: impl BufRead) -> io::Result<String> {
    let mut line = String::new();
    reader.read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_owned())
}

fn print_json(value: &Value) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
