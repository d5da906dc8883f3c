//! Learning Hub CLI - sign in to Learning Hub from a terminal.
//!
//! The terminal stands in for the browser: `login` prints the consent page
//! URL instead of navigating to it, and `callback` takes the URL the
//! provider redirected to as if the application had just been loaded there.

use std::io;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use learnhub_core::{AuthError, AuthState, Config, SessionManager, StaticNavigator, StoreKind};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use url::Url;

/// Log file name prefix in the cache directory
const LOG_FILE: &str = "learnhub.log";

#[derive(Parser)]
#[command(name = "learnhub", version, about = "Sign in to Learning Hub from the terminal")]
struct Cli {
    /// Identity provider base URL (overrides config and LEARNHUB_API_URL)
    #[arg(long, global = true)]
    api_url: Option<Url>,

    /// Where to keep the session: file, keyring or memory
    #[arg(long, global = true)]
    store: Option<StoreKind>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Request a Google sign-in URL
    Login,
    /// Finish signing in with the URL the browser was redirected to
    Callback {
        /// Full redirect URL, including its query string
        url: Url,
    },
    /// Show who is signed in
    Status {
        /// Print the session view as JSON
        #[arg(long)]
        json: bool,
    },
    /// Re-fetch the signed-in user's profile
    Refresh,
    /// Sign out and forget the stored session
    Logout,
}

/// Initialize the tracing subscriber for logging
fn init_tracing(verbose: bool, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let (file_layer, guard) = match log_dir {
        Some(dir) if std::fs::create_dir_all(dir).is_ok() => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let (mut config, config_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    let log_dir = config.cache_dir().ok().map(|dir| dir.join("logs"));
    let _guard = init_tracing(cli.verbose, log_dir.as_deref());
    if let Some(e) = config_error {
        warn!(error = %e, "Failed to load config, using defaults");
    }

    config.apply_env()?;
    if let Some(api_url) = cli.api_url {
        config.api_url = api_url;
    }
    if let Some(store) = cli.store {
        config.store = store;
    }
    info!(api_url = %config.api_url, store = %config.store, "Learning Hub CLI starting");

    let landing = match cli.command {
        Command::Callback { ref url } => url.clone(),
        _ => config.app_url.clone(),
    };
    let navigator = Arc::new(StaticNavigator::new(landing));
    let manager = SessionManager::new(
        config.identity_client()?,
        config.client_store()?,
        navigator.clone(),
    )
    .with_direct_grant(config.accept_direct_grant);

    let initialized = manager.initialize().await;

    match cli.command {
        Command::Login => {
            surface(&manager, initialized)?;
            if let Some(user) = manager.user() {
                println!("Already signed in as {}.", user.display_name());
                return Ok(());
            }
            surface(&manager, manager.login().await)?;
            if let Some(url) = navigator.last_redirect() {
                println!("Open this URL in a browser to sign in:\n\n  {}\n", url);
                println!("Then run `learnhub callback '<redirect URL>'` with the address you land on.");
            }
        }
        Command::Callback { .. } => {
            surface(&manager, initialized)?;
            print_status(&manager.state());
        }
        Command::Status { json } => {
            if let Err(e) = initialized {
                warn!(error = %e, "Initialization reported an error");
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&manager.view())?);
            } else {
                print_status(&manager.state());
            }
        }
        Command::Refresh => {
            surface(&manager, initialized)?;
            if !manager.is_authenticated() {
                println!("Not signed in.");
                return Ok(());
            }
            surface(&manager, manager.refresh().await)?;
            print_status(&manager.state());
        }
        Command::Logout => {
            manager.logout();
            println!("Signed out.");
        }
    }

    manager.teardown();
    Ok(())
}

/// Turn a manager failure into the message the manager recorded for the UI.
fn surface<T>(manager: &SessionManager, result: Result<T, AuthError>) -> Result<T> {
    result.map_err(|e| anyhow::anyhow!(manager.error().unwrap_or_else(|| e.user_message())))
}

fn print_status(state: &AuthState) {
    let Some(session) = state.session.as_ref() else {
        println!("Not signed in.");
        return;
    };
    let user = &session.user;
    if user.email.is_empty() {
        println!("Signed in as {} ({}).", user.display_name(), user.id);
    } else {
        println!("Signed in as {} <{}>.", user.display_name(), user.email);
    }
    if !user.verified_email {
        println!("Email address is not verified.");
    }
    if let Some(minutes) = session.minutes_until_expiry() {
        println!("Access token expires in {} minutes.", minutes);
    }
}
