//! ShareView Daemon
//!
//! Command-line front end for authenticated directory browsing.

use std::io::Read;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use daemon::auth::AuthenticationService;
use daemon::browse::BrowseService;
use daemon::config::Config;
use protocol::{AuthOutcome, Credentials, PublicError};

/// ShareView - authenticated directory browsing for a NAS share.
#[derive(Parser, Debug)]
#[command(name = "shareview")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Authenticate a user and print their identity
    Login {
        /// Username to authenticate (password is read from stdin)
        username: String,
    },

    /// List a directory as an authenticated user
    List {
        /// Path to list, relative to the configured root
        #[arg(default_value = "")]
        path: String,

        /// Username to authenticate as (password is read from stdin)
        #[arg(long, short)]
        user: String,
    },

    /// Print the usernames eligible to log in
    Users,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Configuration first: the effective log level comes from it (or
    // its SHAREVIEW_LOG_LEVEL override), with --verbose taking
    // precedence over both.
    let mut config = if let Some(config_path) = &cli.config {
        Config::load(config_path)?
    } else {
        Config::load_default()?
    };
    config.apply_env_overrides();
    config.validate()?;

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose, &config.daemon.log_level))
        .init();

    if let Some(config_path) = &cli.config {
        tracing::debug!("Using config file: {:?}", config_path);
    }

    match cli.command {
        Commands::Login { username } => {
            let auth = AuthenticationService::from_config(&config.auth)?;
            let credentials = Credentials {
                username,
                secret: read_secret()?,
            };

            match auth.authenticate(&credentials).await {
                AuthOutcome::Authenticated(identity) => {
                    println!("{}", serde_json::to_string_pretty(&identity)?);
                }
                outcome => fail(outcome_error(&outcome)),
            }
        }
        Commands::List { path, user } => {
            let auth = AuthenticationService::from_config(&config.auth)?;
            let browse = BrowseService::new(&config.browse)?;
            let credentials = Credentials {
                username: user,
                secret: read_secret()?,
            };

            let identity = match auth.authenticate(&credentials).await {
                AuthOutcome::Authenticated(identity) => identity,
                outcome => fail(outcome_error(&outcome)),
            };

            match browse.browse(&identity, &path) {
                Ok(listing) => {
                    println!("{}", serde_json::to_string_pretty(&listing.to_response())?);
                }
                Err(e) => {
                    tracing::error!("browse failed: {}", e);
                    fail(e.public());
                }
            }
        }
        Commands::Users => {
            let auth = AuthenticationService::from_config(&config.auth)?;
            for username in auth.known_users()? {
                println!("{}", username);
            }
        }
    }

    Ok(())
}

/// Effective log filter: `--verbose` forces debug, otherwise the
/// configured level applies.
fn log_filter(verbose: bool, configured: &str) -> String {
    if verbose {
        "debug".to_string()
    } else {
        configured.to_lowercase()
    }
}

/// Read the password from stdin, stripping one trailing newline.
fn read_secret() -> anyhow::Result<String> {
    let mut secret = String::new();
    std::io::stdin().read_to_string(&mut secret)?;
    if secret.ends_with('\n') {
        secret.pop();
        if secret.ends_with('\r') {
            secret.pop();
        }
    }
    Ok(secret)
}

/// The external error class for a non-authenticated outcome.
fn outcome_error(outcome: &AuthOutcome) -> PublicError {
    outcome
        .public_error()
        .unwrap_or(PublicError::InvalidCredentials)
}

/// Print an error response and exit non-zero.
fn fail(error: PublicError) -> ! {
    match serde_json::to_string_pretty(&error.to_response()) {
        Ok(body) => eprintln!("{}", body),
        Err(_) => eprintln!("{}", error),
    }
    std::process::exit(1);
}
