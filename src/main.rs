//! oidc-session - OpenID Connect login sessions from the terminal
//!
#![doc = "Main entry point for the oidc-session command-line tool."]

use anyhow::Result;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use oidc_session::cli::{Cli, Commands};
use oidc_session::commands;
use oidc_session::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    init_tracing(cli.verbose, cli.json_logs);

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    let session = commands::build_session(&config).await?;

    let output = match &cli.command {
        Commands::Login { redirect_path } => {
            tracing::info!("Starting login");
            commands::login(&session, redirect_path.as_deref())?
        }
        Commands::Callback { url, code, state } => {
            commands::callback(&session, url.as_deref(), code.as_deref(), state.as_deref())
                .await?
        }
        Commands::Token => commands::token(&session).await?,
        Commands::Status => commands::status(&session)?,
        Commands::Whoami => commands::whoami(&session)?,
        Commands::Logout => commands::logout(&session)?,
        Commands::RedirectPath { clear } => commands::redirect_path(&session, *clear)?,
    };

    println!("{}", output);
    Ok(())
}

/// Initialize tracing subscriber with environment filter
///
/// Logs go to stderr so command output on stdout can be captured.
fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose {
        "oidc_session=debug"
    } else {
        "oidc_session=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
