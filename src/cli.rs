//! Command-line interface definition for oidc-session
//!
//! Each invocation is one "page load" of the session: it reads the persisted
//! state, performs a single operation, and exits. State carries over between
//! invocations through the configured storage backend.

use clap::{Parser, Subcommand, ValueEnum};

/// oidc-session - OpenID Connect login sessions from the terminal
///
/// Signs in with an OIDC provider using the authorization-code flow with
/// PKCE, keeps the tokens in local storage, and refreshes them on demand.
#[derive(Parser, Debug, Clone)]
#[command(name = "oidc-session")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Override `oidc.authority`
    #[arg(long, global = true)]
    pub authority: Option<String>,

    /// Override `oidc.client_id`
    #[arg(long, global = true)]
    pub client_id: Option<String>,

    /// Override `storage.backend`
    #[arg(long, value_enum, global = true)]
    pub storage: Option<StorageArg>,

    /// Override `storage.path` (file backend only)
    #[arg(long, global = true)]
    pub storage_path: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Storage backends selectable on the command line
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageArg {
    File,
    Keyring,
    Memory,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start a login: print (and open) the provider's authorization URL
    Login {
        /// Path to return to once the login completes
        #[arg(short, long)]
        redirect_path: Option<String>,
    },

    /// Complete a login with the provider's redirect
    Callback {
        /// Full redirect URL the provider sent the browser to
        #[arg(long, conflicts_with_all = ["code", "state"])]
        url: Option<String>,

        /// Authorization code from the redirect
        #[arg(long, requires = "state")]
        code: Option<String>,

        /// `state` value from the redirect
        #[arg(long, requires = "code")]
        state: Option<String>,
    },

    /// Print a valid access token, refreshing it if needed
    Token,

    /// Show whether a session exists and when it expires
    Status,

    /// Show the (unverified) identity claims of the signed-in user
    Whoami,

    /// End the session and print the provider logout URL
    Logout,

    /// Show or clear the stored post-login redirect path
    RedirectPath {
        /// Remove the stored path instead of printing it
        #[arg(long)]
        clear: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            json_logs: false,
            authority: None,
            client_id: None,
            storage: None,
            storage_path: None,
            command: Commands::Status,
        }
    }
}
