//! oidc-session - OpenID Connect login sessions for public clients
//!
//! This library implements the client side of the OAuth2 authorization-code
//! flow with PKCE: it starts logins, exchanges the returned code for tokens,
//! persists and refreshes those tokens, and ends sessions.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `session`: PKCE, URL building, token endpoint client, token store and
//!   the session manager state machine
//! - `storage`: Key-value backends (file, OS keyring, memory)
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli` / `commands`: Command-line interface and its handlers
//!
//! # Example
//!
//! ```no_run
//! use oidc_session::{Config, SessionManager};
//! use oidc_session::session::discovery::ProviderEndpoints;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml", &Default::default())?;
//!     config.validate()?;
//!
//!     let http = reqwest::Client::new();
//!     let endpoints = ProviderEndpoints::resolve(&http, &config.oidc).await?;
//!     let session = SessionManager::builder(&config, endpoints).build()?;
//!
//!     match session.get_access_token().await {
//!         Some(_) => println!("signed in"),
//!         None => {
//!             session.login(None)?;
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod session;
pub mod storage;

// Re-export commonly used types
pub use config::Config;
pub use error::{Result, SessionError};
pub use session::{SessionManager, SessionState};
pub use storage::KeyValueStore;

#[cfg(test)]
pub mod test_utils;
