//! Configuration management for oidc-session
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.
//!
//! Precedence, lowest to highest: built-in defaults, the YAML file,
//! `OIDC_SESSION_*` environment variables, command-line flags.

use crate::cli::{Cli, StorageArg};
use crate::error::{Result, SessionError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Identity provider and client registration
    #[serde(default)]
    pub oidc: OidcConfig,
    /// Session behaviour
    #[serde(default)]
    pub session: SessionConfig,
    /// Where session state is persisted
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Identity provider settings
///
/// Endpoint paths are appended to `authority`. The defaults are the generic
/// `/authorize`, `/token` and `/end_session`; Zitadel uses
/// `/oauth/v2/authorize`, `/oauth/v2/token` and `/oidc/v1/end_session`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OidcConfig {
    /// Issuer base URL, e.g. `https://auth.example.com`
    #[serde(default)]
    pub authority: String,

    /// Public client identifier registered with the provider
    #[serde(default)]
    pub client_id: String,

    /// Callback URL registered for this client
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,

    /// Where the provider sends the user after RP-initiated logout
    #[serde(default = "default_post_logout_redirect_uri")]
    pub post_logout_redirect_uri: String,

    /// Space-separated scopes; `offline_access` asks for a refresh token
    #[serde(default = "default_scope")]
    pub scope: String,

    #[serde(default = "default_authorize_path")]
    pub authorize_path: String,

    #[serde(default = "default_token_path")]
    pub token_path: String,

    #[serde(default = "default_end_session_path")]
    pub end_session_path: String,

    /// Resolve endpoints from `/.well-known/openid-configuration` instead
    /// of the configured paths
    #[serde(default)]
    pub discovery: bool,
}

fn default_redirect_uri() -> String {
    "http://localhost:3000/auth/callback".to_string()
}

fn default_post_logout_redirect_uri() -> String {
    "http://localhost:3000".to_string()
}

fn default_scope() -> String {
    "openid profile email offline_access".to_string()
}

fn default_authorize_path() -> String {
    "/authorize".to_string()
}

fn default_token_path() -> String {
    "/token".to_string()
}

fn default_end_session_path() -> String {
    "/end_session".to_string()
}

impl Default for OidcConfig {
    fn default() -> Self {
        Self {
            authority: String::new(),
            client_id: String::new(),
            redirect_uri: default_redirect_uri(),
            post_logout_redirect_uri: default_post_logout_redirect_uri(),
            scope: default_scope(),
            authorize_path: default_authorize_path(),
            token_path: default_token_path(),
            end_session_path: default_end_session_path(),
            discovery: false,
        }
    }
}

impl OidcConfig {
    /// Joins `authority` and an endpoint `path` into an absolute URL.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Url` if the result is not a valid URL.
    ///
    /// # Examples
    ///
    /// ```
    /// use oidc_session::config::OidcConfig;
    ///
    /// let oidc = OidcConfig {
    ///     authority: "https://auth.example.com/".to_string(),
    ///     ..OidcConfig::default()
    /// };
    /// let url = oidc.endpoint("/oauth/v2/token").unwrap();
    /// assert_eq!(url.as_str(), "https://auth.example.com/oauth/v2/token");
    /// ```
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let base = self.authority.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        let url = Url::parse(&format!("{}/{}", base, path)).map_err(SessionError::Url)?;
        Ok(url)
    }
}

/// Session behaviour settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Refresh the access token once fewer than this many seconds remain
    #[serde(default = "default_refresh_leeway_seconds")]
    pub refresh_leeway_seconds: u64,

    /// Where logout navigates when there is no id token to end a provider session
    #[serde(default = "default_app_root")]
    pub app_root: String,

    /// Timeout for token and discovery requests
    #[serde(default = "default_http_timeout_seconds")]
    pub http_timeout_seconds: u64,
}

fn default_refresh_leeway_seconds() -> u64 {
    300
}

fn default_app_root() -> String {
    "/".to_string()
}

fn default_http_timeout_seconds() -> u64 {
    30
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_leeway_seconds: default_refresh_leeway_seconds(),
            app_root: default_app_root(),
            http_timeout_seconds: default_http_timeout_seconds(),
        }
    }
}

/// Storage backend kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// JSON file in the platform data directory
    #[default]
    File,
    /// OS credential store
    Keyring,
    /// Process memory only
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = SessionError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "file" => Ok(Self::File),
            "keyring" => Ok(Self::Keyring),
            "memory" => Ok(Self::Memory),
            other => Err(SessionError::Config(format!(
                "Invalid storage backend: {}. Must be one of: file, keyring, memory",
                other
            ))),
        }
    }
}

impl From<StorageArg> for StorageBackend {
    fn from(arg: StorageArg) -> Self {
        match arg {
            StorageArg::File => Self::File,
            StorageArg::Keyring => Self::Keyring,
            StorageArg::Memory => Self::Memory,
        }
    }
}

/// Storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Prefix of every storage key (`{namespace}_auth_state`, ...)
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Session file for the `file` backend; defaults to the platform data dir
    #[serde(default)]
    pub path: Option<String>,
}

fn default_namespace() -> String {
    "refract".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            namespace: default_namespace(),
            path: None,
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration. Validation is left to
    /// the caller.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SessionError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| SessionError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(authority) = std::env::var("OIDC_SESSION_AUTHORITY") {
            self.oidc.authority = authority;
        }

        if let Ok(client_id) = std::env::var("OIDC_SESSION_CLIENT_ID") {
            self.oidc.client_id = client_id;
        }

        if let Ok(redirect_uri) = std::env::var("OIDC_SESSION_REDIRECT_URI") {
            self.oidc.redirect_uri = redirect_uri;
        }

        if let Ok(uri) = std::env::var("OIDC_SESSION_POST_LOGOUT_REDIRECT_URI") {
            self.oidc.post_logout_redirect_uri = uri;
        }

        if let Ok(scope) = std::env::var("OIDC_SESSION_SCOPE") {
            self.oidc.scope = scope;
        }

        if let Ok(discovery) = std::env::var("OIDC_SESSION_DISCOVERY") {
            match discovery.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.oidc.discovery = true,
                "0" | "false" | "no" => self.oidc.discovery = false,
                _ => tracing::warn!("Invalid OIDC_SESSION_DISCOVERY: {}", discovery),
            }
        }

        if let Ok(leeway) = std::env::var("OIDC_SESSION_REFRESH_LEEWAY_SECONDS") {
            if let Ok(value) = leeway.parse() {
                self.session.refresh_leeway_seconds = value;
            } else {
                tracing::warn!("Invalid OIDC_SESSION_REFRESH_LEEWAY_SECONDS: {}", leeway);
            }
        }

        if let Ok(timeout) = std::env::var("OIDC_SESSION_HTTP_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.session.http_timeout_seconds = value;
            } else {
                tracing::warn!("Invalid OIDC_SESSION_HTTP_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        if let Ok(backend) = std::env::var("OIDC_SESSION_STORAGE_BACKEND") {
            match backend.parse() {
                Ok(value) => self.storage.backend = value,
                Err(e) => tracing::warn!("Ignoring OIDC_SESSION_STORAGE_BACKEND: {}", e),
            }
        }

        if let Ok(namespace) = std::env::var("OIDC_SESSION_STORAGE_NAMESPACE") {
            self.storage.namespace = namespace;
        }

        if let Ok(path) = std::env::var("OIDC_SESSION_STORAGE_PATH") {
            self.storage.path = Some(path);
        }
    }

    fn apply_cli_overrides(&mut self, cli: &Cli) {
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }

        if let Some(authority) = &cli.authority {
            self.oidc.authority = authority.clone();
        }

        if let Some(client_id) = &cli.client_id {
            self.oidc.client_id = client_id.clone();
        }

        if let Some(backend) = cli.storage {
            self.storage.backend = backend.into();
        }

        if let Some(path) = &cli.storage_path {
            self.storage.path = Some(path.clone());
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Config` naming the first invalid field
    pub fn validate(&self) -> Result<()> {
        if self.oidc.authority.is_empty() {
            return Err(SessionError::Config(
                "oidc.authority is required (or set OIDC_SESSION_AUTHORITY)".to_string(),
            )
            .into());
        }

        match Url::parse(&self.oidc.authority) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => {
                return Err(SessionError::Config(format!(
                    "oidc.authority must be an http(s) URL, got '{}'",
                    self.oidc.authority
                ))
                .into())
            }
        }

        if self.oidc.client_id.is_empty() {
            return Err(SessionError::Config(
                "oidc.client_id is required (or set OIDC_SESSION_CLIENT_ID)".to_string(),
            )
            .into());
        }

        if Url::parse(&self.oidc.redirect_uri).is_err() {
            return Err(SessionError::Config(format!(
                "oidc.redirect_uri is not a valid URL: '{}'",
                self.oidc.redirect_uri
            ))
            .into());
        }

        if !self
            .oidc
            .scope
            .split_whitespace()
            .any(|scope| scope == "openid")
        {
            return Err(
                SessionError::Config("oidc.scope must include 'openid'".to_string()).into(),
            );
        }

        if !self.oidc.discovery {
            for (name, path) in [
                ("authorize_path", &self.oidc.authorize_path),
                ("token_path", &self.oidc.token_path),
                ("end_session_path", &self.oidc.end_session_path),
            ] {
                if path.is_empty() {
                    return Err(SessionError::Config(format!(
                        "oidc.{} cannot be empty",
                        name
                    ))
                    .into());
                }
            }
        }

        if self.session.http_timeout_seconds == 0 {
            return Err(SessionError::Config(
                "session.http_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.storage.namespace.is_empty() {
            return Err(
                SessionError::Config("storage.namespace cannot be empty".to_string()).into(),
            );
        }

        Ok(())
    }
}
