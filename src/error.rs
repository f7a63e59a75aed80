//! Error types for oidc-session
//!
//! This module defines the error taxonomy of the session manager, using
//! `thiserror` for the variants and `anyhow` for propagation.
//!
//! Callers that need to react to a particular failure (for example to
//! restart the login flow on [`SessionError::MissingPkceVerifier`]) use
//! `err.downcast_ref::<SessionError>()` on the returned `anyhow::Error`.

use thiserror::Error;

/// Main error type for session operations
///
/// Protocol-level variants (`TokenExchange`, `TokenRefresh`,
/// `MissingPkceVerifier`, `StateMismatch`) are never retried: a bad
/// authorization code or a revoked refresh token is not a transient
/// condition. Every authentication failure resolves to either "restart
/// login" or "treated as logged out".
#[derive(Error, Debug)]
pub enum SessionError {
    /// The callback was invoked without a prior `login()` in this store
    #[error("PKCE verifier not found. Please try logging in again.")]
    MissingPkceVerifier,

    /// The `state` returned by the provider does not match the persisted one
    #[error("OAuth state mismatch in callback. Please try logging in again.")]
    StateMismatch,

    /// The provider redirected back with an OAuth error instead of a code
    #[error("Authorization denied by provider: {error}{}", parenthesized(.description))]
    AuthorizationDenied {
        /// The `error` query parameter (RFC 6749 section 4.1.2.1)
        error: String,
        /// The optional `error_description` query parameter
        description: Option<String>,
    },

    /// The callback URL carried neither a `code` nor an `error`
    #[error("Authorization code missing from callback")]
    MissingAuthorizationCode,

    /// The token endpoint rejected the authorization code
    #[error("Token exchange failed (HTTP {status}): {body}")]
    TokenExchange {
        /// HTTP status returned by the token endpoint
        status: u16,
        /// Response body, kept for diagnostics
        body: String,
    },

    /// The token endpoint rejected the refresh token
    #[error("Token refresh failed (HTTP {status}): {body}")]
    TokenRefresh {
        /// HTTP status returned by the token endpoint
        status: u16,
        /// Response body, kept for diagnostics
        body: String,
    },

    /// The token endpoint answered 2xx with a body that is not a token response
    #[error("Invalid token response: {0}")]
    InvalidTokenResponse(String),

    /// A persisted value could not be parsed
    ///
    /// Only ever logged; the token store treats corrupt values as absent.
    #[error("Corrupt value in storage under '{key}': {reason}")]
    StorageCorruption {
        /// Fully namespaced storage key
        key: String,
        /// Parser error message
        reason: String,
    },

    /// Storage backend write or delete failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// The operating system entropy source failed
    #[error("Entropy source unavailable: {0}")]
    Entropy(String),

    /// OIDC discovery failed
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Keyring/credential storage errors
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

fn parenthesized(description: &Option<String>) -> String {
    description
        .as_deref()
        .map(|d| format!(" ({d})"))
        .unwrap_or_default()
}

/// Result type alias for session operations
///
/// Uses `anyhow::Error` so call sites can attach context with
/// [`anyhow::Context`] while still carrying a [`SessionError`] that can be
/// recovered with `downcast_ref`.
pub type Result<T> = anyhow::Result<T>;
