//! Test utilities for oidc-session
//!
//! Shared fixtures for unit tests: configuration pointing at a given
//! authority and unsigned identity tokens.

use crate::config::Config;
use crate::session::discovery::ProviderEndpoints;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;

/// Valid configuration for `authority` with the default endpoint paths.
pub fn test_config(authority: &str) -> Config {
    let mut config = Config::default();
    config.oidc.authority = authority.to_string();
    config.oidc.client_id = "client-123".to_string();
    config
}

/// Endpoints derived from `config`'s authority and paths.
///
/// # Panics
///
/// Panics if the authority is not a valid URL
pub fn test_endpoints(config: &Config) -> ProviderEndpoints {
    ProviderEndpoints::from_paths(&config.oidc).expect("test authority must be a valid URL")
}

/// Unsigned JWT carrying `payload` as its claims.
pub fn make_id_token(payload: &str) -> String {
    format!(
        "{}.{}.fake-signature",
        URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(payload.as_bytes())
    )
}
