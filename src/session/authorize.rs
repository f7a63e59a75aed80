//! Authorization and end-session URL construction
//!
//! Builds the front-channel URLs of the flow: the authorization request that
//! starts a login and the RP-initiated logout request that ends one. Neither
//! function persists anything; the session manager decides what to keep.

use base64::Engine as _;
use url::Url;

use crate::error::Result;
use crate::session::pkce::METHOD_S256;
use crate::session::platform::RandomSource;

/// Number of random bytes behind each `state` value (43 base64url chars).
const STATE_BYTES: usize = 32;

/// A ready-to-follow authorization request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    /// Full authorization endpoint URL with all query parameters.
    pub url: Url,

    /// Opaque anti-CSRF value embedded in `url`; the provider echoes it back.
    pub state: String,
}

impl AuthorizationRequest {
    /// Builds an authorization-code request with a fresh `state`.
    ///
    /// The URL carries `client_id`, `redirect_uri`, `response_type=code`,
    /// `scope`, `code_challenge`, `code_challenge_method=S256` and `state`.
    ///
    /// # Errors
    ///
    /// Fails only when the random source fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use oidc_session::session::authorize::AuthorizationRequest;
    /// use oidc_session::session::platform::OsRandom;
    /// use url::Url;
    ///
    /// let endpoint = Url::parse("https://idp.example.com/authorize").unwrap();
    /// let request = AuthorizationRequest::build(
    ///     &endpoint,
    ///     "client-123",
    ///     "https://app.example.com/auth/callback",
    ///     "openid profile",
    ///     "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM",
    ///     &OsRandom,
    /// )
    /// .unwrap();
    ///
    /// assert!(request.url.as_str().contains("code_challenge_method=S256"));
    /// assert!(request.state.len() >= 32);
    /// ```
    pub fn build(
        endpoint: &Url,
        client_id: &str,
        redirect_uri: &str,
        scope: &str,
        code_challenge: &str,
        random: &dyn RandomSource,
    ) -> Result<Self> {
        let state = generate_state(random)?;

        let mut url = endpoint.clone();
        url.query_pairs_mut()
            .append_pair("client_id", client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", scope)
            .append_pair("code_challenge", code_challenge)
            .append_pair("code_challenge_method", METHOD_S256)
            .append_pair("state", &state);

        Ok(Self { url, state })
    }
}

/// Generates an opaque `state` value: 32 random bytes, base64url, no padding.
pub fn generate_state(random: &dyn RandomSource) -> Result<String> {
    let mut bytes = [0u8; STATE_BYTES];
    random.fill(&mut bytes)?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Builds an RP-initiated logout URL (OpenID Connect RP-Initiated Logout 1.0).
pub fn end_session_url(endpoint: &Url, id_token: &str, post_logout_redirect_uri: &str) -> Url {
    let mut url = endpoint.clone();
    url.query_pairs_mut()
        .append_pair("id_token_hint", id_token)
        .append_pair("post_logout_redirect_uri", post_logout_redirect_uri);
    url
}
