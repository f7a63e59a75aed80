//! PKCE S256 verifier and challenge generation
//!
//! Implements the client half of Proof Key for Code Exchange (RFC 7636).
//!
//! # How PKCE works
//!
//! 1. The client generates a high-entropy `code_verifier` and persists it,
//!    because the trip to the identity provider and back crosses a full
//!    navigation.
//! 2. The client sends `code_challenge = BASE64URL(SHA256(code_verifier))`
//!    with `code_challenge_method=S256` in the authorization request.
//! 3. The token exchange sends the original `code_verifier`; the provider
//!    recomputes the challenge and compares.
//!
//! # References
//!
//! - RFC 7636 <https://www.rfc-editor.org/rfc/rfc7636>

use base64::Engine as _;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::session::platform::RandomSource;

/// Unreserved characters allowed in a code verifier (RFC 7636 section 4.1).
pub const UNRESERVED: &[u8; 66] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// Length of every verifier produced by [`generate`] (the RFC maximum).
pub const VERIFIER_LEN: usize = 128;

/// Challenge method sent with every authorization request.
pub const METHOD_S256: &str = "S256";

// ---------------------------------------------------------------------------
// PkceCodePair
// ---------------------------------------------------------------------------

/// A verifier and its derived S256 challenge.
///
/// Created once per login attempt and destroyed after a successful code
/// exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceCodePair {
    /// 128 characters from [`UNRESERVED`]; sent as `code_verifier` to the
    /// token endpoint.
    pub verifier: String,

    /// `BASE64URL-NOPAD(SHA256(verifier))`; sent as `code_challenge` to the
    /// authorization endpoint.
    pub challenge: String,
}

// ---------------------------------------------------------------------------
// Public functions
// ---------------------------------------------------------------------------

/// Generates a fresh verifier/challenge pair.
///
/// Draws [`VERIFIER_LEN`] bytes and maps each through [`UNRESERVED`] by
/// modulo. The mapping is slightly non-uniform (256 is not a multiple of
/// 66); what matters for conformance is the length and character set.
///
/// # Errors
///
/// Returns [`SessionError::Entropy`](crate::error::SessionError::Entropy)
/// when the random source fails.
///
/// # Examples
///
/// ```
/// use oidc_session::session::pkce::{challenge_for, generate};
/// use oidc_session::session::platform::OsRandom;
///
/// let pair = generate(&OsRandom).unwrap();
/// assert_eq!(pair.verifier.len(), 128);
/// assert_eq!(challenge_for(&pair.verifier), pair.challenge);
/// ```
pub fn generate(random: &dyn RandomSource) -> Result<PkceCodePair> {
    let verifier = random_unreserved(random, VERIFIER_LEN)?;
    let challenge = challenge_for(&verifier);
    Ok(PkceCodePair {
        verifier,
        challenge,
    })
}

/// Computes the S256 challenge for a verifier.
pub fn challenge_for(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest.as_slice())
}

/// Returns `true` when `verifier` satisfies RFC 7636 section 4.1.
pub fn is_valid_verifier(verifier: &str) -> bool {
    (43..=128).contains(&verifier.len()) && verifier.bytes().all(|b| UNRESERVED.contains(&b))
}

/// Draws `len` bytes and maps them onto [`UNRESERVED`].
pub(crate) fn random_unreserved(random: &dyn RandomSource, len: usize) -> Result<String> {
    let mut bytes = vec![0u8; len];
    random.fill(&mut bytes)?;
    Ok(bytes
        .iter()
        .map(|b| UNRESERVED[usize::from(*b) % UNRESERVED.len()] as char)
        .collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
