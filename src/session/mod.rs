//! OpenID Connect authorization-code + PKCE session
//!
//! Everything needed to sign a user in with an OIDC provider from a public
//! client, keep the resulting tokens, refresh them, and sign out again.
//!
//! # Module Layout
//!
//! - [`pkce`]         -- PKCE verifier and `S256` challenge generation
//! - [`authorize`]    -- Authorization and end-session URL construction
//! - [`token_client`] -- Token endpoint calls (code exchange and refresh)
//! - [`token_store`]  -- Persisted session state over a key-value backend
//! - [`claims`]       -- Display-only identity token decoding
//! - [`discovery`]    -- Endpoint resolution (configured paths or discovery)
//! - [`platform`]     -- Injectable clock, randomness and navigation
//! - [`manager`]      -- The session state machine tying it together

pub mod authorize;
pub mod claims;
pub mod discovery;
pub mod manager;
pub mod pkce;
pub mod platform;
pub mod token_client;
pub mod token_store;

pub use manager::{SessionManager, SessionManagerBuilder, SessionState};
