//! Display-only decoding of identity-token claims
//!
//! The identity token is a JWT. This module reads its payload segment so the
//! application can show who is signed in. The signature, issuer, audience and
//! expiry are NOT checked, so nothing decoded here may be used for an
//! authorization decision.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// The `aud` claim: a single audience or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    /// Returns true when `client_id` is one of the audiences.
    pub fn contains(&self, client_id: &str) -> bool {
        match self {
            Audience::One(aud) => aud == client_id,
            Audience::Many(list) => list.iter().any(|a| a == client_id),
        }
    }
}

/// Claims read from an identity token without verification.
///
/// Never persisted; recomputed from the stored id token on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnverifiedClaims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,
}

impl UnverifiedClaims {
    /// Best human-readable label: name, then preferred username, then email,
    /// then the subject.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.preferred_username.as_deref())
            .or(self.email.as_deref())
            .unwrap_or(&self.sub)
    }
}

/// Decodes the payload of `id_token` without verifying anything.
///
/// Returns `None` for anything that is not `header.payload.signature`
/// with a base64url JSON payload carrying at least `sub`.
///
/// # Examples
///
/// ```
/// use oidc_session::session::claims::decode_unverified;
///
/// // {"sub":"user-1","email":"a@example.com"}
/// let token = "e30.eyJzdWIiOiJ1c2VyLTEiLCJlbWFpbCI6ImFAZXhhbXBsZS5jb20ifQ.sig";
/// let claims = decode_unverified(token).unwrap();
/// assert_eq!(claims.sub, "user-1");
/// assert_eq!(claims.email.as_deref(), Some("a@example.com"));
///
/// assert!(decode_unverified("not-a-jwt").is_none());
/// ```
pub fn decode_unverified(id_token: &str) -> Option<UnverifiedClaims> {
    let segments: Vec<&str> = id_token.split('.').collect();
    let [_header, payload, _signature] = segments.as_slice() else {
        tracing::debug!(
            segments = segments.len(),
            "Identity token is not header.payload.signature"
        );
        return None;
    };

    // Some issuers pad their segments.
    let payload = payload.trim_end_matches('=');

    let bytes = match URL_SAFE_NO_PAD.decode(payload) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(error = %e, "Identity token payload is not base64url");
            return None;
        }
    };

    match serde_json::from_slice(&bytes) {
        Ok(claims) => Some(claims),
        Err(e) => {
            tracing::debug!(error = %e, "Identity token payload is not a claims object");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b64url(data: &[u8]) -> String {
        URL_SAFE_NO_PAD.encode(data)
    }

    fn make_jwt(payload: &str) -> String {
        format!(
            "{}.{}.fake-signature",
            b64url(br#"{"alg":"RS256","typ":"JWT"}"#),
            b64url(payload.as_bytes())
        )
    }

    #[test]
    fn test_decode_full_claims() {
        let token = make_jwt(
            r#"{"sub":"248289761001","email":"jane@example.com","email_verified":true,
                "name":"Jane Doe","given_name":"Jane","family_name":"Doe",
                "preferred_username":"jane","iat":1700000000,"exp":1700003600,
                "iss":"https://idp.example.com","aud":"client-123"}"#,
        );

        let claims = decode_unverified(&token).expect("claims should decode");
        assert_eq!(claims.sub, "248289761001");
        assert_eq!(claims.email_verified, Some(true));
        assert_eq!(claims.family_name.as_deref(), Some("Doe"));
        assert_eq!(claims.exp, Some(1_700_003_600));
        assert_eq!(claims.aud, Some(Audience::One("client-123".to_string())));
    }

    #[test]
    fn test_decode_audience_list() {
        let token = make_jwt(r#"{"sub":"u","aud":["client-123","api"]}"#);
        let claims = decode_unverified(&token).unwrap();
        let aud = claims.aud.expect("aud present");
        assert!(aud.contains("api"));
        assert!(!aud.contains("other"));
    }

    #[test]
    fn test_unknown_claims_are_ignored() {
        let token = make_jwt(r#"{"sub":"u","urn:zitadel:iam:org:id":"42","amr":["pwd"]}"#);
        assert_eq!(decode_unverified(&token).unwrap().sub, "u");
    }

    #[test]
    fn test_padded_payload_decodes() {
        let payload = b64url(br#"{"sub":"test"}"#);
        let padded = match payload.len() % 4 {
            2 => format!("{payload}=="),
            3 => format!("{payload}="),
            _ => payload,
        };
        let token = format!("e30.{padded}.sig");
        assert_eq!(decode_unverified(&token).unwrap().sub, "test");
    }

    #[test]
    fn test_token_needs_exactly_three_segments() {
        let payload = b64url(br#"{"sub":"u1"}"#);
        assert!(decode_unverified(&format!("e30.{payload}")).is_none());
        assert!(decode_unverified(&format!("e30.{payload}.sig.extra")).is_none());
        assert_eq!(decode_unverified(&format!("e30.{payload}.")).unwrap().sub, "u1");
    }

    #[test]
    fn test_malformed_tokens_are_none() {
        assert!(decode_unverified("").is_none());
        assert!(decode_unverified("not-a-jwt").is_none());
        assert!(decode_unverified("header.!!!invalid!!!.sig").is_none());
        let not_json = b64url(b"this is not json");
        assert!(decode_unverified(&format!("h.{not_json}.s")).is_none());
    }

    #[test]
    fn test_missing_sub_is_none() {
        let token = make_jwt(r#"{"email":"a@example.com"}"#);
        assert!(decode_unverified(&token).is_none());
    }

    #[test]
    fn test_display_name_fallbacks() {
        let mut claims = decode_unverified(&make_jwt(r#"{"sub":"u1"}"#)).unwrap();
        assert_eq!(claims.display_name(), "u1");
        claims.email = Some("e@x.io".into());
        assert_eq!(claims.display_name(), "e@x.io");
        claims.preferred_username = Some("eve".into());
        assert_eq!(claims.display_name(), "eve");
        claims.name = Some("Eve".into());
        assert_eq!(claims.display_name(), "Eve");
    }
}
