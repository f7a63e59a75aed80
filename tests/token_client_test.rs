//! Token endpoint client tests using wiremock
//!
//! Verifies request encoding for both grants and the mapping of provider
//! responses onto `SessionError` variants.

mod common;

use std::sync::Arc;

use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{form_field, token_body};
use oidc_session::session::token_client::TokenClient;
use oidc_session::SessionError;

fn client_for(server_uri: &str) -> TokenClient {
    TokenClient::new(
        Arc::new(reqwest::Client::new()),
        Url::parse(&format!("{}/oauth/v2/token", server_uri)).expect("valid token URL"),
        "client-123",
        "http://localhost:3000/auth/callback",
    )
}

#[tokio::test]
async fn test_exchange_code_sends_form_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/v2/token"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("T1", Some("R1"), 3600)))
        .expect(1)
        .mount(&server)
        .await;

    let verifier = "abc~DEF-123._xyz";
    let tokens = client_for(&server.uri())
        .exchange_code("code-1", verifier)
        .await
        .expect("exchange should succeed");
    assert_eq!(tokens.access_token, "T1");
    assert_eq!(tokens.refresh_token.as_deref(), Some("R1"));
    assert_eq!(tokens.expires_in, 3600);

    let requests = server.received_requests().await.expect("recording enabled");
    let body = &requests[0].body;
    assert_eq!(form_field(body, "grant_type").as_deref(), Some("authorization_code"));
    assert_eq!(form_field(body, "client_id").as_deref(), Some("client-123"));
    assert_eq!(form_field(body, "code").as_deref(), Some("code-1"));
    assert_eq!(
        form_field(body, "redirect_uri").as_deref(),
        Some("http://localhost:3000/auth/callback")
    );
    assert_eq!(form_field(body, "code_verifier").as_deref(), Some(verifier));
    assert!(form_field(body, "client_secret").is_none());
}

#[tokio::test]
async fn test_refresh_sends_refresh_grant() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/v2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("T2", None, 900)))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = client_for(&server.uri())
        .refresh("R1")
        .await
        .expect("refresh should succeed");
    assert_eq!(tokens.access_token, "T2");
    assert!(tokens.refresh_token.is_none());

    let requests = server.received_requests().await.expect("recording enabled");
    let body = &requests[0].body;
    assert_eq!(form_field(body, "grant_type").as_deref(), Some("refresh_token"));
    assert_eq!(form_field(body, "refresh_token").as_deref(), Some("R1"));
    assert_eq!(form_field(body, "client_id").as_deref(), Some("client-123"));
    assert!(form_field(body, "code_verifier").is_none());
}

#[tokio::test]
async fn test_exchange_error_carries_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/v2/token"))
        .respond_with(
            ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant"}"#),
        )
        .mount(&server)
        .await;

    let err = client_for(&server.uri())
        .exchange_code("bad", "verifier")
        .await
        .expect_err("should fail");
    match err.downcast_ref::<SessionError>() {
        Some(SessionError::TokenExchange { status, body }) => {
            assert_eq!(*status, 400);
            assert!(body.contains("invalid_grant"));
        }
        other => panic!("expected TokenExchange, got {:?}", other),
    }
}

#[tokio::test]
async fn test_refresh_error_is_token_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/v2/token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("revoked"))
        .mount(&server)
        .await;

    let err = client_for(&server.uri())
        .refresh("R-revoked")
        .await
        .expect_err("should fail");
    assert!(matches!(
        err.downcast_ref::<SessionError>(),
        Some(SessionError::TokenRefresh { status: 401, .. })
    ));
}

#[tokio::test]
async fn test_non_token_body_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/v2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "token_type": "Bearer"
        })))
        .mount(&server)
        .await;

    let err = client_for(&server.uri())
        .exchange_code("c", "v")
        .await
        .expect_err("should fail");
    assert!(matches!(
        err.downcast_ref::<SessionError>(),
        Some(SessionError::InvalidTokenResponse(_))
    ));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_http_error() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let err = client_for(&uri)
        .refresh("R1")
        .await
        .expect_err("should fail");
    assert!(matches!(
        err.downcast_ref::<SessionError>(),
        Some(SessionError::Http(_))
    ));
}
