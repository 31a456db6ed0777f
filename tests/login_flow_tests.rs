//! Login flow against a mock back office: token extraction, cookie-bound
//! session reuse, and the failure taxonomy of `authenticate`.

use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use enquiry_sync::infrastructure::config::{Credentials, HttpConfig, SiteConfig};
use enquiry_sync::infrastructure::{backoffice, AuthError, FetchError, HttpSession, PageFetcher};

const LOGIN_FORM: &str = r#"<html><body>
<form action="/admin-login" method="post">
  <input type="hidden" name="authenticity_token" value="tok-123">
  <input type="email" name="user_admin[email]">
  <input type="password" name="user_admin[password]">
</form>
</body></html>"#;

const DASHBOARD: &str =
    r#"<html><body><nav><a href="/admin-logout">Logout</a></nav></body></html>"#;

fn site_for(server: &MockServer) -> SiteConfig {
    SiteConfig {
        base_url: server.uri(),
        user_agent: "test-agent".to_string(),
    }
}

fn http() -> HttpConfig {
    HttpConfig {
        request_timeout_seconds: 5,
        requests_per_second: 100,
    }
}

fn credentials() -> Credentials {
    Credentials {
        email: "agent@example.test".to_string(),
        password: "secret".to_string(),
    }
}

#[tokio::test]
async fn login_round_trip_extracts_token_and_checks_marker() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/admin-login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_FORM))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/admin-login"))
        .and(body_string_contains("authenticity_token=tok-123"))
        .respond_with(ResponseTemplate::new(200).set_body_string(DASHBOARD))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/enquiry/sales"))
        .and(query_param("filter", "1"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>listing</html>"))
        .mount(&server)
        .await;

    let session = HttpSession::authenticate(&site_for(&server), &credentials(), &http())
        .await
        .unwrap();

    let body = session
        .fetch_page(&backoffice::listing_url(&server.uri(), 1, 1))
        .await
        .unwrap();
    assert!(body.contains("listing"));
}

#[tokio::test]
async fn login_form_without_token_field_fails() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/admin-login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><body><form action=\"/admin-login\"></form></body></html>"),
        )
        .mount(&server)
        .await;

    let err = HttpSession::authenticate(&site_for(&server), &credentials(), &http())
        .await
        .unwrap_err();
    match err {
        AuthError::TokenFieldMissing { field } => {
            assert_eq!(field, backoffice::TOKEN_FIELD);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn unreachable_login_page_fails_with_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/admin-login"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = HttpSession::authenticate(&site_for(&server), &credentials(), &http())
        .await
        .unwrap_err();
    match err {
        AuthError::LoginPageUnreachable { status } => assert_eq!(status, 503),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn post_login_body_without_marker_fails() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/admin-login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_FORM))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/admin-login"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<html><body>Wrong password</body></html>"),
        )
        .mount(&server)
        .await;

    let err = HttpSession::authenticate(&site_for(&server), &credentials(), &http())
        .await
        .unwrap_err();
    match err {
        AuthError::MarkerAbsent { marker, status } => {
            assert_eq!(marker, backoffice::SUCCESS_MARKER);
            assert_eq!(status, 200);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn page_fetch_failures_carry_the_status() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/admin-login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_FORM))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/admin-login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(DASHBOARD))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/enquiry/sales"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let session = HttpSession::authenticate(&site_for(&server), &credentials(), &http())
        .await
        .unwrap();
    let err = session
        .fetch_page(&backoffice::listing_url(&server.uri(), 1, 1))
        .await
        .unwrap_err();
    match err {
        FetchError::Status { status, url } => {
            assert_eq!(status, 404);
            assert!(url.contains("/enquiry/sales"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}
