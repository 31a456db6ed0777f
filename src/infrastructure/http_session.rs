//! Authenticated HTTP session against the back office
//!
//! Login is a CSRF dance: fetch the login form, lift the hidden authenticity
//! token, post it back alongside the credentials, and accept the session only
//! when the response carries the signed-in marker. Every later fetch rides on
//! the session's cookie jar and waits on a shared rate limit.

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::InMemoryState;
use governor::state::direct::NotKeyed;
use governor::{Quota, RateLimiter};
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, info};

use crate::infrastructure::config::{Credentials, HttpConfig, SiteConfig, backoffice};
use crate::infrastructure::sync_error::{AuthError, FetchError};

/// Source of page bodies for the extraction pipeline.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, url: &str) -> Result<String, FetchError>;
}

/// A logged-in back-office session. Construction implies a verified login;
/// holders can assume authenticated fetches until the server expires the
/// cookie.
#[derive(Debug)]
pub struct HttpSession {
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    timeout: Duration,
}

impl HttpSession {
    /// Perform the login flow and return a session bound to the resulting
    /// cookie state.
    pub async fn authenticate(
        site: &SiteConfig,
        credentials: &Credentials,
        http: &HttpConfig,
    ) -> Result<Self, AuthError> {
        let timeout = Duration::from_secs(http.request_timeout_seconds);
        let client = Client::builder()
            .user_agent(&site.user_agent)
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| AuthError::transport(format!("Could not build HTTP client: {}", e)))?;

        let login_url = backoffice::login_url(&site.base_url);
        info!("Fetching login form: {}", login_url);

        let response = client
            .get(&login_url)
            .send()
            .await
            .map_err(|e| AuthError::transport(format!("Login page request failed: {}", e)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::LoginPageUnreachable {
                status: status.as_u16(),
            });
        }
        let form_body = response
            .text()
            .await
            .map_err(|e| AuthError::transport(format!("Could not read login form: {}", e)))?;

        let token = extract_authenticity_token(&form_body)
            .ok_or_else(|| AuthError::token_field_missing(backoffice::TOKEN_FIELD))?;
        debug!("Lifted authenticity token from login form");

        let response = client
            .post(&login_url)
            .header(reqwest::header::REFERER, &login_url)
            .form(&[
                (backoffice::EMAIL_FIELD, credentials.email.as_str()),
                (backoffice::PASSWORD_FIELD, credentials.password.as_str()),
                (backoffice::TOKEN_FIELD, token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AuthError::transport(format!("Login submit failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AuthError::transport(format!("Could not read login response: {}", e)))?;

        if !status.is_success() || !body.contains(backoffice::SUCCESS_MARKER) {
            return Err(AuthError::MarkerAbsent {
                marker: backoffice::SUCCESS_MARKER.to_string(),
                status: status.as_u16(),
            });
        }

        info!("Authenticated against {}", site.base_url);

        let quota = Quota::per_second(
            NonZeroU32::new(http.requests_per_second).unwrap_or(NonZeroU32::MIN),
        );

        Ok(Self {
            client,
            rate_limiter: RateLimiter::direct(quota),
            timeout,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpSession {
    async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        self.rate_limiter.until_ready().await;
        debug!("Fetching page: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_request_error(url, self.timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::status(status.as_u16(), url));
        }

        response
            .text()
            .await
            .map_err(|e| classify_request_error(url, self.timeout, e))
    }
}

/// Hidden CSRF token value from the login form markup.
fn extract_authenticity_token(body: &str) -> Option<String> {
    let document = Html::parse_document(body);
    let selector = Selector::parse(&format!(r#"input[name="{}"]"#, backoffice::TOKEN_FIELD)).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|input| input.value().attr("value"))
        .map(|value| value.to_string())
}

fn classify_request_error(url: &str, timeout: Duration, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
            timeout_seconds: timeout.as_secs(),
        }
    } else {
        FetchError::transport(url, error.to_string())
    }
}
