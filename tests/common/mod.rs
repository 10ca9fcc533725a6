//! Common test utilities for E2E tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use codeiq::clock::{Clock, ManualClock};
use codeiq::{AppState, config};
use serde_json::json;
use tempfile::TempDir;
use tokio::net::TcpListener;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CLIENT_ID: &str = "test-client-id";

/// Test server instance
///
/// Runs the real router on an ephemeral port with GitHub replaced by a
/// wiremock server and time controlled by a `ManualClock`.
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub github: MockServer,
    pub clock: ManualClock,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

/// Auth cookies set by a response
#[derive(Debug, Clone, Default)]
pub struct AuthCookies {
    pub jwt: Option<String>,
    pub refresh: Option<String>,
    /// Raw `Set-Cookie` header values
    pub raw: Vec<String>,
}

impl AuthCookies {
    pub fn from_response(response: &reqwest::Response) -> Self {
        let mut cookies = Self::default();
        for value in response.headers().get_all(reqwest::header::SET_COOKIE) {
            let Ok(value) = value.to_str() else { continue };
            cookies.raw.push(value.to_string());

            let Ok(parsed) = cookie::Cookie::parse(value.to_string()) else {
                continue;
            };
            match parsed.name() {
                "jwt" => cookies.jwt = Some(parsed.value().to_string()),
                "refresh" => cookies.refresh = Some(parsed.value().to_string()),
                _ => {}
            }
        }
        cookies
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Raw `Set-Cookie` value for `name`
    pub fn raw_for(&self, name: &str) -> Option<&str> {
        let prefix = format!("{name}=");
        self.raw
            .iter()
            .find(|value| value.starts_with(&prefix))
            .map(String::as_str)
    }
}

/// Build a `Cookie` request header from the given values
pub fn cookie_header(jwt: Option<&str>, refresh: Option<&str>) -> String {
    let mut parts = Vec::new();
    if let Some(jwt) = jwt {
        parts.push(format!("jwt={jwt}"));
    }
    if let Some(refresh) = refresh {
        parts.push(format!("refresh={refresh}"));
    }
    parts.join("; ")
}

pub fn test_config(github_url: &str, db_url: String) -> config::AppConfig {
    config::AppConfig {
        db_url,
        db_key: "test-db-key".to_string(),
        jwt_signing_key: "test-signing-key-0123456789abcdef".to_string(),
        jwt_issuer: "codeiq".to_string(),
        jwt_audience: "codeiq-dashboard".to_string(),
        client_id: CLIENT_ID.to_string(),
        client_secret: "test-client-secret".to_string(),
        node_env: "test".to_string(),
        frontend_url: "http://localhost:3000".to_string(),
        host: "127.0.0.1".to_string(),
        port: 0,
        github_oauth_url: github_url.to_string(),
        github_api_url: github_url.to_string(),
        github_timeout_seconds: 2,
        log_format: "pretty".to_string(),
        session_sweep_interval_seconds: 0,
        strict_sessions: false,
        auth_rate_limit_max: 100,
        auth_rate_limit_window_seconds: 900,
        trust_proxy_hops: 0,
        metrics_host: "127.0.0.1".to_string(),
        metrics_port: 0,
    }
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server after adjusting the default test configuration
    pub async fn with_config(adjust: impl FnOnce(&mut config::AppConfig)) -> Self {
        codeiq::metrics::init_metrics();

        // Create temporary directory for test database
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let github = MockServer::start().await;

        let mut config = test_config(&github.uri(), format!("sqlite:{}", db_path.display()));
        adjust(&mut config);

        // Initialize app state
        let clock = ManualClock::default();
        let state = AppState::with_clock(config, Arc::new(clock.clone()))
            .await
            .unwrap();

        // Create HTTP client
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = codeiq::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        Self {
            addr: addr_str,
            state,
            github,
            clock,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    /// Mock a successful code exchange and profile fetch for `code`
    pub async fn mock_github_login(&self, code: &str) {
        Mock::given(method("POST"))
            .and(path("/login/oauth/access_token"))
            .and(body_string_contains(format!("code={code}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "ghA",
                "expires_in": 28800,
                "refresh_token": "ghR",
                "refresh_token_expires_in": 15552000,
                "token_type": "bearer",
            })))
            .mount(&self.github)
            .await;

        Mock::given(method("GET"))
            .and(path("/user"))
            .and(header("authorization", "Bearer ghA"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 42,
                "login": "alice",
                "email": "a@x",
                "avatar_url": "u",
            })))
            .mount(&self.github)
            .await;
    }

    /// Mock a successful upstream token refresh, expected `times` times
    pub async fn mock_github_refresh(&self, new_access_token: &str, times: u64) {
        Mock::given(method("POST"))
            .and(path("/login/oauth/access_token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=ghR"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": new_access_token,
                "expires_in": 28800,
            })))
            .expect(times)
            .mount(&self.github)
            .await;
    }

    /// Mock the installation listing seen with `bearer`
    pub async fn mock_installations(&self, bearer: &str, installations: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/user/installations"))
            .and(header("authorization", format!("Bearer {bearer}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total_count": installations.as_array().map(Vec::len).unwrap_or(0),
                "installations": installations,
            })))
            .mount(&self.github)
            .await;
    }

    pub async fn post_callback(&self, code: &str) -> reqwest::Response {
        self.client
            .post(self.url("/auth/callback"))
            .json(&json!({ "code": code }))
            .send()
            .await
            .unwrap()
    }

    /// Sign in as alice and return the response body and cookies
    pub async fn login(&self) -> (serde_json::Value, AuthCookies) {
        self.mock_github_login("ok").await;
        let response = self.post_callback("ok").await;
        assert_eq!(response.status(), 200);

        let cookies = AuthCookies::from_response(&response);
        let body = response.json().await.unwrap();
        (body, cookies)
    }

    /// Send a request carrying the given auth cookies
    pub async fn send_with_cookies(
        &self,
        method: reqwest::Method,
        path: &str,
        jwt: Option<&str>,
        refresh: Option<&str>,
    ) -> reqwest::Response {
        let mut request = self.client.request(method, self.url(path));
        let cookies = cookie_header(jwt, refresh);
        if !cookies.is_empty() {
            request = request.header(reqwest::header::COOKIE, cookies);
        }
        request.send().await.unwrap()
    }

    pub async fn session_count(&self) -> i64 {
        self.state.db.count_sessions().await.unwrap()
    }
}

/// Assert an error response's status and stable code
pub async fn assert_error(response: reqwest::Response, status: u16, code: &str) {
    assert_eq!(response.status(), status);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], code, "unexpected body: {body}");
    assert!(body["error"].is_string());
}
