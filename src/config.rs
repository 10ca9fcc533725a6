//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration files (config/default.toml, config/local.toml)
//! 3. Environment variables (override)
//!
//! Environment variable names are unprefixed (`DB_URL`, `JWT_SIGNING_KEY`,
//! ...). The store, signing and OAuth settings have no defaults; startup
//! aborts when any of them is missing.

use serde::Deserialize;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Store connection URL (`sqlite:...`)
    pub db_url: String,
    /// Store credential
    pub db_key: String,
    /// HMAC secret for access tokens (32+ bytes)
    pub jwt_signing_key: String,
    /// `iss` claim written into and required from access tokens
    pub jwt_issuer: String,
    /// `aud` claim written into and required from access tokens
    pub jwt_audience: String,
    /// GitHub OAuth app client id
    pub client_id: String,
    /// GitHub OAuth app client secret
    pub client_secret: String,
    /// Deployment environment; "production" turns on secure cookies
    pub node_env: String,
    /// Dashboard origin allowed by CORS
    pub frontend_url: String,

    /// Bind address (default: "0.0.0.0")
    pub host: String,
    /// Port number (default: 3001)
    pub port: u16,
    /// Base URL for GitHub OAuth endpoints
    pub github_oauth_url: String,
    /// Base URL for the GitHub REST API
    pub github_api_url: String,
    /// Timeout for every GitHub request
    pub github_timeout_seconds: u64,
    /// Log format: "pretty" or "json"
    pub log_format: String,
    /// Expired session sweep interval; 0 disables the sweeper
    pub session_sweep_interval_seconds: u64,
    /// Re-check the access token's session on every gated request
    pub strict_sessions: bool,
    /// Requests allowed per window on /auth/callback and /auth/refresh
    pub auth_rate_limit_max: u32,
    /// Rate limit window length
    pub auth_rate_limit_window_seconds: u64,
    /// Reverse proxies in front of the server that append to
    /// `X-Forwarded-For`; 0 keys clients by socket peer address
    pub trust_proxy_hops: usize,
    /// Bind address of the metrics listener (default: "127.0.0.1")
    pub metrics_host: String,
    /// Port of the metrics listener; 0 disables `/metrics`
    pub metrics_port: u16,
}

impl AppConfig {
    /// Load configuration from files and the process environment
    ///
    /// # Errors
    /// Returns error if a required variable is missing or a value is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        Self::load_with(config::Environment::default())
    }

    /// Load configuration with an explicit environment source
    pub fn load_with(environment: config::Environment) -> Result<Self, crate::error::AppError> {
        use config::{Config, File};

        let config = Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", 3001)?
            .set_default("github_oauth_url", "https://github.com")?
            .set_default("github_api_url", "https://api.github.com")?
            .set_default("github_timeout_seconds", 10)?
            .set_default("log_format", "pretty")?
            .set_default("session_sweep_interval_seconds", 3600)?
            .set_default("strict_sessions", false)?
            .set_default("auth_rate_limit_max", 10)?
            .set_default("auth_rate_limit_window_seconds", 900)?
            .set_default("trust_proxy_hops", 0)?
            .set_default("metrics_host", "127.0.0.1")?
            .set_default("metrics_port", 9464)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(environment.try_parsing(true))
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub fn is_production(&self) -> bool {
        self.node_env.eq_ignore_ascii_case("production")
    }

    pub fn github_timeout(&self) -> Duration {
        Duration::from_secs(self.github_timeout_seconds)
    }

    fn validate(&self) -> Result<(), crate::error::AppError> {
        const MIN_SIGNING_KEY_BYTES: usize = 32;

        let required = [
            ("DB_URL", &self.db_url),
            ("DB_KEY", &self.db_key),
            ("JWT_SIGNING_KEY", &self.jwt_signing_key),
            ("JWT_ISSUER", &self.jwt_issuer),
            ("JWT_AUDIENCE", &self.jwt_audience),
            ("CLIENT_ID", &self.client_id),
            ("CLIENT_SECRET", &self.client_secret),
            ("NODE_ENV", &self.node_env),
            ("FRONTEND_URL", &self.frontend_url),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(crate::error::AppError::Config(format!(
                    "{name} must not be empty"
                )));
            }
        }

        if self.jwt_signing_key.len() < MIN_SIGNING_KEY_BYTES {
            return Err(crate::error::AppError::Config(format!(
                "JWT_SIGNING_KEY must be at least {} bytes",
                MIN_SIGNING_KEY_BYTES
            )));
        }

        if !self.db_url.starts_with("sqlite:") {
            return Err(crate::error::AppError::Config(
                "DB_URL must be a sqlite: URL".to_string(),
            ));
        }

        url::Url::parse(&self.frontend_url).map_err(|e| {
            crate::error::AppError::Config(format!("FRONTEND_URL is not a valid URL: {e}"))
        })?;

        if self.github_timeout_seconds == 0 {
            return Err(crate::error::AppError::Config(
                "GITHUB_TIMEOUT_SECONDS must be greater than 0".to_string(),
            ));
        }

        if !self.is_production() {
            tracing::warn!(
                node_env = %self.node_env,
                "Using insecure cookies outside production"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
impl AppConfig {
    /// Development config pointing both GitHub base URLs at `github_url`
    pub(crate) fn for_tests(github_url: &str) -> Self {
        Self {
            db_url: "sqlite::memory:".to_string(),
            db_key: "test-db-key".to_string(),
            jwt_signing_key: "test-signing-key-0123456789abcdef".to_string(),
            jwt_issuer: "codeiq".to_string(),
            jwt_audience: "codeiq-dashboard".to_string(),
            client_id: "test-client-id".to_string(),
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
            auth_rate_limit_max: 10,
            auth_rate_limit_window_seconds: 900,
            trust_proxy_hops: 0,
            metrics_host: "127.0.0.1".to_string(),
            metrics_port: 0,
        }
    }
}
