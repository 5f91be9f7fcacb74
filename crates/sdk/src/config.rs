//! Configuration types for the nowbridge SDK.

use std::time::Duration;
use url::Url;

/// How requests are authenticated against the instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthMethod {
    /// OAuth 2.0 password grant against `/oauth_token.do`.
    #[default]
    OAuth,
    /// HTTP Basic, computed per request.
    Basic,
}

impl std::str::FromStr for AuthMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "oauth" => Ok(Self::OAuth),
            "basic" => Ok(Self::Basic),
            other => Err(format!("unknown auth method '{}', expected 'oauth' or 'basic'", other)),
        }
    }
}

/// Credentials for the OAuth password grant.
///
/// Every field is optional at construction; missing values are reported
/// when a token is first requested.
#[derive(Debug, Clone, Default)]
pub struct OAuthCredentials {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Credentials for Basic authentication.
#[derive(Debug, Clone, Default)]
pub struct BasicCredentials {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Configuration for the nowbridge client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Instance base URL, e.g. `https://dev12345.service-now.com`.
    pub base_url: Url,
    /// Authentication method.
    pub auth_method: AuthMethod,
    /// OAuth credentials, used when `auth_method` is OAuth.
    pub oauth: Option<OAuthCredentials>,
    /// Basic credentials, used when `auth_method` is Basic.
    pub basic: Option<BasicCredentials>,
    /// Per-attempt request timeout.
    pub timeout: Duration,
    /// Retry configuration.
    pub retry_config: RetryConfig,
}

impl ClientConfig {
    /// Create a new configuration with the given base URL.
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            auth_method: AuthMethod::default(),
            oauth: None,
            basic: None,
            timeout: Duration::from_secs(30),
            retry_config: RetryConfig::default(),
        }
    }

    /// The username requests are made as, if one is configured.
    pub fn username(&self) -> Option<&str> {
        match self.auth_method {
            AuthMethod::OAuth => self.oauth.as_ref().and_then(|c| c.username.as_deref()),
            AuthMethod::Basic => self.basic.as_ref().and_then(|c| c.username.as_deref()),
        }
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Backoff before the first retry.
    pub initial_backoff: Duration,
    /// Upper bound for any single backoff.
    pub max_backoff: Duration,
    /// Backoff multiplier.
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(1000),
            max_backoff: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Create a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Calculate backoff duration for a given attempt.
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let backoff_ms = self.initial_backoff.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32);
        let backoff = Duration::from_millis(backoff_ms as u64);
        std::cmp::min(backoff, self.max_backoff)
    }
}
