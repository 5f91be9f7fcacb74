//! HTTP transport layer for the nowbridge SDK.

use crate::auth::Authenticator;
use crate::config::ClientConfig;
use crate::error::TransportError;
use nowbridge_core::{ErrorKind, NowError};
use reqwest::{header, Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// HTTP transport for making API requests.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    config: Arc<ClientConfig>,
    auth: Arc<Authenticator>,
}

impl HttpTransport {
    /// Create a new HTTP transport with the given configuration.
    pub fn new(config: Arc<ClientConfig>) -> Result<Self, TransportError> {
        let client = Client::builder().build()?;
        let auth = Arc::new(Authenticator::new(client.clone(), &config)?);

        Ok(Self {
            client,
            config,
            auth,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.auth
    }

    /// Build a URL for the given path, relative to the instance root.
    pub fn build_url(&self, path: &str) -> Result<Url, TransportError> {
        let base = self.config.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(Url::parse(&format!("{}/{}", base, path))?)
    }

    /// Execute a request, retrying transient failures.
    ///
    /// Runs at most `max_retries + 1` attempts. Authentication, validation
    /// and not-found failures are returned immediately. Everything else,
    /// including a success status with an unparseable body, is retried with
    /// exponential backoff and the last error is returned once attempts are
    /// exhausted.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
        headers: Option<header::HeaderMap>,
    ) -> Result<T, TransportError> {
        let retry_config = &self.config.retry_config;
        let mut attempt = 0;

        loop {
            match self
                .send_once(method.clone(), url.clone(), body, headers.as_ref())
                .await
            {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if !err.is_retryable() || attempt >= retry_config.max_retries {
                        return Err(err);
                    }

                    let backoff = retry_config.backoff_for_attempt(attempt);
                    warn!(
                        method = %method,
                        url = %url,
                        attempt = attempt + 1,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "Request failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
        extra_headers: Option<&header::HeaderMap>,
    ) -> Result<T, TransportError> {
        let mut headers = extra_headers.cloned().unwrap_or_default();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        let authorization = self.auth.authorization_header()?;
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&authorization).map_err(|_| {
                NowError::authentication("Authorization header contains invalid characters")
            })?,
        );

        debug!(method = %method, url = %url, "Sending request");

        let mut request = self
            .client
            .request(method, url)
            .headers(headers)
            .timeout(self.config.timeout);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(self.config.timeout)
            } else {
                TransportError::Http(e)
            }
        })?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(TransportError::Api(error_from_response(status, &text)));
        }

        if text.trim().is_empty() {
            return Ok(serde_json::from_str("null")?);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

/// Classify a non-success response. The platform reports failures as
/// `{"error": {"message": ..., "detail": ...}}`.
fn error_from_response(status: StatusCode, body: &str) -> NowError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )
        });

    NowError::new(ErrorKind::from_status(status.as_u16()), message)
}
