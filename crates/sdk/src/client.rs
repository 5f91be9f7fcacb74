//! Main client for the nowbridge SDK.

use crate::api::*;
use crate::config::{AuthMethod, BasicCredentials, ClientConfig, OAuthCredentials, RetryConfig};
use crate::error::TransportError;
use crate::query::QueryDescriptor;
use crate::transport::HttpTransport;
use nowbridge_core::{ErrorKind, NowError, NowResult, Record};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Client for a single ServiceNow instance.
///
/// Cloning is cheap: clones share the HTTP connection pool and the cached
/// OAuth token.
#[derive(Debug, Clone)]
pub struct NowClient {
    config: Arc<ClientConfig>,
    pub(crate) http: HttpTransport,
}

impl NowClient {
    /// Create a new client builder.
    pub fn builder() -> NowClientBuilder {
        NowClientBuilder::new()
    }

    /// Create a client from configuration.
    pub fn new(config: ClientConfig) -> NowResult<Self> {
        let config = Arc::new(config);
        let http = HttpTransport::new(config.clone())
            .map_err(|e| e.into_now_error(ErrorKind::InvalidRequest, "Failed to build HTTP client"))?;

        Ok(Self { config, http })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get the Table API.
    pub fn table(&self) -> TableApi<'_> {
        TableApi::new(self)
    }

    /// Get the aggregate Stats API.
    pub fn stats(&self) -> StatsApi<'_> {
        StatsApi::new(self)
    }

    /// Get the user and group lookups.
    pub fn directory(&self) -> DirectoryApi<'_> {
        DirectoryApi::new(self)
    }

    /// Get the CMDB / ITOM API.
    pub fn cmdb(&self) -> CmdbApi<'_> {
        CmdbApi::new(self)
    }

    /// Get the generic REST API for scripted and AI endpoints.
    pub fn rest(&self) -> RestApi<'_> {
        RestApi::new(self)
    }

    /// Get the natural language helpers.
    pub fn assist(&self) -> AssistApi<'_> {
        AssistApi::new(self)
    }

    pub(crate) async fn ensure_authenticated(&self) -> NowResult<()> {
        self.http.authenticator().ensure_authenticated().await
    }

    /// Send one request to `path` with query parameters and an optional
    /// JSON body.
    pub(crate) async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<T, TransportError> {
        let mut url = self.http.build_url(path)?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        self.http.execute(method, url, body, None).await
    }

    /// GET a Table API collection.
    pub(crate) async fn list(
        &self,
        table: &str,
        params: &[(String, String)],
    ) -> Result<Vec<Record>, TransportError> {
        let envelope: Envelope<Vec<Record>> = self
            .send(Method::GET, &format!("/api/now/table/{}", table), params, None)
            .await?;
        Ok(envelope.result)
    }

    /// GET a Table API collection described by a query descriptor.
    pub(crate) async fn fetch(
        &self,
        descriptor: &QueryDescriptor,
        ceiling: u32,
    ) -> Result<Vec<Record>, TransportError> {
        self.list(&descriptor.table, &descriptor.to_params(ceiling))
            .await
    }
}

/// Builder for creating a NowClient.
pub struct NowClientBuilder {
    base_url: Option<String>,
    auth_method: AuthMethod,
    oauth: Option<OAuthCredentials>,
    basic: Option<BasicCredentials>,
    timeout: Duration,
    retry_config: RetryConfig,
}

impl NowClientBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            base_url: None,
            auth_method: AuthMethod::default(),
            oauth: None,
            basic: None,
            timeout: Duration::from_secs(30),
            retry_config: RetryConfig::default(),
        }
    }

    /// Set the instance URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Use the OAuth password grant with these credentials.
    pub fn oauth(mut self, credentials: OAuthCredentials) -> Self {
        self.auth_method = AuthMethod::OAuth;
        self.oauth = Some(credentials);
        self
    }

    /// Use Basic authentication.
    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth_method = AuthMethod::Basic;
        self.basic = Some(BasicCredentials {
            username: Some(username.into()),
            password: Some(password.into()),
        });
        self
    }

    /// Set the per-attempt request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry configuration.
    pub fn retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    /// Build the client.
    pub fn build(self) -> NowResult<NowClient> {
        let base_url_str = self
            .base_url
            .ok_or_else(|| NowError::invalid_request("base_url is required"))?;

        let base_url = Url::parse(&base_url_str).map_err(|e| {
            NowError::invalid_request(format!("Invalid instance URL '{}': {}", base_url_str, e))
        })?;

        NowClient::new(ClientConfig {
            base_url,
            auth_method: self.auth_method,
            oauth: self.oauth,
            basic: self.basic,
            timeout: self.timeout,
            retry_config: self.retry_config,
        })
    }
}

impl Default for NowClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_requires_base_url() {
        let err = NowClient::builder().build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert_eq!(err.message(), "base_url is required");
    }

    #[test]
    fn test_builder_rejects_invalid_url() {
        let err = NowClient::builder().base_url("not a url").build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_builder_basic_auth() {
        let client = NowClient::builder()
            .base_url("https://dev12345.service-now.com")
            .basic_auth("admin", "secret")
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();

        assert_eq!(client.config().auth_method, AuthMethod::Basic);
        assert_eq!(client.config().username(), Some("admin"));
        assert_eq!(client.config().timeout, Duration::from_secs(5));
    }
}
