//! Credential handling for Basic and OAuth password-grant authentication.

use crate::config::{AuthMethod, BasicCredentials, ClientConfig, OAuthCredentials};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use nowbridge_core::{NowError, NowResult};
use reqwest::Client;
use serde::Deserialize;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use url::Url;

/// Fraction of the advertised token lifetime we trust before refreshing.
const TOKEN_LIFETIME_FACTOR: f64 = 0.9;

#[derive(Debug, Default)]
struct CredentialState {
    access_token: Option<String>,
    expires_at: Option<Instant>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

/// Produces the `Authorization` header for outgoing requests.
///
/// In OAuth mode the access token is cached until 90% of its advertised
/// lifetime has elapsed. Token acquisition is not serialized: two callers
/// that both observe an expired token will both request a new one, and the
/// last response to arrive wins the cache.
#[derive(Debug)]
pub struct Authenticator {
    http: Client,
    token_url: Url,
    method: AuthMethod,
    oauth: OAuthCredentials,
    basic: BasicCredentials,
    timeout: Duration,
    state: RwLock<CredentialState>,
}

impl Authenticator {
    pub fn new(http: Client, config: &ClientConfig) -> Result<Self, url::ParseError> {
        let base = config.base_url.as_str().trim_end_matches('/');
        let token_url = Url::parse(&format!("{}/oauth_token.do", base))?;

        Ok(Self {
            http,
            token_url,
            method: config.auth_method,
            oauth: config.oauth.clone().unwrap_or_default(),
            basic: config.basic.clone().unwrap_or_default(),
            timeout: config.timeout,
            state: RwLock::new(CredentialState::default()),
        })
    }

    pub fn method(&self) -> AuthMethod {
        self.method
    }

    fn cached_token(&self) -> Option<String> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        match (&state.access_token, state.expires_at) {
            (Some(token), Some(expires_at)) if Instant::now() < expires_at => Some(token.clone()),
            _ => None,
        }
    }

    /// Make sure a usable credential is available.
    ///
    /// A no-op for Basic authentication and for a still-valid OAuth token.
    pub async fn ensure_authenticated(&self) -> NowResult<()> {
        if self.method == AuthMethod::Basic || self.cached_token().is_some() {
            return Ok(());
        }

        let (client_id, client_secret) =
            match (&self.oauth.client_id, &self.oauth.client_secret) {
                (Some(id), Some(secret)) => (id, secret),
                _ => {
                    return Err(NowError::authentication(
                        "OAuth client ID and secret are required for OAuth authentication",
                    ))
                }
            };
        let (username, password) = match (&self.oauth.username, &self.oauth.password) {
            (Some(user), Some(pass)) => (user, pass),
            _ => {
                return Err(NowError::authentication(
                    "Username and password are required for OAuth password grant",
                ))
            }
        };

        debug!(url = %self.token_url, "Requesting OAuth access token");

        let form = [
            ("grant_type", "password"),
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.as_str()),
            ("username", username.as_str()),
            ("password", password.as_str()),
        ];

        let response = self
            .http
            .post(self.token_url.clone())
            .timeout(self.timeout)
            .form(&form)
            .send()
            .await
            .map_err(|e| NowError::authentication(format!("OAuth authentication failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NowError::authentication(format!(
                "OAuth authentication failed: HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            NowError::authentication(format!("OAuth authentication failed: {}", e))
        })?;

        let lifetime = Duration::from_secs_f64(token.expires_in as f64 * TOKEN_LIFETIME_FACTOR);
        {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            state.access_token = Some(token.access_token);
            state.expires_at = Some(Instant::now() + lifetime);
        }

        info!(expires_in = token.expires_in, "Successfully authenticated with OAuth");
        Ok(())
    }

    /// Build the `Authorization` header value for one request.
    pub fn authorization_header(&self) -> NowResult<String> {
        match self.method {
            AuthMethod::Basic => match (&self.basic.username, &self.basic.password) {
                (Some(user), Some(pass)) => Ok(format!(
                    "Basic {}",
                    STANDARD.encode(format!("{}:{}", user, pass))
                )),
                _ => Err(NowError::authentication(
                    "Username and password are required for Basic authentication",
                )),
            },
            AuthMethod::OAuth => {
                let state = self.state.read().unwrap_or_else(|e| e.into_inner());
                state
                    .access_token
                    .as_ref()
                    .map(|token| format!("Bearer {}", token))
                    .ok_or_else(|| {
                        NowError::authentication("OAuth token not available. Call ensure_authenticated first.")
                    })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nowbridge_core::ErrorKind;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn oauth_config(base_url: &str) -> ClientConfig {
        let mut config = ClientConfig::new(Url::parse(base_url).unwrap());
        config.oauth = Some(OAuthCredentials {
            client_id: Some("client".to_string()),
            client_secret: Some("secret".to_string()),
            username: Some("admin".to_string()),
            password: Some("hunter2".to_string()),
        });
        config
    }

    #[test]
    fn test_basic_header() {
        let mut config = ClientConfig::new(Url::parse("https://dev.service-now.com").unwrap());
        config.auth_method = AuthMethod::Basic;
        config.basic = Some(BasicCredentials {
            username: Some("admin".to_string()),
            password: Some("secret".to_string()),
        });
        let auth = Authenticator::new(Client::new(), &config).unwrap();

        assert_eq!(auth.authorization_header().unwrap(), "Basic YWRtaW46c2VjcmV0");
    }

    #[test]
    fn test_basic_without_credentials_fails_at_header_time() {
        let mut config = ClientConfig::new(Url::parse("https://dev.service-now.com").unwrap());
        config.auth_method = AuthMethod::Basic;
        let auth = Authenticator::new(Client::new(), &config).unwrap();

        let err = auth.authorization_header().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);
    }

    #[tokio::test]
    async fn test_basic_ensure_is_noop() {
        let mut config = ClientConfig::new(Url::parse("http://127.0.0.1:9").unwrap());
        config.auth_method = AuthMethod::Basic;
        let auth = Authenticator::new(Client::new(), &config).unwrap();

        assert!(auth.ensure_authenticated().await.is_ok());
    }

    #[tokio::test]
    async fn test_oauth_token_is_cached() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth_token.do"))
            .and(body_string_contains("grant_type=password"))
            .and(body_string_contains("username=admin"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok-123",
                "expires_in": 1800
            })))
            .expect(1)
            .mount(&server)
            .await;

        let auth = Authenticator::new(Client::new(), &oauth_config(&server.uri())).unwrap();

        auth.ensure_authenticated().await.unwrap();
        auth.ensure_authenticated().await.unwrap();
        assert_eq!(auth.authorization_header().unwrap(), "Bearer tok-123");
    }

    #[tokio::test]
    async fn test_oauth_failure_is_not_cached() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth_token.do"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid_grant"))
            .expect(2)
            .mount(&server)
            .await;

        let auth = Authenticator::new(Client::new(), &oauth_config(&server.uri())).unwrap();

        for _ in 0..2 {
            let err = auth.ensure_authenticated().await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);
        }
        assert!(auth.authorization_header().is_err());
    }

    #[tokio::test]
    async fn test_oauth_missing_client_credentials_fails_fast() {
        let mut config = ClientConfig::new(Url::parse("http://127.0.0.1:9").unwrap());
        config.oauth = Some(OAuthCredentials {
            username: Some("admin".to_string()),
            password: Some("pw".to_string()),
            ..Default::default()
        });
        let auth = Authenticator::new(Client::new(), &config).unwrap();

        let err = auth.ensure_authenticated().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);
        assert_eq!(
            err.message(),
            "OAuth client ID and secret are required for OAuth authentication"
        );
    }

    #[tokio::test]
    async fn test_oauth_missing_user_credentials_fails_fast() {
        let mut config = ClientConfig::new(Url::parse("http://127.0.0.1:9").unwrap());
        config.oauth = Some(OAuthCredentials {
            client_id: Some("client".to_string()),
            client_secret: Some("secret".to_string()),
            ..Default::default()
        });
        let auth = Authenticator::new(Client::new(), &config).unwrap();

        let err = auth.ensure_authenticated().await.unwrap_err();
        assert_eq!(
            err.message(),
            "Username and password are required for OAuth password grant"
        );
    }
}
