// Server configuration: optional TOML file, overridden by environment variables

use anyhow::{anyhow, Context, Result};
use nowbridge_core::Capabilities;
use nowbridge_sdk::{
    AuthMethod, BasicCredentials, ClientConfig, NowClient, OAuthCredentials, RetryConfig,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::tools::context::DEFAULT_AGILE_TABLE_PREFIX;
use crate::tools::ToolContext;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McpConfig {
    #[serde(default)]
    pub instance: InstanceConfig,

    #[serde(default)]
    pub capabilities: Capabilities,

    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Connection settings for the ServiceNow instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceConfig {
    pub url: Option<String>,

    #[serde(default = "default_auth_method")]
    pub auth_method: String,

    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub basic_username: Option<String>,
    pub basic_password: Option<String>,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Tool package to expose; `None` or `full` exposes everything.
    pub package: Option<String>,

    #[serde(default = "default_agile_table_prefix")]
    pub agile_table_prefix: String,
}

fn default_auth_method() -> String {
    "oauth".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_agile_table_prefix() -> String {
    DEFAULT_AGILE_TABLE_PREFIX.to_string()
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            url: None,
            auth_method: default_auth_method(),
            client_id: None,
            client_secret: None,
            username: None,
            password: None,
            basic_username: None,
            basic_password: None,
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            package: None,
            agile_table_prefix: default_agile_table_prefix(),
        }
    }
}

impl McpConfig {
    /// Load the file (if any) and apply the process environment on top.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        Self::load_with(config_path, |key| std::env::var(key).ok())
    }

    /// Like [`load`](Self::load) with an explicit variable lookup.
    pub fn load_with<F>(config_path: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match config_path {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(path).with_context(|| {
                    format!("Failed to read configuration file {}", path.display())
                })?;
                toml::from_str(&content).with_context(|| {
                    format!("Failed to parse configuration file {}", path.display())
                })?
            }
            Some(path) => {
                tracing::info!(path = %path.display(), "Configuration file not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_env(lookup)?;
        Ok(config)
    }

    /// Override file values with any variables that are set.
    fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let instance = &mut self.instance;
        set_opt(&mut instance.url, var("SERVICENOW_INSTANCE_URL"));
        if let Some(method) = var("SERVICENOW_AUTH_METHOD") {
            instance.auth_method = method;
        }
        set_opt(&mut instance.client_id, var("SERVICENOW_CLIENT_ID"));
        set_opt(&mut instance.client_secret, var("SERVICENOW_CLIENT_SECRET"));
        set_opt(&mut instance.username, var("SERVICENOW_USERNAME"));
        set_opt(&mut instance.password, var("SERVICENOW_PASSWORD"));
        set_opt(&mut instance.basic_username, var("SERVICENOW_BASIC_USERNAME"));
        set_opt(&mut instance.basic_password, var("SERVICENOW_BASIC_PASSWORD"));
        if let Some(v) = var("SERVICENOW_MAX_RETRIES") {
            instance.max_retries = parse_number("SERVICENOW_MAX_RETRIES", &v)?;
        }
        if let Some(v) = var("SERVICENOW_RETRY_DELAY_MS") {
            instance.retry_delay_ms = parse_number("SERVICENOW_RETRY_DELAY_MS", &v)?;
        }
        if let Some(v) = var("SERVICENOW_REQUEST_TIMEOUT_MS") {
            instance.request_timeout_ms = parse_number("SERVICENOW_REQUEST_TIMEOUT_MS", &v)?;
        }

        self.capabilities.apply_lookup(&var);

        set_opt(&mut self.tools.package, var("MCP_TOOL_PACKAGE"));
        if let Some(prefix) = var("AGILE_TABLE_PREFIX") {
            self.tools.agile_table_prefix = prefix;
        }

        Ok(())
    }

    pub fn auth_method(&self) -> Result<AuthMethod> {
        self.instance
            .auth_method
            .parse()
            .map_err(|e: String| anyhow!("SERVICENOW_AUTH_METHOD: {}", e))
    }

    /// SDK client configuration. Missing credentials are reported on the
    /// first request, not here.
    pub fn client_config(&self) -> Result<ClientConfig> {
        let raw_url = self
            .instance
            .url
            .as_deref()
            .ok_or_else(|| anyhow!("SERVICENOW_INSTANCE_URL is required"))?;
        let base_url = Url::parse(raw_url)
            .with_context(|| format!("Invalid SERVICENOW_INSTANCE_URL '{}'", raw_url))?;

        let instance = &self.instance;
        let mut config = ClientConfig::new(base_url);
        config.auth_method = self.auth_method()?;
        // 0 means "unset", not "time out immediately"
        let timeout_ms = match instance.request_timeout_ms {
            0 => default_request_timeout_ms(),
            ms => ms,
        };
        config.timeout = Duration::from_millis(timeout_ms);
        config.retry_config = RetryConfig {
            max_retries: instance.max_retries,
            initial_backoff: Duration::from_millis(instance.retry_delay_ms),
            ..RetryConfig::default()
        };

        match config.auth_method {
            AuthMethod::OAuth => {
                config.oauth = Some(OAuthCredentials {
                    client_id: instance.client_id.clone(),
                    client_secret: instance.client_secret.clone(),
                    username: instance.username.clone(),
                    password: instance.password.clone(),
                });
            }
            AuthMethod::Basic => {
                config.basic = Some(BasicCredentials {
                    username: instance.basic_username.clone().or_else(|| instance.username.clone()),
                    password: instance.basic_password.clone().or_else(|| instance.password.clone()),
                });
            }
        }

        Ok(config)
    }

    /// Build the client and the context every tool call receives.
    pub fn tool_context(&self) -> Result<ToolContext> {
        let client = NowClient::new(self.client_config()?)
            .map_err(|e| anyhow!("Failed to create ServiceNow client: {}", e))?;
        Ok(ToolContext::new(client, self.capabilities)
            .with_agile_table_prefix(self.tools.agile_table_prefix.clone()))
    }
}

fn set_opt(target: &mut Option<String>, value: Option<String>) {
    if value.is_some() {
        *target = value;
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| anyhow!("{} must be a non-negative integer, got '{}'", key, value))
}
