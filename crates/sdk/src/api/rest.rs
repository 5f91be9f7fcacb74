//! Scripted REST, AI and catalog endpoints outside the Table API.

use crate::client::NowClient;
use nowbridge_core::{ErrorKind, NowResult};
use reqwest::Method;
use serde_json::Value;
use tracing::info;

/// Generic REST API. Responses are returned as-is, without unwrapping
/// the `result` envelope.
pub struct RestApi<'a> {
    client: &'a NowClient,
}

impl<'a> RestApi<'a> {
    pub(crate) fn new(client: &'a NowClient) -> Self {
        Self { client }
    }

    /// POST a JSON payload to an instance-relative endpoint, which may
    /// carry its own query string.
    pub async fn post(&self, endpoint: &str, payload: &Value) -> NowResult<Value> {
        self.post_with_query(endpoint, &[], payload).await
    }

    /// Like [`post`](Self::post), with form-encoded query parameters.
    pub async fn post_with_query(
        &self,
        endpoint: &str,
        params: &[(String, String)],
        payload: &Value,
    ) -> NowResult<Value> {
        self.client.ensure_authenticated().await?;

        info!(endpoint, "Calling REST endpoint");

        self.client
            .send(Method::POST, endpoint, params, Some(payload))
            .await
            .map_err(|e| e.into_now_error(ErrorKind::ApiError, "REST call failed"))
    }
}
