//! Aggregate API endpoints.

use super::Envelope;
use crate::client::NowClient;
use nowbridge_core::{ErrorKind, NowResult};
use reqwest::Method;
use serde_json::Value;
use tracing::info;

/// Stats API for grouped counts.
pub struct StatsApi<'a> {
    client: &'a NowClient,
}

impl<'a> StatsApi<'a> {
    pub(crate) fn new(client: &'a NowClient) -> Self {
        Self { client }
    }

    /// Group `table` by `group_by` and count each bucket.
    ///
    /// The stats endpoint is always asked for counts; `aggregate` is only
    /// recorded in the log.
    pub async fn aggregate(
        &self,
        table: &str,
        group_by: &str,
        aggregate: &str,
        query: Option<&str>,
    ) -> NowResult<Value> {
        self.client.ensure_authenticated().await?;

        info!(table, group_by, aggregate, "Running aggregate query");

        let mut params = vec![("sysparm_group_by".to_string(), group_by.to_string())];
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            params.push(("sysparm_query".to_string(), query.to_string()));
        }
        params.push(("sysparm_count".to_string(), "true".to_string()));

        let envelope: Envelope<Value> = self
            .client
            .send(Method::GET, &format!("/api/now/stats/{}", table), &params, None)
            .await
            .map_err(|e| e.into_now_error(ErrorKind::QueryFailed, "Aggregate query failed"))?;

        Ok(envelope.result)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::client;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_aggregate_by_priority() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/now/stats/incident"))
            .and(query_param("sysparm_group_by", "priority"))
            .and(query_param("sysparm_query", "active=true"))
            .and(query_param("sysparm_count", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [
                    {"stats": {"count": "4"}, "groupby_fields": [{"field": "priority", "value": "1"}]},
                    {"stats": {"count": "9"}, "groupby_fields": [{"field": "priority", "value": "3"}]}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = client(&server.uri())
            .stats()
            .aggregate("incident", "priority", "COUNT", Some("active=true"))
            .await
            .unwrap();

        assert_eq!(result.as_array().map(Vec::len), Some(2));
        assert_eq!(result[1]["stats"]["count"], "9");
    }
}
