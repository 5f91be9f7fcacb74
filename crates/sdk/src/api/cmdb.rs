//! CMDB and ITOM endpoints.

use super::{Envelope, QueryResponse};
use crate::client::NowClient;
use crate::error::TransportError;
use crate::query::{QueryDescriptor, DEFAULT_LIMIT, MAX_CMDB_CI_LIMIT};
use nowbridge_core::{ErrorKind, NowResult, Record};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::info;

/// CMDB API for configuration items and their surroundings.
pub struct CmdbApi<'a> {
    client: &'a NowClient,
}

impl<'a> CmdbApi<'a> {
    pub(crate) fn new(client: &'a NowClient) -> Self {
        Self { client }
    }

    /// Search configuration items. The limit is clamped to 100.
    pub async fn search_ci(&self, query: Option<&str>, limit: Option<u32>) -> NowResult<QueryResponse> {
        self.client.ensure_authenticated().await?;

        info!("Searching CMDB CIs");

        let descriptor = QueryDescriptor::new("cmdb_ci")
            .query_opt(query)
            .limit_opt(limit);
        let records = self
            .client
            .fetch(&descriptor, MAX_CMDB_CI_LIMIT)
            .await
            .map_err(|e| e.into_now_error(ErrorKind::QueryFailed, "Failed to search CMDB CIs"))?;

        Ok(QueryResponse::from(records))
    }

    /// Fetch one configuration item.
    pub async fn get_ci(&self, sys_id: &str, fields: Option<&str>) -> NowResult<Record> {
        self.client.table().get("cmdb_ci", sys_id, fields).await
    }

    /// Relationships where the CI is either parent or child.
    pub async fn relationships(&self, ci_sys_id: &str) -> NowResult<RelationshipList> {
        self.client.ensure_authenticated().await?;

        info!(ci = ci_sys_id, "Listing relationships");

        let relationships = self
            .related(ci_sys_id)
            .await
            .map_err(|e| e.into_now_error(ErrorKind::QueryFailed, "Failed to list relationships"))?;

        Ok(RelationshipList {
            count: relationships.len(),
            relationships,
        })
    }

    pub async fn discovery_schedules(&self, active_only: bool) -> NowResult<ScheduleList> {
        self.client.ensure_authenticated().await?;

        info!(active_only, "Listing discovery schedules");

        let schedules = self
            .client
            .list("discovery_schedule", &filter_params(active_only.then_some("active=true")))
            .await
            .map_err(|e| {
                e.into_now_error(ErrorKind::QueryFailed, "Failed to list discovery schedules")
            })?;

        Ok(ScheduleList {
            count: schedules.len(),
            schedules,
        })
    }

    /// MID servers; `active_only` keeps those whose status is `Up`.
    pub async fn mid_servers(&self, active_only: bool) -> NowResult<MidServerList> {
        self.client.ensure_authenticated().await?;

        info!(active_only, "Listing MID servers");

        let mid_servers = self
            .client
            .list("ecc_agent", &filter_params(active_only.then_some("status=Up")))
            .await
            .map_err(|e| e.into_now_error(ErrorKind::QueryFailed, "Failed to list MID servers"))?;

        Ok(MidServerList {
            count: mid_servers.len(),
            mid_servers,
        })
    }

    /// Event management events. The limit is passed through unclamped.
    pub async fn active_events(&self, query: Option<&str>, limit: Option<u32>) -> NowResult<QueryResponse> {
        self.client.ensure_authenticated().await?;

        info!("Listing active events");

        let mut params = filter_params(query);
        params.push((
            "sysparm_limit".to_string(),
            limit.unwrap_or(DEFAULT_LIMIT).to_string(),
        ));
        let records = self
            .client
            .list("em_event", &params)
            .await
            .map_err(|e| e.into_now_error(ErrorKind::QueryFailed, "Failed to list events"))?;

        Ok(QueryResponse::from(records))
    }

    /// Attribute completeness for servers and network adapters.
    pub async fn health_dashboard(&self) -> NowResult<CmdbHealth> {
        self.client.ensure_authenticated().await?;

        info!("Getting CMDB health metrics");

        let context = "Failed to get CMDB health";
        let servers = self
            .client
            .list(
                "cmdb_ci_server",
                &[(
                    "sysparm_fields".to_string(),
                    "sys_id,ip_address,os,serial_number".to_string(),
                )],
            )
            .await
            .map_err(|e| e.into_now_error(ErrorKind::QueryFailed, context))?;
        let adapters = self
            .client
            .list(
                "cmdb_ci_network_adapter",
                &[
                    (
                        "sysparm_fields".to_string(),
                        "sys_id,ip_address,mac_address".to_string(),
                    ),
                    ("sysparm_limit".to_string(), "100".to_string()),
                ],
            )
            .await
            .map_err(|e| e.into_now_error(ErrorKind::QueryFailed, context))?;

        let total = servers.len();
        let with_ip = count_with(&servers, "ip_address");
        let with_os = count_with(&servers, "os");
        let with_serial = count_with(&servers, "serial_number");
        let server_metrics = ServerMetrics {
            total,
            with_ip,
            with_os,
            with_serial,
            ip_completeness: completeness(with_ip, total),
            os_completeness: completeness(with_os, total),
        };

        let total = adapters.len();
        let with_ip = count_with(&adapters, "ip_address");
        let with_mac = count_with(&adapters, "mac_address");
        let network_metrics = NetworkMetrics {
            total,
            with_ip,
            with_mac,
            ip_completeness: completeness(with_ip, total),
            mac_completeness: completeness(with_mac, total),
        };

        Ok(CmdbHealth {
            server_metrics,
            network_metrics,
        })
    }

    /// A business service with the CIs related to it.
    pub async fn service_mapping_summary(&self, service_sys_id: &str) -> NowResult<ServiceMapping> {
        self.client.ensure_authenticated().await?;

        info!(service = service_sys_id, "Getting service mapping summary");

        let context = "Failed to get service mapping";
        let service: Envelope<Record> = self
            .client
            .send(
                Method::GET,
                &format!("/api/now/table/cmdb_ci_service/{}", service_sys_id),
                &[],
                None,
            )
            .await
            .map_err(|e| e.into_now_error(ErrorKind::QueryFailed, context))?;
        let related_cis = self
            .related(service_sys_id)
            .await
            .map_err(|e| e.into_now_error(ErrorKind::QueryFailed, context))?;

        Ok(ServiceMapping {
            service: service.result,
            related_cis_count: related_cis.len(),
            related_cis,
        })
    }

    async fn related(&self, sys_id: &str) -> Result<Vec<Record>, TransportError> {
        self.client
            .list(
                "cmdb_rel_ci",
                &filter_params(Some(format!("parent={}^ORchild={}", sys_id, sys_id))),
            )
            .await
    }
}

fn filter_params<S: Into<String>>(query: Option<S>) -> Vec<(String, String)> {
    query
        .map(Into::into)
        .filter(|q: &String| !q.is_empty())
        .map(|q| vec![("sysparm_query".to_string(), q)])
        .unwrap_or_default()
}

fn count_with(records: &[Record], field: &str) -> usize {
    records
        .iter()
        .filter(|r| r.get(field).map(|v| v.is_truthy()).unwrap_or(false))
        .count()
}

/// Percentage of `n` in `total` with two decimals, or `"0"` for an empty set.
pub fn completeness(n: usize, total: usize) -> String {
    if total == 0 {
        return "0".to_string();
    }
    format!("{:.2}", n as f64 / total as f64 * 100.0)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipList {
    pub count: usize,
    pub relationships: Vec<Record>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleList {
    pub count: usize,
    pub schedules: Vec<Record>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MidServerList {
    pub count: usize,
    pub mid_servers: Vec<Record>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CmdbHealth {
    pub server_metrics: ServerMetrics,
    pub network_metrics: NetworkMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerMetrics {
    pub total: usize,
    pub with_ip: usize,
    pub with_os: usize,
    pub with_serial: usize,
    pub ip_completeness: String,
    pub os_completeness: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkMetrics {
    pub total: usize,
    pub with_ip: usize,
    pub with_mac: usize,
    pub ip_completeness: String,
    pub mac_completeness: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceMapping {
    pub service: Record,
    pub related_cis_count: usize,
    pub related_cis: Vec<Record>,
}

#[cfg(test)]
mod tests {
    use super::super::test_support::client;
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_completeness() {
        assert_eq!(completeness(0, 0), "0");
        assert_eq!(completeness(3, 4), "75.00");
        assert_eq!(completeness(1, 3), "33.33");
        assert_eq!(completeness(2, 2), "100.00");
    }

    #[tokio::test]
    async fn test_search_ci_clamps_to_100() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/now/table/cmdb_ci"))
            .and(query_param("sysparm_limit", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": []})))
            .expect(1)
            .mount(&server)
            .await;

        let result = client(&server.uri())
            .cmdb()
            .search_ci(None, Some(500))
            .await
            .unwrap();
        assert_eq!(result.count, 0);
    }

    #[tokio::test]
    async fn test_search_ci_default_limit() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/now/table/cmdb_ci"))
            .and(query_param("sysparm_limit", "10"))
            .and(query_param("sysparm_query", "nameLIKEweb"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [{"name": "web01"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = client(&server.uri())
            .cmdb()
            .search_ci(Some("nameLIKEweb"), None)
            .await
            .unwrap();
        assert_eq!(result.count, 1);
    }

    #[tokio::test]
    async fn test_mid_servers_filter() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/now/table/ecc_agent"))
            .and(query_param("sysparm_query", "status=Up"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [{"name": "mid1", "status": "Up"}]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/now/table/discovery_schedule"))
            .and(query_param_is_missing("sysparm_query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": []})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server.uri());
        let mids = client.cmdb().mid_servers(true).await.unwrap();
        assert_eq!(mids.count, 1);

        let schedules = client.cmdb().discovery_schedules(false).await.unwrap();
        assert_eq!(schedules.count, 0);
    }

    #[tokio::test]
    async fn test_health_dashboard() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/now/table/cmdb_ci_server"))
            .and(query_param("sysparm_fields", "sys_id,ip_address,os,serial_number"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [
                    {"sys_id": "1", "ip_address": "10.0.0.1", "os": "Linux", "serial_number": ""},
                    {"sys_id": "2", "ip_address": "", "os": "Windows", "serial_number": "SN2"},
                    {"sys_id": "3", "ip_address": "10.0.0.3", "os": "Linux", "serial_number": ""},
                    {"sys_id": "4", "ip_address": "10.0.0.4", "os": "", "serial_number": ""}
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/now/table/cmdb_ci_network_adapter"))
            .and(query_param("sysparm_limit", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": []})))
            .mount(&server)
            .await;

        let health = client(&server.uri()).cmdb().health_dashboard().await.unwrap();

        assert_eq!(health.server_metrics.total, 4);
        assert_eq!(health.server_metrics.with_ip, 3);
        assert_eq!(health.server_metrics.with_serial, 1);
        assert_eq!(health.server_metrics.ip_completeness, "75.00");
        assert_eq!(health.server_metrics.os_completeness, "75.00");
        assert_eq!(health.network_metrics.total, 0);
        assert_eq!(health.network_metrics.mac_completeness, "0");
    }

    #[tokio::test]
    async fn test_service_mapping_summary() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/now/table/cmdb_ci_service/svc1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {"sys_id": "svc1", "name": "Email"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/now/table/cmdb_rel_ci"))
            .and(query_param("sysparm_query", "parent=svc1^ORchild=svc1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [{"sys_id": "r1"}, {"sys_id": "r2"}]
            })))
            .mount(&server)
            .await;

        let summary = client(&server.uri())
            .cmdb()
            .service_mapping_summary("svc1")
            .await
            .unwrap();

        assert_eq!(summary.service["name"].as_str(), Some("Email"));
        assert_eq!(summary.related_cis_count, 2);
    }
}
