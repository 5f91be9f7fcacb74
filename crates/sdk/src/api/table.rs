//! Table API: generic record CRUD.

use super::Envelope;
use crate::client::NowClient;
use crate::query::{QueryDescriptor, MAX_QUERY_LIMIT};
use nowbridge_core::{ErrorKind, NowResult, Record};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

/// Table API for reading and writing records in any table.
pub struct TableApi<'a> {
    client: &'a NowClient,
}

impl<'a> TableApi<'a> {
    pub(crate) fn new(client: &'a NowClient) -> Self {
        Self { client }
    }

    /// Query records. The limit is clamped to 1000.
    pub async fn query(&self, descriptor: QueryDescriptor) -> NowResult<QueryResponse> {
        self.client.ensure_authenticated().await?;

        info!(table = %descriptor.table, "Querying table");
        debug!(query = descriptor.query.as_deref().unwrap_or("none"), "Query");

        let records = self
            .client
            .fetch(&descriptor, MAX_QUERY_LIMIT)
            .await
            .map_err(|e| e.into_now_error(ErrorKind::QueryFailed, "Failed to query records"))?;

        Ok(QueryResponse::from(records))
    }

    /// Fetch a single record by sys_id.
    pub async fn get(&self, table: &str, sys_id: &str, fields: Option<&str>) -> NowResult<Record> {
        self.client.ensure_authenticated().await?;

        info!(table, sys_id, "Getting record");

        let params: Vec<(String, String)> = fields
            .filter(|f| !f.is_empty())
            .map(|f| vec![("sysparm_fields".to_string(), f.to_string())])
            .unwrap_or_default();

        let envelope: Envelope<Record> = self
            .client
            .send(
                Method::GET,
                &format!("/api/now/table/{}/{}", table, sys_id),
                &params,
                None,
            )
            .await
            .map_err(|e| e.into_now_error(ErrorKind::QueryFailed, "Failed to get record"))?;

        Ok(envelope.result)
    }

    /// Create a record.
    pub async fn create(&self, table: &str, data: &Value) -> NowResult<Record> {
        self.client.ensure_authenticated().await?;

        info!(table, "Creating record");

        let envelope: Envelope<Record> = self
            .client
            .send(Method::POST, &format!("/api/now/table/{}", table), &[], Some(data))
            .await
            .map_err(|e| {
                e.into_now_error(
                    ErrorKind::CreateFailed,
                    &format!("Failed to create record in {}", table),
                )
            })?;

        Ok(envelope.result)
    }

    /// Partially update a record.
    pub async fn update(&self, table: &str, sys_id: &str, data: &Value) -> NowResult<Record> {
        self.client.ensure_authenticated().await?;

        info!(table, sys_id, "Updating record");

        let envelope: Envelope<Record> = self
            .client
            .send(
                Method::PATCH,
                &format!("/api/now/table/{}/{}", table, sys_id),
                &[],
                Some(data),
            )
            .await
            .map_err(|e| {
                e.into_now_error(
                    ErrorKind::UpdateFailed,
                    &format!("Failed to update record {} in {}", sys_id, table),
                )
            })?;

        Ok(envelope.result)
    }

    /// Delete a record.
    pub async fn delete(&self, table: &str, sys_id: &str) -> NowResult<()> {
        self.client.ensure_authenticated().await?;

        info!(table, sys_id, "Deleting record");

        let _: Value = self
            .client
            .send(
                Method::DELETE,
                &format!("/api/now/table/{}/{}", table, sys_id),
                &[],
                None,
            )
            .await
            .map_err(|e| {
                e.into_now_error(
                    ErrorKind::DeleteFailed,
                    &format!("Failed to delete record {} from {}", sys_id, table),
                )
            })?;

        Ok(())
    }

    /// Infer a table's columns from one sample row.
    ///
    /// This is a heuristic: only fields present on the sampled record are
    /// reported, and an empty table yields no columns.
    pub async fn schema(&self, table: &str) -> NowResult<TableSchema> {
        self.client.ensure_authenticated().await?;

        info!(table, "Getting table schema");

        let params = [
            ("sysparm_exclude_reference_link".to_string(), "true".to_string()),
            ("sysparm_limit".to_string(), "1".to_string()),
        ];
        let records = self
            .client
            .list(table, &params)
            .await
            .map_err(|e| e.into_now_error(ErrorKind::QueryFailed, "Failed to get table schema"))?;

        let columns = records
            .into_iter()
            .next()
            .map(|sample| {
                sample
                    .into_iter()
                    .map(|(element, value_sample)| ColumnInfo {
                        element,
                        value_sample,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(TableSchema {
            table: table.to_string(),
            columns,
        })
    }
}

/// Records returned by a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub count: usize,
    pub records: Vec<Record>,
}

impl From<Vec<Record>> for QueryResponse {
    fn from(records: Vec<Record>) -> Self {
        Self {
            count: records.len(),
            records,
        }
    }
}

/// Columns inferred from a sample record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    pub table: String,
    pub columns: Vec<ColumnInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub element: String,
    pub value_sample: nowbridge_core::FieldValue,
}
