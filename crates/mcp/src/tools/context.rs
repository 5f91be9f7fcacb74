// Shared state handed to every tool call, plus small result helpers

use nowbridge_core::{is_sys_id, Capabilities, ErrorKind, NowError, NowResult, Record};
use nowbridge_sdk::{NowClient, QueryDescriptor};
use serde::Serialize;
use serde_json::{Map, Value};

pub const DEFAULT_AGILE_TABLE_PREFIX: &str = "rm_";

/// Everything a tool handler may use.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub client: NowClient,
    pub capabilities: Capabilities,
    /// User the server acts as; scopes "my tasks" and "my approvals".
    pub username: Option<String>,
    /// Table prefix for the agile tables (`rm_story`, `rm_epic`, ...).
    pub agile_table_prefix: String,
}

impl ToolContext {
    pub fn new(client: NowClient, capabilities: Capabilities) -> Self {
        let username = client.config().username().map(str::to_string);
        Self {
            client,
            capabilities,
            username,
            agile_table_prefix: DEFAULT_AGILE_TABLE_PREFIX.to_string(),
        }
    }

    pub fn with_agile_table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.agile_table_prefix = prefix.into();
        self
    }

    pub fn agile_table(&self, name: &str) -> String {
        format!("{}{}", self.agile_table_prefix, name)
    }

    /// Fetch a record by sys_id, or by `number` when the identifier is not
    /// a sys_id. `label` names the record type in the not-found message.
    pub async fn get_by_number_or_sys_id(
        &self,
        table: &str,
        identifier: &str,
        label: &str,
    ) -> NowResult<Value> {
        self.get_by_field_or_sys_id(table, "number", identifier, label)
            .await
    }

    /// Like [`get_by_number_or_sys_id`](Self::get_by_number_or_sys_id) with
    /// an arbitrary lookup field.
    pub async fn get_by_field_or_sys_id(
        &self,
        table: &str,
        field: &str,
        identifier: &str,
        label: &str,
    ) -> NowResult<Value> {
        if is_sys_id(identifier) {
            return to_json(self.client.table().get(table, identifier, None).await?);
        }
        self.first_match(
            table,
            format!("{}={}", field, identifier),
            format!("{} not found: {}", label, identifier),
        )
        .await
    }

    /// First record matching `query`, or NOT_FOUND with `not_found`.
    pub async fn first_match(&self, table: &str, query: String, not_found: String) -> NowResult<Value> {
        let response = self
            .client
            .table()
            .query(QueryDescriptor::new(table).query(query).limit(1))
            .await?;
        match response.records.into_iter().next() {
            Some(record) => to_json(record),
            None => Err(NowError::not_found(not_found)),
        }
    }

    /// Update a record and attach a summary to the result.
    pub async fn update_with_summary(
        &self,
        table: &str,
        sys_id: &str,
        data: &Value,
        summary: String,
    ) -> NowResult<Value> {
        let record = self.client.table().update(table, sys_id, data).await?;
        with_summary(record, summary)
    }

    /// Query a table and return `{count, <key>: [...]}`.
    pub async fn list_as(&self, descriptor: QueryDescriptor, key: &str) -> NowResult<Value> {
        let response = self.client.table().query(descriptor).await?;
        let mut out = Map::new();
        out.insert("count".to_string(), Value::from(response.count));
        out.insert(key.to_string(), to_json(response.records)?);
        Ok(Value::Object(out))
    }
}

/// Serialize a result for the caller.
pub fn to_json<T: Serialize>(value: T) -> NowResult<Value> {
    serde_json::to_value(value)
        .map_err(|e| NowError::new(ErrorKind::ApiError, format!("Failed to serialize result: {}", e)))
}

/// A record with a human-readable `summary` field added.
pub fn with_summary(record: Record, summary: String) -> NowResult<Value> {
    Ok(summarize(to_json(record)?, summary))
}

/// Attach a `summary` to a raw response. Non-object responses are wrapped
/// as `{result, summary}`.
pub fn summarize(value: Value, summary: String) -> Value {
    match value {
        Value::Object(mut map) => {
            map.insert("summary".to_string(), Value::String(summary));
            Value::Object(map)
        }
        other => serde_json::json!({ "result": other, "summary": summary }),
    }
}

/// The record's `number`, falling back to its `sys_id`.
pub fn record_label(record: &Record) -> String {
    ["number", "sys_id"]
        .iter()
        .find_map(|field| record.get(*field).and_then(|v| v.as_str()).filter(|s| !s.is_empty()))
        .unwrap_or_default()
        .to_string()
}

/// Current time as an ISO-8601 UTC timestamp.
pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use nowbridge_sdk::RetryConfig;

    /// Basic-auth context against `uri`, acting as `admin`, no retries.
    pub(crate) fn test_context(uri: &str, capabilities: Capabilities) -> ToolContext {
        let client = NowClient::builder()
            .base_url(uri)
            .basic_auth("admin", "secret")
            .retry_config(RetryConfig::no_retry())
            .build()
            .unwrap();
        ToolContext::new(client, capabilities)
    }

    #[test]
    fn test_context_defaults() {
        let ctx = test_context("http://127.0.0.1:9", Capabilities::default());
        assert_eq!(ctx.username.as_deref(), Some("admin"));
        assert_eq!(ctx.agile_table("story"), "rm_story");

        let ctx = ctx.with_agile_table_prefix("x_agile_");
        assert_eq!(ctx.agile_table("epic"), "x_agile_epic");
    }

    #[test]
    fn test_record_label_and_summary() {
        let mut record = Record::new();
        record.insert("sys_id".to_string(), "abc".into());
        assert_eq!(record_label(&record), "abc");

        record.insert("number".to_string(), "INC0010001".into());
        assert_eq!(record_label(&record), "INC0010001");

        let value = with_summary(record, "Created incident INC0010001".to_string()).unwrap();
        assert_eq!(value["summary"], "Created incident INC0010001");
        assert_eq!(value["sys_id"], "abc");
    }

    #[test]
    fn test_summarize_wraps_non_objects() {
        let value = summarize(serde_json::json!({"a": 1}), "ok".to_string());
        assert_eq!(value["a"], 1);
        assert_eq!(value["summary"], "ok");

        let value = summarize(Value::Null, "ran".to_string());
        assert!(value["result"].is_null());
        assert_eq!(value["summary"], "ran");
    }

    #[test]
    fn test_now_iso_format() {
        let ts = now_iso();
        assert!(ts.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }
}
