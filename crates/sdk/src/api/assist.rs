//! Natural language helpers.

use super::QueryResponse;
use crate::client::NowClient;
use crate::query::{EncodedQuery, QueryDescriptor};
use nowbridge_core::{NowError, NowResult};
use serde_json::Value;
use tracing::{info, warn};

pub struct AssistApi<'a> {
    client: &'a NowClient,
}

impl<'a> AssistApi<'a> {
    pub(crate) fn new(client: &'a NowClient) -> Self {
        Self { client }
    }

    /// Free-text search over incident descriptions.
    pub async fn natural_language_search(&self, text: &str, limit: Option<u32>) -> NowResult<QueryResponse> {
        info!(text, "Natural language search");

        let query = EncodedQuery::new()
            .or([
                format!("short_descriptionLIKE{}", text),
                format!("descriptionLIKE{}", text),
            ])
            .build();
        self.client
            .table()
            .query(QueryDescriptor::new("incident").query(query).limit_opt(limit))
            .await
    }

    /// Apply a free-text update instruction. Not supported yet.
    pub async fn natural_language_update(&self, instruction: &str, table: &str) -> NowResult<Value> {
        warn!(table, instruction, "Natural language update requested but not supported");

        Err(NowError::not_implemented(
            "Natural language update requires custom parsing logic - not yet implemented",
        ))
    }
}
