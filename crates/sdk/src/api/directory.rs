//! User and group lookups.

use crate::client::NowClient;
use crate::query::EncodedQuery;
use nowbridge_core::{is_sys_id, ErrorKind, NowError, NowResult, Record};
use tracing::info;

pub struct DirectoryApi<'a> {
    client: &'a NowClient,
}

impl<'a> DirectoryApi<'a> {
    pub(crate) fn new(client: &'a NowClient) -> Self {
        Self { client }
    }

    /// Find a user by email address or user name.
    pub async fn get_user(&self, identifier: &str) -> NowResult<Record> {
        self.client.ensure_authenticated().await?;

        info!(user = identifier, "Looking up user");

        let query = EncodedQuery::new()
            .or([format!("email={}", identifier), format!("user_name={}", identifier)])
            .build();
        self.first("sys_user", query, "Failed to get user")
            .await?
            .ok_or_else(|| NowError::not_found(format!("User not found: {}", identifier)))
    }

    /// Find a group by sys_id or name.
    pub async fn get_group(&self, identifier: &str) -> NowResult<Record> {
        self.client.ensure_authenticated().await?;

        info!(group = identifier, "Looking up group");

        let query = if is_sys_id(identifier) {
            format!("sys_id={}", identifier)
        } else {
            format!("name={}", identifier)
        };
        self.first("sys_user_group", query, "Failed to get group")
            .await?
            .ok_or_else(|| NowError::not_found(format!("Group not found: {}", identifier)))
    }

    async fn first(&self, table: &str, query: String, context: &str) -> NowResult<Option<Record>> {
        let params = [
            ("sysparm_query".to_string(), query),
            ("sysparm_limit".to_string(), "1".to_string()),
        ];
        let records = self
            .client
            .list(table, &params)
            .await
            .map_err(|e| e.into_now_error(ErrorKind::QueryFailed, context))?;
        Ok(records.into_iter().next())
    }
}
