//! API groups exposed by [`NowClient`](crate::NowClient).

mod assist;
mod cmdb;
mod directory;
mod rest;
mod stats;
mod table;

pub use assist::AssistApi;
pub use cmdb::{CmdbApi, CmdbHealth, MidServerList, NetworkMetrics, RelationshipList, ScheduleList, ServerMetrics, ServiceMapping};
pub use directory::DirectoryApi;
pub use rest::RestApi;
pub use stats::StatsApi;
pub use table::{ColumnInfo, QueryResponse, TableApi, TableSchema};

use serde::Deserialize;

/// The `{"result": ...}` wrapper around every platform response.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub result: T,
}
