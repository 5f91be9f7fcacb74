// Core platform tools: generic record access, identity lookups and CMDB / ITOM

use crate::tools::args::Args;
use crate::tools::context::{record_label, to_json, with_summary, ToolContext};
use crate::tools::registry::{
    json_schema_boolean, json_schema_empty, json_schema_number, json_schema_object,
    json_schema_string, ToolDomain, ToolSpec,
};
use nowbridge_core::{NowError, NowResult};
use nowbridge_sdk::QueryDescriptor;
use serde_json::{json, Value};

pub struct CoreTools;

#[async_trait::async_trait]
impl ToolDomain for CoreTools {
    fn name(&self) -> &'static str {
        "core"
    }

    fn definitions(&self) -> Vec<ToolSpec> {
        vec![
            ToolSpec::read(
                "query_records",
                "Query records from any table with an encoded query, field selection, paging and sorting",
                json_schema_object(
                    json!({
                        "table": json_schema_string("Table name, e.g. \"incident\" or \"change_request\""),
                        "query": json_schema_string("Encoded query, e.g. \"active=true^priority=1\""),
                        "fields": json_schema_string("Comma-separated list of fields to return"),
                        "limit": json_schema_number("Maximum records to return (default 10, max 1000)"),
                        "offset": json_schema_number("Number of records to skip"),
                        "orderBy": json_schema_string("Field to sort by; prefix with \"-\" for descending")
                    }),
                    vec!["table"],
                ),
            ),
            ToolSpec::read(
                "get_table_schema",
                "Describe the fields of a table, inferred from a sample record",
                json_schema_object(
                    json!({ "table": json_schema_string("Table to inspect") }),
                    vec!["table"],
                ),
            ),
            ToolSpec::read(
                "get_record",
                "Fetch one record by sys_id",
                json_schema_object(
                    json!({
                        "table": json_schema_string("Table name"),
                        "sys_id": json_schema_string("32-character sys_id"),
                        "fields": json_schema_string("Optional comma-separated fields")
                    }),
                    vec!["table", "sys_id"],
                ),
            ),
            ToolSpec::read(
                "get_user",
                "Look up a user by email address or user name",
                json_schema_object(
                    json!({ "user_identifier": json_schema_string("Email address or user name") }),
                    vec!["user_identifier"],
                ),
            ),
            ToolSpec::read(
                "get_group",
                "Look up an assignment group by name or sys_id",
                json_schema_object(
                    json!({ "group_identifier": json_schema_string("Group name or sys_id") }),
                    vec!["group_identifier"],
                ),
            ),
            ToolSpec::read(
                "search_cmdb_ci",
                "Search configuration items in the CMDB",
                json_schema_object(
                    json!({
                        "query": json_schema_string("Encoded query, e.g. \"sys_class_name=cmdb_ci_server\""),
                        "limit": json_schema_number("Maximum CIs to return (default 10, max 100)")
                    }),
                    vec![],
                ),
            ),
            ToolSpec::read(
                "get_cmdb_ci",
                "Fetch one configuration item",
                json_schema_object(
                    json!({
                        "ci_sys_id": json_schema_string("sys_id of the CI"),
                        "fields": json_schema_string("Optional comma-separated fields")
                    }),
                    vec!["ci_sys_id"],
                ),
            ),
            ToolSpec::read(
                "list_relationships",
                "List parent and child relationships of a configuration item",
                json_schema_object(
                    json!({ "ci_sys_id": json_schema_string("sys_id of the CI") }),
                    vec!["ci_sys_id"],
                ),
            ),
            ToolSpec::read(
                "list_discovery_schedules",
                "List discovery schedules",
                json_schema_object(
                    json!({ "active_only": json_schema_boolean("Only active schedules") }),
                    vec![],
                ),
            ),
            ToolSpec::read(
                "list_mid_servers",
                "List MID servers and their status",
                json_schema_object(
                    json!({ "active_only": json_schema_boolean("Only servers whose status is \"Up\"") }),
                    vec![],
                ),
            ),
            ToolSpec::read(
                "list_active_events",
                "List event management events",
                json_schema_object(
                    json!({
                        "query": json_schema_string("Encoded filter, e.g. \"severity=1\""),
                        "limit": json_schema_number("Maximum events to return (default 10)")
                    }),
                    vec![],
                ),
            ),
            ToolSpec::read(
                "cmdb_health_dashboard",
                "CMDB data quality: attribute completeness of servers and network adapters",
                json_schema_empty(),
            ),
            ToolSpec::read(
                "service_mapping_summary",
                "A business service with its related CIs, for impact analysis",
                json_schema_object(
                    json!({ "service_sys_id": json_schema_string("sys_id of the business service") }),
                    vec!["service_sys_id"],
                ),
            ),
            ToolSpec::write(
                "create_change_request",
                "Create a change request (requires WRITE_ENABLED=true)",
                json_schema_object(
                    json!({
                        "short_description": json_schema_string("Summary of the change"),
                        "assignment_group": json_schema_string("Group name or sys_id"),
                        "description": json_schema_string("Detailed description"),
                        "category": json_schema_string("Change category"),
                        "priority": json_schema_number("1=Critical, 2=High, 3=Moderate, 4=Low"),
                        "risk": json_schema_number("1=High, 2=Medium, 3=Low"),
                        "impact": json_schema_number("1=High, 2=Medium, 3=Low")
                    }),
                    vec!["short_description", "assignment_group"],
                ),
            ),
            ToolSpec::read(
                "natural_language_search",
                "Search incidents with plain text (experimental)",
                json_schema_object(
                    json!({
                        "query": json_schema_string("Plain text to search for"),
                        "limit": json_schema_number("Maximum results (default 10)")
                    }),
                    vec!["query"],
                ),
            ),
            ToolSpec::write(
                "natural_language_update",
                "Update a record from a plain text instruction (experimental, requires WRITE_ENABLED=true)",
                json_schema_object(
                    json!({
                        "instruction": json_schema_string("Update instruction"),
                        "table": json_schema_string("Table name")
                    }),
                    vec!["instruction", "table"],
                ),
            ),
        ]
    }

    async fn call(&self, ctx: &ToolContext, name: &str, args: Args) -> Option<NowResult<Value>> {
        let result = match name {
            "query_records" => query_records(ctx, &args).await,
            "get_table_schema" => get_table_schema(ctx, &args).await,
            "get_record" => get_record(ctx, &args).await,
            "get_user" => get_user(ctx, &args).await,
            "get_group" => get_group(ctx, &args).await,
            "search_cmdb_ci" => search_cmdb_ci(ctx, &args).await,
            "get_cmdb_ci" => get_cmdb_ci(ctx, &args).await,
            "list_relationships" => list_relationships(ctx, &args).await,
            "list_discovery_schedules" => list_discovery_schedules(ctx, &args).await,
            "list_mid_servers" => list_mid_servers(ctx, &args).await,
            "list_active_events" => list_active_events(ctx, &args).await,
            "cmdb_health_dashboard" => cmdb_health_dashboard(ctx).await,
            "service_mapping_summary" => service_mapping_summary(ctx, &args).await,
            "create_change_request" => create_change_request(ctx, &args).await,
            "natural_language_search" => natural_language_search(ctx, &args).await,
            "natural_language_update" => natural_language_update(ctx, &args).await,
            _ => return None,
        };
        Some(result)
    }
}

fn split_fields(fields: Option<&str>) -> Option<Vec<String>> {
    fields.map(|f| {
        f.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
}

async fn query_records(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let table = args
        .str("table")
        .ok_or_else(|| NowError::invalid_request("Table name is required"))?;

    let mut descriptor = QueryDescriptor::new(table)
        .query_opt(args.str("query"))
        .fields_opt(split_fields(args.str("fields")))
        .limit_opt(args.u32("limit"));
    if let Some(offset) = args.u32("offset") {
        descriptor = descriptor.offset(offset);
    }
    if let Some(order_by) = args.str("orderBy") {
        descriptor = descriptor.order_by(order_by);
    }

    let response = ctx.client.table().query(descriptor).await?;
    Ok(json!({
        "count": response.count,
        "records": to_json(&response.records)?,
        "summary": format!("Found {} record(s) in \"{}\"", response.count, table),
    }))
}

async fn get_table_schema(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let table = args
        .str("table")
        .ok_or_else(|| NowError::invalid_request("Table name is required"))?;
    to_json(ctx.client.table().schema(table).await?)
}

async fn get_record(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    args.require_all(&["table", "sys_id"])?;
    let record = ctx
        .client
        .table()
        .get(args.required("table")?, args.required("sys_id")?, args.str("fields"))
        .await?;
    to_json(record)
}

async fn get_user(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let identifier = args.required("user_identifier")?;
    to_json(ctx.client.directory().get_user(identifier).await?)
}

async fn get_group(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let identifier = args.required("group_identifier")?;
    to_json(ctx.client.directory().get_group(identifier).await?)
}

async fn search_cmdb_ci(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    to_json(
        ctx.client
            .cmdb()
            .search_ci(args.str("query"), args.u32("limit"))
            .await?,
    )
}

async fn get_cmdb_ci(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let ci = args.required("ci_sys_id")?;
    to_json(ctx.client.cmdb().get_ci(ci, args.str("fields")).await?)
}

async fn list_relationships(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let ci = args.required("ci_sys_id")?;
    to_json(ctx.client.cmdb().relationships(ci).await?)
}

async fn list_discovery_schedules(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let active_only = args.bool("active_only").unwrap_or(false);
    to_json(ctx.client.cmdb().discovery_schedules(active_only).await?)
}

async fn list_mid_servers(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let active_only = args.bool("active_only").unwrap_or(false);
    to_json(ctx.client.cmdb().mid_servers(active_only).await?)
}

async fn list_active_events(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    to_json(
        ctx.client
            .cmdb()
            .active_events(args.str("query"), args.u32("limit"))
            .await?,
    )
}

async fn cmdb_health_dashboard(ctx: &ToolContext) -> NowResult<Value> {
    to_json(ctx.client.cmdb().health_dashboard().await?)
}

async fn service_mapping_summary(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let service = args.required("service_sys_id")?;
    to_json(ctx.client.cmdb().service_mapping_summary(service).await?)
}

async fn create_change_request(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    args.require_all(&["short_description", "assignment_group"])?;
    let record = ctx
        .client
        .table()
        .create("change_request", &args.to_value())
        .await?;
    let summary = format!("Created change request {}", record_label(&record));
    with_summary(record, summary)
}

async fn natural_language_search(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let query = args.required("query")?;
    to_json(
        ctx.client
            .assist()
            .natural_language_search(query, args.u32("limit"))
            .await?,
    )
}

async fn natural_language_update(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    ctx.client
        .assist()
        .natural_language_update(
            args.str("instruction").unwrap_or_default(),
            args.str("table").unwrap_or_default(),
        )
        .await
}
