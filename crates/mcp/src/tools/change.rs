// Change request tools

use crate::tools::args::Args;
use crate::tools::context::ToolContext;
use crate::tools::registry::{
    json_schema_number, json_schema_object, json_schema_record, json_schema_string, ToolDomain,
    ToolSpec,
};
use nowbridge_core::NowResult;
use nowbridge_sdk::{EncodedQuery, QueryDescriptor, DEFAULT_LIMIT};
use serde_json::{json, Value};

const TABLE: &str = "change_request";

const STATE_REQUESTED: &str = "-5";
const STATE_CLOSED: &str = "3";

pub struct ChangeTools;

#[async_trait::async_trait]
impl ToolDomain for ChangeTools {
    fn name(&self) -> &'static str {
        "change"
    }

    fn definitions(&self) -> Vec<ToolSpec> {
        vec![
            ToolSpec::read(
                "get_change_request",
                "Get a change request by number (CHG...) or sys_id",
                json_schema_object(
                    json!({ "number_or_sysid": json_schema_string("Change number or sys_id") }),
                    vec!["number_or_sysid"],
                ),
            ),
            ToolSpec::write(
                "update_change_request",
                "Update fields on a change request (requires WRITE_ENABLED=true)",
                json_schema_object(
                    json!({
                        "sys_id": json_schema_string("sys_id of the change request"),
                        "fields": json_schema_record("Field values to set")
                    }),
                    vec!["sys_id", "fields"],
                ),
            ),
            ToolSpec::read(
                "list_change_requests",
                "List change requests, optionally filtered by state or encoded query",
                json_schema_object(
                    json!({
                        "query": json_schema_string("Encoded query filter"),
                        "state": json_schema_string("Change state, e.g. \"-5\"=Requested, \"-4\"=Draft, \"0\"=Open"),
                        "limit": json_schema_number("Maximum records (default 10)")
                    }),
                    vec![],
                ),
            ),
            ToolSpec::write(
                "submit_change_for_approval",
                "Move a change request to the Requested state (requires WRITE_ENABLED=true)",
                json_schema_object(
                    json!({ "sys_id": json_schema_string("sys_id of the change request") }),
                    vec!["sys_id"],
                ),
            ),
            ToolSpec::write(
                "close_change_request",
                "Close a change request with a close code and notes (requires WRITE_ENABLED=true)",
                json_schema_object(
                    json!({
                        "sys_id": json_schema_string("sys_id of the change request"),
                        "close_code": json_schema_string("Close code, e.g. \"successful\""),
                        "close_notes": json_schema_string("Closure notes")
                    }),
                    vec!["sys_id", "close_code", "close_notes"],
                ),
            ),
        ]
    }

    async fn call(&self, ctx: &ToolContext, name: &str, args: Args) -> Option<NowResult<Value>> {
        let result = match name {
            "get_change_request" => get_change_request(ctx, &args).await,
            "update_change_request" => update_change_request(ctx, &args).await,
            "list_change_requests" => list_change_requests(ctx, &args).await,
            "submit_change_for_approval" => submit_change_for_approval(ctx, &args).await,
            "close_change_request" => close_change_request(ctx, &args).await,
            _ => return None,
        };
        Some(result)
    }
}

async fn get_change_request(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let identifier = args.required("number_or_sysid")?;
    ctx.get_by_number_or_sys_id(TABLE, identifier, "Change request")
        .await
}

async fn update_change_request(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    args.require_all(&["sys_id", "fields"])?;
    let sys_id = args.required("sys_id")?;
    let fields = args.required_object("fields")?;
    ctx.update_with_summary(
        TABLE,
        sys_id,
        &fields,
        format!("Updated change request {}", sys_id),
    )
    .await
}

async fn list_change_requests(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let query = EncodedQuery::new()
        .and_opt(args.str("query"))
        .and_opt(args.str("state").map(|s| format!("state={}", s)));

    let descriptor = QueryDescriptor::new(TABLE)
        .query_opt(query.build_opt())
        .limit(args.limit_or(DEFAULT_LIMIT));
    ctx.list_as(descriptor, "records").await
}

async fn submit_change_for_approval(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let sys_id = args.required("sys_id")?;
    ctx.update_with_summary(
        TABLE,
        sys_id,
        &json!({ "state": STATE_REQUESTED }),
        format!("Submitted change request {} for approval", sys_id),
    )
    .await
}

async fn close_change_request(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    args.require_all(&["sys_id", "close_code", "close_notes"])?;
    let sys_id = args.required("sys_id")?;
    let data = json!({
        "state": STATE_CLOSED,
        "close_code": args.str("close_code"),
        "close_notes": args.str("close_notes"),
    });
    ctx.update_with_summary(TABLE, sys_id, &data, format!("Closed change request {}", sys_id))
        .await
}
