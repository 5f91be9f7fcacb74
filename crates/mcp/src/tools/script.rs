// Scripting tools: business rules, script includes, client scripts and update sets
//
// Every tool here needs SCRIPTING_ENABLED=true (which itself needs WRITE_ENABLED).

use crate::tools::args::Args;
use crate::tools::context::{to_json, with_summary, ToolContext};
use crate::tools::registry::{
    json_schema_boolean, json_schema_number, json_schema_object, json_schema_record,
    json_schema_string, ToolDomain, ToolSpec,
};
use nowbridge_core::{NowResult, ToolTier};
use nowbridge_sdk::{EncodedQuery, QueryDescriptor};
use serde_json::{json, Value};

const BUSINESS_RULE_TABLE: &str = "sys_script";
const SCRIPT_INCLUDE_TABLE: &str = "sys_script_include";
const CLIENT_SCRIPT_TABLE: &str = "sys_script_client";
const UPDATE_SET_TABLE: &str = "sys_update_set";

const DEFAULT_RULE_ORDER: u32 = 100;

pub struct ScriptTools;

fn scripting(name: &str, description: &str, input_schema: Value) -> ToolSpec {
    ToolSpec::new(name, description, input_schema, ToolTier::Scripting)
}

fn sys_id_schema(what: &str) -> Value {
    json_schema_object(
        json!({ "sys_id": json_schema_string(&format!("sys_id of the {}", what)) }),
        vec!["sys_id"],
    )
}

fn update_schema(what: &str) -> Value {
    json_schema_object(
        json!({
            "sys_id": json_schema_string(&format!("sys_id of the {}", what)),
            "fields": json_schema_record("Field values to set")
        }),
        vec!["sys_id", "fields"],
    )
}

#[async_trait::async_trait]
impl ToolDomain for ScriptTools {
    fn name(&self) -> &'static str {
        "script"
    }

    fn definitions(&self) -> Vec<ToolSpec> {
        vec![
            scripting(
                "list_business_rules",
                "List business rules (requires SCRIPTING_ENABLED=true)",
                json_schema_object(
                    json!({
                        "table": json_schema_string("Only rules on this table"),
                        "active": json_schema_boolean("Filter by active flag"),
                        "limit": json_schema_number("Maximum results (default 20)")
                    }),
                    vec![],
                ),
            ),
            scripting(
                "get_business_rule",
                "Get a business rule including its script (requires SCRIPTING_ENABLED=true)",
                sys_id_schema("business rule"),
            ),
            scripting(
                "create_business_rule",
                "Create a business rule (requires SCRIPTING_ENABLED=true)",
                json_schema_object(
                    json!({
                        "name": json_schema_string("Rule name"),
                        "table": json_schema_string("Table the rule runs on"),
                        "when": json_schema_string("\"before\", \"after\", \"async\" or \"display\""),
                        "script": json_schema_string("Server-side script"),
                        "condition": json_schema_string("Optional condition script"),
                        "active": json_schema_boolean("Activate the rule (default true)"),
                        "order": json_schema_number("Execution order (default 100)")
                    }),
                    vec!["name", "table", "when", "script"],
                ),
            ),
            scripting(
                "update_business_rule",
                "Update a business rule (requires SCRIPTING_ENABLED=true)",
                update_schema("business rule"),
            ),
            scripting(
                "list_script_includes",
                "List script includes (requires SCRIPTING_ENABLED=true)",
                json_schema_object(
                    json!({
                        "query": json_schema_string("Encoded filter, e.g. \"nameLIKEUtil\""),
                        "active": json_schema_boolean("Filter by active flag"),
                        "limit": json_schema_number("Maximum results (default 20)")
                    }),
                    vec![],
                ),
            ),
            scripting(
                "get_script_include",
                "Get a script include by sys_id, API name or name (requires SCRIPTING_ENABLED=true)",
                json_schema_object(
                    json!({ "sys_id_or_name": json_schema_string("sys_id, api_name or name") }),
                    vec!["sys_id_or_name"],
                ),
            ),
            scripting(
                "create_script_include",
                "Create a script include (requires SCRIPTING_ENABLED=true)",
                json_schema_object(
                    json!({
                        "name": json_schema_string("Script include name"),
                        "script": json_schema_string("Script body"),
                        "api_name": json_schema_string("API name (default: name)"),
                        "access": json_schema_string("\"public\" or \"package_private\" (default \"public\")"),
                        "active": json_schema_boolean("Activate (default true)")
                    }),
                    vec!["name", "script"],
                ),
            ),
            scripting(
                "update_script_include",
                "Update a script include (requires SCRIPTING_ENABLED=true)",
                update_schema("script include"),
            ),
            scripting(
                "list_client_scripts",
                "List client scripts (requires SCRIPTING_ENABLED=true)",
                json_schema_object(
                    json!({
                        "table": json_schema_string("Only scripts on this table"),
                        "type": json_schema_string("\"onLoad\", \"onChange\", \"onSubmit\" or \"onCellEdit\""),
                        "active": json_schema_boolean("Filter by active flag"),
                        "limit": json_schema_number("Maximum results (default 20)")
                    }),
                    vec![],
                ),
            ),
            scripting(
                "get_client_script",
                "Get a client script including its script (requires SCRIPTING_ENABLED=true)",
                sys_id_schema("client script"),
            ),
            scripting(
                "list_changesets",
                "List update sets (requires SCRIPTING_ENABLED=true)",
                json_schema_object(
                    json!({
                        "state": json_schema_string("\"in progress\", \"complete\" or \"ignore\""),
                        "limit": json_schema_number("Maximum results (default 20)")
                    }),
                    vec![],
                ),
            ),
            scripting(
                "get_changeset",
                "Get an update set by sys_id or name (requires SCRIPTING_ENABLED=true)",
                json_schema_object(
                    json!({ "sys_id_or_name": json_schema_string("Update set sys_id or name") }),
                    vec!["sys_id_or_name"],
                ),
            ),
            scripting(
                "commit_changeset",
                "Commit an update set (requires SCRIPTING_ENABLED=true)",
                sys_id_schema("update set"),
            ),
            scripting(
                "publish_changeset",
                "Publish an update set for deployment (requires SCRIPTING_ENABLED=true)",
                sys_id_schema("update set"),
            ),
        ]
    }

    async fn call(&self, ctx: &ToolContext, name: &str, args: Args) -> Option<NowResult<Value>> {
        let result = match name {
            "list_business_rules" => list_business_rules(ctx, &args).await,
            "get_business_rule" => get_by_sys_id(ctx, &args, BUSINESS_RULE_TABLE).await,
            "create_business_rule" => create_business_rule(ctx, &args).await,
            "update_business_rule" => update_business_rule(ctx, &args).await,
            "list_script_includes" => list_script_includes(ctx, &args).await,
            "get_script_include" => get_script_include(ctx, &args).await,
            "create_script_include" => create_script_include(ctx, &args).await,
            "update_script_include" => update_script_include(ctx, &args).await,
            "list_client_scripts" => list_client_scripts(ctx, &args).await,
            "get_client_script" => get_by_sys_id(ctx, &args, CLIENT_SCRIPT_TABLE).await,
            "list_changesets" => list_changesets(ctx, &args).await,
            "get_changeset" => get_changeset(ctx, &args).await,
            "commit_changeset" => complete_changeset(ctx, &args, "Committed").await,
            "publish_changeset" => complete_changeset(ctx, &args, "Published").await,
            _ => return None,
        };
        Some(result)
    }
}

/// `active=<flag>` when the caller passed one.
fn active_filter(args: &Args) -> Option<String> {
    args.bool("active").map(|active| format!("active={}", active))
}

async fn get_by_sys_id(ctx: &ToolContext, args: &Args, table: &str) -> NowResult<Value> {
    let sys_id = args.required("sys_id")?;
    to_json(ctx.client.table().get(table, sys_id, None).await?)
}

async fn list_business_rules(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let query = EncodedQuery::new()
        .and_opt(active_filter(args))
        .and_opt(args.str("table").map(|t| format!("collection={}", t)));

    let descriptor = QueryDescriptor::new(BUSINESS_RULE_TABLE)
        .query_opt(query.build_opt())
        .limit(args.limit_or(20))
        .fields(["sys_id", "name", "collection", "when", "active", "order", "sys_updated_on"]);
    ctx.list_as(descriptor, "business_rules").await
}

async fn create_business_rule(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    args.require_all(&["name", "table", "when", "script"])?;
    let name = args.required("name")?;

    let mut data = json!({
        "name": name,
        "collection": args.str("table"),
        "when": args.str("when"),
        "script": args.str("script"),
        "active": args.bool("active").unwrap_or(true),
        "order": args.u32("order").unwrap_or(DEFAULT_RULE_ORDER),
    });
    if let Some(condition) = args.str("condition") {
        data["condition"] = json!(condition);
    }

    let record = ctx.client.table().create(BUSINESS_RULE_TABLE, &data).await?;
    with_summary(record, format!("Created business rule {}", name))
}

async fn update_business_rule(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    args.require_all(&["sys_id", "fields"])?;
    let sys_id = args.required("sys_id")?;
    let fields = args.required_object("fields")?;
    ctx.update_with_summary(
        BUSINESS_RULE_TABLE,
        sys_id,
        &fields,
        format!("Updated business rule {}", sys_id),
    )
    .await
}

async fn list_script_includes(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let query = EncodedQuery::new()
        .and_opt(active_filter(args))
        .and_opt(args.str("query"));

    let descriptor = QueryDescriptor::new(SCRIPT_INCLUDE_TABLE)
        .query_opt(query.build_opt())
        .limit(args.limit_or(20))
        .fields(["sys_id", "name", "api_name", "active", "access", "sys_updated_on"]);
    ctx.list_as(descriptor, "script_includes").await
}

async fn get_script_include(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let identifier = args.required("sys_id_or_name")?;
    if nowbridge_core::is_sys_id(identifier) {
        return to_json(ctx.client.table().get(SCRIPT_INCLUDE_TABLE, identifier, None).await?);
    }
    let query = EncodedQuery::new()
        .or([format!("api_name={}", identifier), format!("name={}", identifier)])
        .build();
    ctx.first_match(
        SCRIPT_INCLUDE_TABLE,
        query,
        format!("Script include not found: {}", identifier),
    )
    .await
}

async fn create_script_include(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    args.require_all(&["name", "script"])?;
    let name = args.required("name")?;

    let data = json!({
        "name": name,
        "script": args.str("script"),
        "api_name": args.str("api_name").unwrap_or(name),
        "access": args.str("access").unwrap_or("public"),
        "active": args.bool("active").unwrap_or(true),
    });
    let record = ctx.client.table().create(SCRIPT_INCLUDE_TABLE, &data).await?;
    with_summary(record, format!("Created script include {}", name))
}

async fn update_script_include(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    args.require_all(&["sys_id", "fields"])?;
    let sys_id = args.required("sys_id")?;
    let fields = args.required_object("fields")?;
    to_json(
        ctx.client
            .table()
            .update(SCRIPT_INCLUDE_TABLE, sys_id, &fields)
            .await?,
    )
}

async fn list_client_scripts(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let query = EncodedQuery::new()
        .and_opt(active_filter(args))
        .and_opt(args.str("table").map(|t| format!("table={}", t)))
        .and_opt(args.str("type").map(|t| format!("type={}", t)));

    let descriptor = QueryDescriptor::new(CLIENT_SCRIPT_TABLE)
        .query_opt(query.build_opt())
        .limit(args.limit_or(20))
        .fields(["sys_id", "name", "table", "type", "active", "sys_updated_on"]);
    ctx.list_as(descriptor, "client_scripts").await
}

async fn list_changesets(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let descriptor = QueryDescriptor::new(UPDATE_SET_TABLE)
        .query_opt(args.str("state").map(|s| format!("state={}", s)))
        .limit(args.limit_or(20))
        .fields(["sys_id", "name", "state", "description", "application", "sys_updated_on"]);
    ctx.list_as(descriptor, "changesets").await
}

async fn get_changeset(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let identifier = args.required("sys_id_or_name")?;
    ctx.get_by_field_or_sys_id(UPDATE_SET_TABLE, "name", identifier, "Changeset")
        .await
}

/// Commit and publish both move the update set to `complete`.
async fn complete_changeset(ctx: &ToolContext, args: &Args, verb: &str) -> NowResult<Value> {
    let sys_id = args.required("sys_id")?;
    ctx.update_with_summary(
        UPDATE_SET_TABLE,
        sys_id,
        &json!({ "state": "complete" }),
        format!("{} changeset {}", verb, sys_id),
    )
    .await
}
