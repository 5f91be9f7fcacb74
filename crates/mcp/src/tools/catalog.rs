// Service catalog, approval and SLA tools

use crate::tools::args::Args;
use crate::tools::context::{summarize, ToolContext};
use crate::tools::registry::{
    json_schema_number, json_schema_object, json_schema_record, json_schema_string, ToolDomain,
    ToolSpec,
};
use nowbridge_core::NowResult;
use nowbridge_sdk::{EncodedQuery, QueryDescriptor, DEFAULT_LIMIT};
use serde_json::{json, Value};

const ITEM_TABLE: &str = "sc_cat_item";
const APPROVAL_TABLE: &str = "sysapproval_approver";
const SLA_TABLE: &str = "task_sla";

const ITEM_FIELDS: [&str; 5] = ["sys_id", "name", "short_description", "category", "price"];
const APPROVAL_FIELDS: [&str; 6] = [
    "sys_id",
    "state",
    "approver",
    "sysapproval",
    "comments",
    "sys_updated_on",
];
const SLA_FIELDS: [&str; 8] = [
    "sys_id",
    "sla",
    "stage",
    "has_breached",
    "percentage",
    "pause_time",
    "business_time_left",
    "sys_updated_on",
];

pub struct CatalogTools;

#[async_trait::async_trait]
impl ToolDomain for CatalogTools {
    fn name(&self) -> &'static str {
        "catalog"
    }

    fn definitions(&self) -> Vec<ToolSpec> {
        vec![
            ToolSpec::read(
                "list_catalog_items",
                "List active service catalog items",
                json_schema_object(
                    json!({
                        "category": json_schema_string("Category title or sys_id"),
                        "limit": json_schema_number("Maximum items (default 20)")
                    }),
                    vec![],
                ),
            ),
            ToolSpec::read(
                "search_catalog",
                "Search the service catalog by keyword",
                json_schema_object(
                    json!({
                        "query": json_schema_string("Search keywords"),
                        "limit": json_schema_number("Maximum results (default 10)")
                    }),
                    vec!["query"],
                ),
            ),
            ToolSpec::read(
                "get_catalog_item",
                "Get a catalog item by sys_id or name",
                json_schema_object(
                    json!({ "sys_id_or_name": json_schema_string("Catalog item sys_id or name") }),
                    vec!["sys_id_or_name"],
                ),
            ),
            ToolSpec::write(
                "order_catalog_item",
                "Order a catalog item (requires WRITE_ENABLED=true)",
                json_schema_object(
                    json!({
                        "sys_id": json_schema_string("sys_id of the catalog item"),
                        "quantity": json_schema_number("Quantity to order (default 1)"),
                        "variables": json_schema_record("Item variables as key-value pairs")
                    }),
                    vec!["sys_id"],
                ),
            ),
            ToolSpec::read(
                "get_my_approvals",
                "List approvals waiting on the configured user",
                json_schema_object(
                    json!({
                        "state": json_schema_string("\"requested\", \"approved\" or \"rejected\" (default \"requested\")")
                    }),
                    vec![],
                ),
            ),
            ToolSpec::read(
                "list_approvals",
                "List approval records",
                json_schema_object(
                    json!({
                        "query": json_schema_string("Encoded query filter"),
                        "state": json_schema_string("Approval state"),
                        "limit": json_schema_number("Maximum results (default 10)")
                    }),
                    vec![],
                ),
            ),
            ToolSpec::write(
                "approve_request",
                "Approve a pending approval (requires WRITE_ENABLED=true)",
                json_schema_object(
                    json!({
                        "sys_id": json_schema_string("sys_id of the approval record"),
                        "comments": json_schema_string("Optional comments")
                    }),
                    vec!["sys_id"],
                ),
            ),
            ToolSpec::write(
                "reject_request",
                "Reject a pending approval (requires WRITE_ENABLED=true)",
                json_schema_object(
                    json!({
                        "sys_id": json_schema_string("sys_id of the approval record"),
                        "comments": json_schema_string("Reason for rejection")
                    }),
                    vec!["sys_id", "comments"],
                ),
            ),
            ToolSpec::read(
                "get_sla_details",
                "SLA stage and breach status of one task",
                json_schema_object(
                    json!({ "task_sys_id": json_schema_string("sys_id of the task or incident") }),
                    vec!["task_sys_id"],
                ),
            ),
            ToolSpec::read(
                "list_active_slas",
                "List running SLAs that have not breached",
                json_schema_object(
                    json!({
                        "query": json_schema_string("Additional encoded query"),
                        "limit": json_schema_number("Maximum results (default 10)")
                    }),
                    vec![],
                ),
            ),
        ]
    }

    async fn call(&self, ctx: &ToolContext, name: &str, args: Args) -> Option<NowResult<Value>> {
        let result = match name {
            "list_catalog_items" => list_catalog_items(ctx, &args).await,
            "search_catalog" => search_catalog(ctx, &args).await,
            "get_catalog_item" => get_catalog_item(ctx, &args).await,
            "order_catalog_item" => order_catalog_item(ctx, &args).await,
            "get_my_approvals" => get_my_approvals(ctx, &args).await,
            "list_approvals" => list_approvals(ctx, &args).await,
            "approve_request" => approve_request(ctx, &args).await,
            "reject_request" => reject_request(ctx, &args).await,
            "get_sla_details" => get_sla_details(ctx, &args).await,
            "list_active_slas" => list_active_slas(ctx, &args).await,
            _ => return None,
        };
        Some(result)
    }
}

async fn list_catalog_items(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let mut query = EncodedQuery::from_raw("active=true");
    if let Some(category) = args.str("category") {
        query = query.or([
            format!("category.title={}", category),
            format!("category={}", category),
        ]);
    }

    let descriptor = QueryDescriptor::new(ITEM_TABLE)
        .query(query.build())
        .limit(args.limit_or(20))
        .fields(ITEM_FIELDS);
    ctx.list_as(descriptor, "catalog_items").await
}

async fn search_catalog(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let text = args.required("query")?;
    let query = EncodedQuery::new()
        .or([
            format!("nameLIKE{}", text),
            format!("short_descriptionLIKE{}", text),
        ])
        .and("active=true");

    let descriptor = QueryDescriptor::new(ITEM_TABLE)
        .query(query.build())
        .limit(args.limit_or(DEFAULT_LIMIT));
    ctx.list_as(descriptor, "catalog_items").await
}

async fn get_catalog_item(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let identifier = args.required("sys_id_or_name")?;
    ctx.get_by_field_or_sys_id(ITEM_TABLE, "name", identifier, "Catalog item")
        .await
}

async fn order_catalog_item(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let sys_id = args.required("sys_id")?;
    let payload = json!({
        "sysparm_quantity": args.u32("quantity").filter(|q| *q > 0).unwrap_or(1),
        "variables": args.object("variables").cloned().unwrap_or_default(),
    });

    let response = ctx
        .client
        .rest()
        .post(
            &format!("/api/now/v1/servicecatalog/items/{}/order_now", sys_id),
            &payload,
        )
        .await?;
    Ok(summarize(response, format!("Ordered catalog item {}", sys_id)))
}

async fn get_my_approvals(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let state = args.str("state").unwrap_or("requested");
    let query = EncodedQuery::new().and(format!("state={}", state)).and_opt(
        ctx.username
            .as_deref()
            .filter(|u| !u.is_empty())
            .map(|u| format!("approver.user_name={}", u)),
    );

    let descriptor = QueryDescriptor::new(APPROVAL_TABLE)
        .query(query.build())
        .limit(20)
        .fields(APPROVAL_FIELDS);
    ctx.list_as(descriptor, "approvals").await
}

async fn list_approvals(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let query = EncodedQuery::new()
        .and_opt(args.str("query"))
        .and_opt(args.str("state").map(|s| format!("state={}", s)));

    let descriptor = QueryDescriptor::new(APPROVAL_TABLE)
        .query_opt(query.build_opt())
        .limit(args.limit_or(DEFAULT_LIMIT));
    ctx.list_as(descriptor, "approvals").await
}

async fn approve_request(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let sys_id = args.required("sys_id")?;
    let mut data = json!({ "state": "approved" });
    if let Some(comments) = args.str("comments") {
        data["comments"] = json!(comments);
    }
    ctx.update_with_summary(APPROVAL_TABLE, sys_id, &data, format!("Approved request {}", sys_id))
        .await
}

async fn reject_request(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    args.require_all(&["sys_id", "comments"])?;
    let sys_id = args.required("sys_id")?;
    let data = json!({ "state": "rejected", "comments": args.str("comments") });
    ctx.update_with_summary(APPROVAL_TABLE, sys_id, &data, format!("Rejected request {}", sys_id))
        .await
}

async fn get_sla_details(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let task = args.required("task_sys_id")?;
    let descriptor = QueryDescriptor::new(SLA_TABLE)
        .query(format!("task={}", task))
        .fields(SLA_FIELDS);
    ctx.list_as(descriptor, "slas").await
}

async fn list_active_slas(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let query = EncodedQuery::new()
        .and_opt(args.str("query"))
        .and("stage!=complete^has_breached=false");

    let descriptor = QueryDescriptor::new(SLA_TABLE)
        .query(query.build())
        .limit(args.limit_or(DEFAULT_LIMIT));
    ctx.list_as(descriptor, "slas").await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::context::tests::test_context;
    use nowbridge_core::{Capabilities, ErrorKind};
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn call(ctx: &ToolContext, name: &str, args: Value) -> NowResult<Value> {
        CatalogTools
            .call(ctx, name, Args::new(args).unwrap())
            .await
            .expect("tool belongs to the catalog domain")
    }

    #[tokio::test]
    async fn test_order_catalog_item_posts_order_now() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/now/v1/servicecatalog/items/item1/order_now"))
            .and(body_json(json!({
                "sysparm_quantity": 1,
                "variables": {}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {"request_number": "REQ0010001"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri(), Capabilities::all());
        let result = call(&ctx, "order_catalog_item", json!({"sys_id": "item1"}))
            .await
            .unwrap();
        assert_eq!(result["result"]["request_number"], "REQ0010001");
        assert_eq!(result["summary"], "Ordered catalog item item1");
    }

    #[tokio::test]
    async fn test_get_my_approvals_uses_context_user() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/now/table/sysapproval_approver"))
            .and(query_param("sysparm_query", "state=requested^approver.user_name=admin"))
            .and(query_param("sysparm_limit", "20"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [{"sys_id": "ap1", "state": "requested"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri(), Capabilities::default());
        let result = call(&ctx, "get_my_approvals", json!({})).await.unwrap();
        assert_eq!(result["count"], 1);
        assert_eq!(result["approvals"][0]["sys_id"], "ap1");
    }

    #[tokio::test]
    async fn test_list_active_slas_prefixes_caller_query() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/now/table/task_sla"))
            .and(query_param(
                "sysparm_query",
                "task.priority=1^stage!=complete^has_breached=false",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": []})))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri(), Capabilities::default());
        let result = call(&ctx, "list_active_slas", json!({"query": "task.priority=1"}))
            .await
            .unwrap();
        assert_eq!(result["slas"], json!([]));
    }

    #[tokio::test]
    async fn test_reject_requires_comments() {
        let ctx = test_context("http://127.0.0.1:9", Capabilities::all());
        let err = call(&ctx, "reject_request", json!({"sys_id": "ap1"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert_eq!(err.message(), "sys_id and comments are required");
    }

    #[tokio::test]
    async fn test_get_catalog_item_by_name() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/now/table/sc_cat_item"))
            .and(query_param("sysparm_query", "name=Laptop"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": []})))
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri(), Capabilities::default());
        let err = call(&ctx, "get_catalog_item", json!({"sys_id_or_name": "Laptop"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.message(), "Catalog item not found: Laptop");
    }
}
