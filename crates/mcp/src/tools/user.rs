// User and group administration tools

use crate::tools::args::Args;
use crate::tools::context::{with_summary, ToolContext};
use crate::tools::registry::{
    json_schema_number, json_schema_object, json_schema_record, json_schema_string, ToolDomain,
    ToolSpec,
};
use nowbridge_core::NowResult;
use nowbridge_sdk::QueryDescriptor;
use serde_json::{json, Value};

const USER_TABLE: &str = "sys_user";
const GROUP_TABLE: &str = "sys_user_group";
const MEMBER_TABLE: &str = "sys_user_grmember";

const USER_FIELDS: [&str; 8] = [
    "sys_id",
    "user_name",
    "email",
    "first_name",
    "last_name",
    "title",
    "department",
    "active",
];
const GROUP_FIELDS: [&str; 5] = ["sys_id", "name", "description", "manager", "active"];

pub struct UserTools;

#[async_trait::async_trait]
impl ToolDomain for UserTools {
    fn name(&self) -> &'static str {
        "user"
    }

    fn definitions(&self) -> Vec<ToolSpec> {
        vec![
            ToolSpec::read(
                "list_users",
                "List users, active ones unless a filter is given",
                json_schema_object(
                    json!({
                        "query": json_schema_string("Encoded filter, e.g. \"active=true^departmentLIKEIT\""),
                        "limit": json_schema_number("Maximum results (default 20)")
                    }),
                    vec![],
                ),
            ),
            ToolSpec::write(
                "create_user",
                "Create a user account (requires WRITE_ENABLED=true)",
                json_schema_object(
                    json!({
                        "user_name": json_schema_string("Unique login name"),
                        "email": json_schema_string("Email address"),
                        "first_name": json_schema_string("First name"),
                        "last_name": json_schema_string("Last name"),
                        "title": json_schema_string("Job title"),
                        "department": json_schema_string("Department name or sys_id")
                    }),
                    vec!["user_name", "email", "first_name", "last_name"],
                ),
            ),
            ToolSpec::write(
                "update_user",
                "Update a user account (requires WRITE_ENABLED=true)",
                json_schema_object(
                    json!({
                        "sys_id": json_schema_string("sys_id of the user"),
                        "fields": json_schema_record("Field values to set")
                    }),
                    vec!["sys_id", "fields"],
                ),
            ),
            ToolSpec::read(
                "list_groups",
                "List groups, active ones unless a filter is given",
                json_schema_object(
                    json!({
                        "query": json_schema_string("Encoded filter, e.g. \"active=true^typeLIKEitil\""),
                        "limit": json_schema_number("Maximum results (default 20)")
                    }),
                    vec![],
                ),
            ),
            ToolSpec::write(
                "create_group",
                "Create an assignment group (requires WRITE_ENABLED=true)",
                json_schema_object(
                    json!({
                        "name": json_schema_string("Group name"),
                        "description": json_schema_string("Group description"),
                        "manager": json_schema_string("Manager user name or sys_id")
                    }),
                    vec!["name"],
                ),
            ),
            ToolSpec::write(
                "update_group",
                "Update a group (requires WRITE_ENABLED=true)",
                json_schema_object(
                    json!({
                        "sys_id": json_schema_string("sys_id of the group"),
                        "fields": json_schema_record("Field values to set")
                    }),
                    vec!["sys_id", "fields"],
                ),
            ),
            ToolSpec::write(
                "add_user_to_group",
                "Add a user to a group (requires WRITE_ENABLED=true)",
                json_schema_object(
                    json!({
                        "user_sys_id": json_schema_string("sys_id of the user"),
                        "group_sys_id": json_schema_string("sys_id of the group")
                    }),
                    vec!["user_sys_id", "group_sys_id"],
                ),
            ),
            ToolSpec::write(
                "remove_user_from_group",
                "Remove a group membership (requires WRITE_ENABLED=true)",
                json_schema_object(
                    json!({ "member_sys_id": json_schema_string("sys_id of the sys_user_grmember record") }),
                    vec!["member_sys_id"],
                ),
            ),
        ]
    }

    async fn call(&self, ctx: &ToolContext, name: &str, args: Args) -> Option<NowResult<Value>> {
        let result = match name {
            "list_users" => list_active(ctx, &args, USER_TABLE, &USER_FIELDS, "users").await,
            "create_user" => create_user(ctx, &args).await,
            "update_user" => update(ctx, &args, USER_TABLE, "user").await,
            "list_groups" => list_active(ctx, &args, GROUP_TABLE, &GROUP_FIELDS, "groups").await,
            "create_group" => create_group(ctx, &args).await,
            "update_group" => update(ctx, &args, GROUP_TABLE, "group").await,
            "add_user_to_group" => add_user_to_group(ctx, &args).await,
            "remove_user_from_group" => remove_user_from_group(ctx, &args).await,
            _ => return None,
        };
        Some(result)
    }
}

async fn list_active(
    ctx: &ToolContext,
    args: &Args,
    table: &str,
    fields: &[&str],
    key: &str,
) -> NowResult<Value> {
    let descriptor = QueryDescriptor::new(table)
        .query(args.str("query").unwrap_or("active=true"))
        .limit(args.limit_or(20))
        .fields(fields.iter().copied());
    ctx.list_as(descriptor, key).await
}

async fn create_user(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    args.require_all(&["user_name", "email", "first_name", "last_name"])?;
    let record = ctx.client.table().create(USER_TABLE, &args.to_value()).await?;
    with_summary(record, format!("Created user {}", args.required("user_name")?))
}

async fn create_group(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let name = args.required("name")?;
    let record = ctx.client.table().create(GROUP_TABLE, &args.to_value()).await?;
    with_summary(record, format!("Created group {}", name))
}

async fn update(ctx: &ToolContext, args: &Args, table: &str, label: &str) -> NowResult<Value> {
    args.require_all(&["sys_id", "fields"])?;
    let sys_id = args.required("sys_id")?;
    let fields = args.required_object("fields")?;
    ctx.update_with_summary(table, sys_id, &fields, format!("Updated {} {}", label, sys_id))
        .await
}

async fn add_user_to_group(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    args.require_all(&["user_sys_id", "group_sys_id"])?;
    let user = args.required("user_sys_id")?;
    let group = args.required("group_sys_id")?;

    let record = ctx
        .client
        .table()
        .create(MEMBER_TABLE, &json!({ "user": user, "group": group }))
        .await?;
    with_summary(record, format!("Added user {} to group {}", user, group))
}

async fn remove_user_from_group(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let member = args.required("member_sys_id")?;
    ctx.client.table().delete(MEMBER_TABLE, member).await?;
    Ok(json!({ "summary": format!("Removed group member {}", member) }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::context::tests::test_context;
    use nowbridge_core::{Capabilities, ErrorKind};
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn call(ctx: &ToolContext, name: &str, args: Value) -> NowResult<Value> {
        UserTools
            .call(ctx, name, Args::new(args).unwrap())
            .await
            .expect("tool belongs to the user domain")
    }

    #[tokio::test]
    async fn test_list_users_defaults_to_active() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/now/table/sys_user"))
            .and(query_param("sysparm_query", "active=true"))
            .and(query_param("sysparm_limit", "20"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [{"user_name": "abel.tuter"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri(), Capabilities::default());
        let result = call(&ctx, "list_users", json!({})).await.unwrap();
        assert_eq!(result["users"][0]["user_name"], "abel.tuter");
    }

    #[tokio::test]
    async fn test_add_user_to_group() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/now/table/sys_user_grmember"))
            .and(body_json(json!({"user": "u1", "group": "g1"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "result": {"sys_id": "m1"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri(), Capabilities::all());
        let result = call(
            &ctx,
            "add_user_to_group",
            json!({"user_sys_id": "u1", "group_sys_id": "g1"}),
        )
        .await
        .unwrap();
        assert_eq!(result["summary"], "Added user u1 to group g1");
    }

    #[tokio::test]
    async fn test_remove_user_from_group() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/api/now/table/sys_user_grmember/m1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri(), Capabilities::all());
        let result = call(&ctx, "remove_user_from_group", json!({"member_sys_id": "m1"}))
            .await
            .unwrap();
        assert_eq!(result, json!({"summary": "Removed group member m1"}));
    }

    #[tokio::test]
    async fn test_create_user_validation() {
        let ctx = test_context("http://127.0.0.1:9", Capabilities::all());
        let err = call(&ctx, "create_user", json!({"user_name": "x"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert_eq!(
            err.message(),
            "user_name, email, first_name, and last_name are required"
        );
    }
}
