// Generic task tools

use crate::tools::args::Args;
use crate::tools::context::ToolContext;
use crate::tools::registry::{
    json_schema_number, json_schema_object, json_schema_record, json_schema_string, ToolDomain,
    ToolSpec,
};
use nowbridge_core::NowResult;
use nowbridge_sdk::{EncodedQuery, QueryDescriptor, DEFAULT_LIMIT};
use serde_json::{json, Value};

const TABLE: &str = "task";
const STATE_CLOSED_COMPLETE: &str = "3";

pub struct TaskTools;

#[async_trait::async_trait]
impl ToolDomain for TaskTools {
    fn name(&self) -> &'static str {
        "task"
    }

    fn definitions(&self) -> Vec<ToolSpec> {
        vec![
            ToolSpec::read(
                "get_task",
                "Get any task record by number or sys_id",
                json_schema_object(
                    json!({ "number_or_sysid": json_schema_string("Task number or sys_id") }),
                    vec!["number_or_sysid"],
                ),
            ),
            ToolSpec::write(
                "update_task",
                "Update fields on a task (requires WRITE_ENABLED=true)",
                json_schema_object(
                    json!({
                        "sys_id": json_schema_string("sys_id of the task"),
                        "fields": json_schema_record("Field values to set")
                    }),
                    vec!["sys_id", "fields"],
                ),
            ),
            ToolSpec::read(
                "list_my_tasks",
                "List open tasks assigned to the configured user",
                json_schema_object(
                    json!({ "limit": json_schema_number("Maximum tasks (default 10)") }),
                    vec![],
                ),
            ),
            ToolSpec::write(
                "complete_task",
                "Mark a task as complete (requires WRITE_ENABLED=true)",
                json_schema_object(
                    json!({
                        "sys_id": json_schema_string("sys_id of the task"),
                        "close_notes": json_schema_string("Optional closure notes")
                    }),
                    vec!["sys_id"],
                ),
            ),
        ]
    }

    async fn call(&self, ctx: &ToolContext, name: &str, args: Args) -> Option<NowResult<Value>> {
        let result = match name {
            "get_task" => get_task(ctx, &args).await,
            "update_task" => update_task(ctx, &args).await,
            "list_my_tasks" => list_my_tasks(ctx, &args).await,
            "complete_task" => complete_task(ctx, &args).await,
            _ => return None,
        };
        Some(result)
    }
}

async fn get_task(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let identifier = args.required("number_or_sysid")?;
    ctx.get_by_number_or_sys_id(TABLE, identifier, "Task").await
}

async fn update_task(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    args.require_all(&["sys_id", "fields"])?;
    let sys_id = args.required("sys_id")?;
    let fields = args.required_object("fields")?;
    ctx.update_with_summary(TABLE, sys_id, &fields, format!("Updated task {}", sys_id))
        .await
}

async fn list_my_tasks(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    // Without a configured user this lists every open task.
    let query = EncodedQuery::from_raw("active=true^state!=3").and_opt(
        ctx.username
            .as_deref()
            .filter(|u| !u.is_empty())
            .map(|u| format!("assigned_to.user_name={}", u)),
    );

    let descriptor = QueryDescriptor::new(TABLE)
        .query(query.build())
        .limit(args.limit_or(DEFAULT_LIMIT))
        .order_by("-sys_updated_on");
    ctx.list_as(descriptor, "tasks").await
}

async fn complete_task(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let sys_id = args.required("sys_id")?;
    let mut data = json!({ "state": STATE_CLOSED_COMPLETE });
    if let Some(notes) = args.str("close_notes") {
        data["close_notes"] = json!(notes);
    }
    ctx.update_with_summary(TABLE, sys_id, &data, format!("Completed task {}", sys_id))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::context::tests::test_context;
    use nowbridge_core::Capabilities;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn call(ctx: &ToolContext, name: &str, args: Value) -> NowResult<Value> {
        TaskTools
            .call(ctx, name, Args::new(args).unwrap())
            .await
            .expect("tool belongs to the task domain")
    }

    #[tokio::test]
    async fn test_list_my_tasks_scopes_to_user() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/now/table/task"))
            .and(query_param(
                "sysparm_query",
                "active=true^state!=3^assigned_to.user_name=admin^ORDERBYsys_updated_on^ORDERBYDESC",
            ))
            .and(query_param("sysparm_limit", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [{"number": "TASK0001"}, {"number": "TASK0002"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri(), Capabilities::default());
        let result = call(&ctx, "list_my_tasks", json!({})).await.unwrap();
        assert_eq!(result["count"], 2);
        assert_eq!(result["tasks"][1]["number"], "TASK0002");
    }

    #[tokio::test]
    async fn test_list_my_tasks_without_user() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/now/table/task"))
            .and(query_param(
                "sysparm_query",
                "active=true^state!=3^ORDERBYsys_updated_on^ORDERBYDESC",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": []})))
            .expect(1)
            .mount(&server)
            .await;

        let mut ctx = test_context(&server.uri(), Capabilities::default());
        ctx.username = None;
        let result = call(&ctx, "list_my_tasks", json!({})).await.unwrap();
        assert_eq!(result["count"], 0);
    }

    #[tokio::test]
    async fn test_complete_task_with_and_without_notes() {
        let server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path("/api/now/table/task/t1"))
            .and(body_json(json!({"state": "3", "close_notes": "All done"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {"sys_id": "t1"}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/api/now/table/task/t2"))
            .and(body_json(json!({"state": "3"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {"sys_id": "t2"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri(), Capabilities::all());
        let result = call(&ctx, "complete_task", json!({"sys_id": "t1", "close_notes": "All done"}))
            .await
            .unwrap();
        assert_eq!(result["summary"], "Completed task t1");

        let result = call(&ctx, "complete_task", json!({"sys_id": "t2"})).await.unwrap();
        assert_eq!(result["summary"], "Completed task t2");
    }
}
