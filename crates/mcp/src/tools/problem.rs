// Problem management tools

use crate::tools::args::Args;
use crate::tools::context::{now_iso, record_label, with_summary, ToolContext};
use crate::tools::registry::{
    json_schema_number, json_schema_object, json_schema_record, json_schema_string, ToolDomain,
    ToolSpec,
};
use nowbridge_core::NowResult;
use serde_json::{json, Value};

const TABLE: &str = "problem";
const STATE_RESOLVED: &str = "107";

pub struct ProblemTools;

#[async_trait::async_trait]
impl ToolDomain for ProblemTools {
    fn name(&self) -> &'static str {
        "problem"
    }

    fn definitions(&self) -> Vec<ToolSpec> {
        vec![
            ToolSpec::write(
                "create_problem",
                "Create a problem record (requires WRITE_ENABLED=true)",
                json_schema_object(
                    json!({
                        "short_description": json_schema_string("Brief description of the problem"),
                        "description": json_schema_string("Detailed description"),
                        "assignment_group": json_schema_string("Assignment group name or sys_id"),
                        "priority": json_schema_number("1=Critical, 2=High, 3=Moderate, 4=Low")
                    }),
                    vec!["short_description"],
                ),
            ),
            ToolSpec::read(
                "get_problem",
                "Get a problem by number (PRB...) or sys_id",
                json_schema_object(
                    json!({ "number_or_sysid": json_schema_string("Problem number or sys_id") }),
                    vec!["number_or_sysid"],
                ),
            ),
            ToolSpec::write(
                "update_problem",
                "Update fields on a problem (requires WRITE_ENABLED=true)",
                json_schema_object(
                    json!({
                        "sys_id": json_schema_string("sys_id of the problem"),
                        "fields": json_schema_record("Field values to set")
                    }),
                    vec!["sys_id", "fields"],
                ),
            ),
            ToolSpec::write(
                "resolve_problem",
                "Resolve a problem with its root cause and fix (requires WRITE_ENABLED=true)",
                json_schema_object(
                    json!({
                        "sys_id": json_schema_string("sys_id of the problem"),
                        "root_cause": json_schema_string("Root cause of the problem"),
                        "resolution_notes": json_schema_string("How the problem was fixed")
                    }),
                    vec!["sys_id", "root_cause", "resolution_notes"],
                ),
            ),
        ]
    }

    async fn call(&self, ctx: &ToolContext, name: &str, args: Args) -> Option<NowResult<Value>> {
        let result = match name {
            "create_problem" => create_problem(ctx, &args).await,
            "get_problem" => get_problem(ctx, &args).await,
            "update_problem" => update_problem(ctx, &args).await,
            "resolve_problem" => resolve_problem(ctx, &args).await,
            _ => return None,
        };
        Some(result)
    }
}

async fn create_problem(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    args.required("short_description")?;
    let record = ctx.client.table().create(TABLE, &args.to_value()).await?;
    let summary = format!("Created problem {}", record_label(&record));
    with_summary(record, summary)
}

async fn get_problem(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let identifier = args.required("number_or_sysid")?;
    ctx.get_by_number_or_sys_id(TABLE, identifier, "Problem").await
}

async fn update_problem(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    args.require_all(&["sys_id", "fields"])?;
    let sys_id = args.required("sys_id")?;
    let fields = args.required_object("fields")?;
    ctx.update_with_summary(TABLE, sys_id, &fields, format!("Updated problem {}", sys_id))
        .await
}

async fn resolve_problem(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    args.require_all(&["sys_id", "root_cause", "resolution_notes"])?;
    let sys_id = args.required("sys_id")?;
    let data = json!({
        "state": STATE_RESOLVED,
        "cause_notes": args.str("root_cause"),
        "fix_notes": args.str("resolution_notes"),
        "resolved_at": now_iso(),
    });
    ctx.update_with_summary(TABLE, sys_id, &data, format!("Resolved problem {}", sys_id))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::context::tests::test_context;
    use nowbridge_core::{Capabilities, ErrorKind};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn call(ctx: &ToolContext, name: &str, args: Value) -> NowResult<Value> {
        ProblemTools
            .call(ctx, name, Args::new(args).unwrap())
            .await
            .expect("tool belongs to the problem domain")
    }

    #[tokio::test]
    async fn test_create_problem_summary_falls_back_to_sys_id() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/now/table/problem"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "result": {"sys_id": "p1"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri(), Capabilities::all());
        let result = call(&ctx, "create_problem", json!({"short_description": "Disk leak"}))
            .await
            .unwrap();
        assert_eq!(result["summary"], "Created problem p1");
    }

    #[tokio::test]
    async fn test_resolve_problem() {
        let server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path("/api/now/table/problem/p1"))
            .and(body_partial_json(json!({
                "state": "107",
                "cause_notes": "Bad config",
                "fix_notes": "Rolled back"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {"sys_id": "p1", "state": "107"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri(), Capabilities::all());
        let result = call(
            &ctx,
            "resolve_problem",
            json!({"sys_id": "p1", "root_cause": "Bad config", "resolution_notes": "Rolled back"}),
        )
        .await
        .unwrap();
        assert_eq!(result["summary"], "Resolved problem p1");
    }

    #[tokio::test]
    async fn test_resolve_problem_requires_all_fields() {
        let ctx = test_context("http://127.0.0.1:9", Capabilities::all());
        let err = call(&ctx, "resolve_problem", json!({"sys_id": "p1"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert_eq!(err.message(), "sys_id, root_cause, and resolution_notes are required");
    }

    #[tokio::test]
    async fn test_update_problem_rejects_non_object_fields() {
        let ctx = test_context("http://127.0.0.1:9", Capabilities::all());
        let err = call(&ctx, "update_problem", json!({"sys_id": "p1", "fields": "state=2"}))
            .await
            .unwrap_err();
        assert_eq!(err.message(), "fields must be an object");
    }
}
