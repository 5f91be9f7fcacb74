// Incident management tools

use crate::tools::args::Args;
use crate::tools::context::{now_iso, record_label, with_summary, ToolContext};
use crate::tools::registry::{
    json_schema_number, json_schema_object, json_schema_record, json_schema_string, ToolDomain,
    ToolSpec,
};
use nowbridge_core::NowResult;
use serde_json::{json, Value};

const TABLE: &str = "incident";

/// Incident state codes.
const STATE_RESOLVED: &str = "6";
const STATE_CLOSED: &str = "7";

pub struct IncidentTools;

#[async_trait::async_trait]
impl ToolDomain for IncidentTools {
    fn name(&self) -> &'static str {
        "incident"
    }

    fn definitions(&self) -> Vec<ToolSpec> {
        vec![
            ToolSpec::write(
                "create_incident",
                "Create an incident (requires WRITE_ENABLED=true)",
                json_schema_object(
                    json!({
                        "short_description": json_schema_string("Brief description of the issue"),
                        "urgency": json_schema_number("1=High, 2=Medium, 3=Low"),
                        "impact": json_schema_number("1=High, 2=Medium, 3=Low"),
                        "priority": json_schema_number("1=Critical, 2=High, 3=Moderate, 4=Low"),
                        "description": json_schema_string("Detailed description"),
                        "assignment_group": json_schema_string("Assignment group name or sys_id"),
                        "caller_id": json_schema_string("Caller user name or sys_id"),
                        "category": json_schema_string("Incident category"),
                        "subcategory": json_schema_string("Incident subcategory")
                    }),
                    vec!["short_description"],
                ),
            ),
            ToolSpec::read(
                "get_incident",
                "Get an incident by number (e.g. INC0012345) or sys_id",
                json_schema_object(
                    json!({ "number_or_sysid": json_schema_string("Incident number or sys_id") }),
                    vec!["number_or_sysid"],
                ),
            ),
            ToolSpec::write(
                "update_incident",
                "Update fields on an incident (requires WRITE_ENABLED=true)",
                json_schema_object(
                    json!({
                        "sys_id": json_schema_string("sys_id of the incident"),
                        "fields": json_schema_record("Field values to set, e.g. {\"state\": \"2\"}")
                    }),
                    vec!["sys_id", "fields"],
                ),
            ),
            ToolSpec::write(
                "resolve_incident",
                "Resolve an incident with a resolution code and notes (requires WRITE_ENABLED=true)",
                json_schema_object(
                    json!({
                        "sys_id": json_schema_string("sys_id of the incident"),
                        "resolution_code": json_schema_string("Resolution code, e.g. \"Solved (Permanently)\""),
                        "resolution_notes": json_schema_string("How the incident was resolved")
                    }),
                    vec!["sys_id", "resolution_code", "resolution_notes"],
                ),
            ),
            ToolSpec::write(
                "close_incident",
                "Close a resolved incident (requires WRITE_ENABLED=true)",
                json_schema_object(
                    json!({ "sys_id": json_schema_string("sys_id of the incident") }),
                    vec!["sys_id"],
                ),
            ),
            ToolSpec::write(
                "add_work_note",
                "Add an internal work note to any task-based record (requires WRITE_ENABLED=true)",
                json_schema_object(
                    json!({
                        "table": json_schema_string("Table name, e.g. \"incident\""),
                        "sys_id": json_schema_string("sys_id of the record"),
                        "note": json_schema_string("Work note text, not visible to the caller")
                    }),
                    vec!["table", "sys_id", "note"],
                ),
            ),
            ToolSpec::write(
                "add_comment",
                "Add a caller-visible comment to any task-based record (requires WRITE_ENABLED=true)",
                json_schema_object(
                    json!({
                        "table": json_schema_string("Table name, e.g. \"incident\""),
                        "sys_id": json_schema_string("sys_id of the record"),
                        "comment": json_schema_string("Comment text, visible to the caller")
                    }),
                    vec!["table", "sys_id", "comment"],
                ),
            ),
        ]
    }

    async fn call(&self, ctx: &ToolContext, name: &str, args: Args) -> Option<NowResult<Value>> {
        let result = match name {
            "create_incident" => create_incident(ctx, &args).await,
            "get_incident" => get_incident(ctx, &args).await,
            "update_incident" => update_incident(ctx, &args).await,
            "resolve_incident" => resolve_incident(ctx, &args).await,
            "close_incident" => close_incident(ctx, &args).await,
            "add_work_note" => add_journal(ctx, &args, "note", "work_notes", "work note").await,
            "add_comment" => add_journal(ctx, &args, "comment", "comments", "comment").await,
            _ => return None,
        };
        Some(result)
    }
}

async fn create_incident(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    args.required("short_description")?;
    let record = ctx.client.table().create(TABLE, &args.to_value()).await?;
    let summary = format!("Created incident {}", record_label(&record));
    with_summary(record, summary)
}

async fn get_incident(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let identifier = args.required("number_or_sysid")?;
    ctx.get_by_number_or_sys_id(TABLE, identifier, "Incident")
        .await
}

async fn update_incident(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    args.require_all(&["sys_id", "fields"])?;
    let sys_id = args.required("sys_id")?;
    let fields = args.required_object("fields")?;
    ctx.update_with_summary(TABLE, sys_id, &fields, format!("Updated incident {}", sys_id))
        .await
}

async fn resolve_incident(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    args.require_all(&["sys_id", "resolution_code", "resolution_notes"])?;
    let sys_id = args.required("sys_id")?;
    let data = json!({
        "state": STATE_RESOLVED,
        "close_code": args.str("resolution_code"),
        "close_notes": args.str("resolution_notes"),
        "resolved_at": now_iso(),
    });
    ctx.update_with_summary(TABLE, sys_id, &data, format!("Resolved incident {}", sys_id))
        .await
}

async fn close_incident(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let sys_id = args.required("sys_id")?;
    ctx.update_with_summary(
        TABLE,
        sys_id,
        &json!({ "state": STATE_CLOSED }),
        format!("Closed incident {}", sys_id),
    )
    .await
}

/// Append to a journal field (`work_notes` or `comments`) of any record.
async fn add_journal(
    ctx: &ToolContext,
    args: &Args,
    text_arg: &str,
    journal_field: &str,
    label: &str,
) -> NowResult<Value> {
    args.require_all(&["table", "sys_id", text_arg])?;
    let table = args.required("table")?;
    let sys_id = args.required("sys_id")?;
    let mut data = serde_json::Map::new();
    data.insert(journal_field.to_string(), json!(args.str(text_arg)));

    ctx.update_with_summary(
        table,
        sys_id,
        &Value::Object(data),
        format!("Added {} to {} {}", label, table, sys_id),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::context::tests::test_context;
    use nowbridge_core::{Capabilities, ErrorKind};
    use wiremock::matchers::{body_json, body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn call(ctx: &ToolContext, name: &str, args: Value) -> NowResult<Value> {
        IncidentTools
            .call(ctx, name, Args::new(args).unwrap())
            .await
            .expect("tool belongs to the incident domain")
    }

    #[tokio::test]
    async fn test_get_incident_by_number() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/now/table/incident"))
            .and(query_param("sysparm_query", "number=INC0010001"))
            .and(query_param("sysparm_limit", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [{"number": "INC0010001", "state": "2"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri(), Capabilities::default());
        let incident = call(&ctx, "get_incident", json!({"number_or_sysid": "INC0010001"}))
            .await
            .unwrap();
        assert_eq!(incident["state"], "2");
    }

    #[tokio::test]
    async fn test_get_incident_by_sys_id() {
        let server = MockServer::start().await;
        let sys_id = "9d385017c611228701d22104cc95c371";

        Mock::given(method("GET"))
            .and(path(format!("/api/now/table/incident/{}", sys_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {"sys_id": sys_id, "number": "INC0000001"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri(), Capabilities::default());
        let incident = call(&ctx, "get_incident", json!({"number_or_sysid": sys_id}))
            .await
            .unwrap();
        assert_eq!(incident["number"], "INC0000001");
    }

    #[tokio::test]
    async fn test_get_incident_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/now/table/incident"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": []})))
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri(), Capabilities::default());
        let err = call(&ctx, "get_incident", json!({"number_or_sysid": "INC9999999"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.message(), "Incident not found: INC9999999");
    }

    #[tokio::test]
    async fn test_resolve_incident_sets_state() {
        let server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path("/api/now/table/incident/abc"))
            .and(body_partial_json(json!({
                "state": "6",
                "close_code": "Solved (Permanently)",
                "close_notes": "Rebooted"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {"sys_id": "abc", "state": "6"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri(), Capabilities::all());
        let result = call(
            &ctx,
            "resolve_incident",
            json!({
                "sys_id": "abc",
                "resolution_code": "Solved (Permanently)",
                "resolution_notes": "Rebooted"
            }),
        )
        .await
        .unwrap();
        assert_eq!(result["summary"], "Resolved incident abc");
    }

    #[tokio::test]
    async fn test_add_work_note() {
        let server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path("/api/now/table/change_request/c1"))
            .and(body_json(json!({"work_notes": "Checked logs"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {"sys_id": "c1"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri(), Capabilities::all());
        let result = call(
            &ctx,
            "add_work_note",
            json!({"table": "change_request", "sys_id": "c1", "note": "Checked logs"}),
        )
        .await
        .unwrap();
        assert_eq!(result["summary"], "Added work note to change_request c1");
    }

    #[tokio::test]
    async fn test_validation_messages() {
        let ctx = test_context("http://127.0.0.1:9", Capabilities::all());

        let err = call(&ctx, "add_comment", json!({"table": "incident"})).await.unwrap_err();
        assert_eq!(err.message(), "table, sys_id, and comment are required");

        let err = call(&ctx, "update_incident", json!({"sys_id": "abc"})).await.unwrap_err();
        assert_eq!(err.message(), "sys_id and fields are required");

        let err = call(&ctx, "create_incident", json!({})).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert_eq!(err.message(), "short_description is required");
    }
}
