// Now Assist and platform AI tools
//
// Every tool here needs NOW_ASSIST_ENABLED=true.

use crate::tools::args::Args;
use crate::tools::context::{to_json, ToolContext};
use crate::tools::registry::{
    json_schema_boolean, json_schema_empty, json_schema_number, json_schema_object,
    json_schema_record, json_schema_string, ToolDomain, ToolSpec,
};
use nowbridge_core::{NowResult, ToolTier};
use nowbridge_sdk::{EncodedQuery, QueryDescriptor, DEFAULT_LIMIT};
use serde_json::{json, Map, Value};

const SKILL_ENDPOINT: &str = "/api/sn_assist/skill/invoke";
const ML_SOLUTION_TABLE: &str = "ml_solution";

pub struct NowAssistTools;

fn ai(name: &str, description: &str, input_schema: Value) -> ToolSpec {
    ToolSpec::new(name, description, input_schema, ToolTier::NowAssist)
}

#[async_trait::async_trait]
impl ToolDomain for NowAssistTools {
    fn name(&self) -> &'static str {
        "now_assist"
    }

    fn definitions(&self) -> Vec<ToolSpec> {
        vec![
            ai(
                "nlq_query",
                "Answer a plain English question with platform data (NLQ API)",
                json_schema_object(
                    json!({
                        "question": json_schema_string("Question, e.g. \"How many P1 incidents were opened this week?\""),
                        "table": json_schema_string("Optional target table hint"),
                        "limit": json_schema_number("Maximum results (default 10)")
                    }),
                    vec!["question"],
                ),
            ),
            ai(
                "ai_search",
                "Semantic search across knowledge, catalog and incidents (AI Search)",
                json_schema_object(
                    json!({
                        "query": json_schema_string("Natural language search query"),
                        "sources": {
                            "type": "array",
                            "items": { "type": "string" },
                            "description": "Sources to search, e.g. [\"kb\", \"catalog\", \"incident\"] (default all)"
                        },
                        "limit": json_schema_number("Maximum results (default 10)")
                    }),
                    vec!["query"],
                ),
            ),
            ai(
                "generate_summary",
                "Summarize any record with Now Assist",
                json_schema_object(
                    json!({
                        "table": json_schema_string("Table name, e.g. \"incident\""),
                        "sys_id": json_schema_string("sys_id of the record")
                    }),
                    vec!["table", "sys_id"],
                ),
            ),
            ai(
                "suggest_resolution",
                "Suggest a resolution for an incident from similar past incidents",
                json_schema_object(
                    json!({ "incident_sys_id": json_schema_string("sys_id of the incident") }),
                    vec!["incident_sys_id"],
                ),
            ),
            ai(
                "categorize_incident",
                "Predict category, assignment group and priority with Predictive Intelligence",
                json_schema_object(
                    json!({
                        "short_description": json_schema_string("Incident short description"),
                        "description": json_schema_string("Optional full description")
                    }),
                    vec!["short_description"],
                ),
            ),
            ai(
                "get_virtual_agent_topics",
                "List Virtual Agent topics",
                json_schema_object(
                    json!({
                        "active": json_schema_boolean("Only active topics (default true)"),
                        "category": json_schema_string("Topic category title"),
                        "limit": json_schema_number("Maximum results (default 20)")
                    }),
                    vec![],
                ),
            ),
            ai(
                "trigger_agentic_playbook",
                "Start an Agentic Playbook",
                json_schema_object(
                    json!({
                        "playbook_sys_id": json_schema_string("sys_id of the playbook"),
                        "context": json_schema_record("Context values passed to the playbook")
                    }),
                    vec!["playbook_sys_id"],
                ),
            ),
            ai(
                "get_ms_copilot_topics",
                "List Virtual Agent topics exposed to Microsoft Copilot 365",
                json_schema_object(
                    json!({ "limit": json_schema_number("Maximum results (default 20)") }),
                    vec![],
                ),
            ),
            ai(
                "generate_work_notes",
                "Draft work notes for a record from its current context",
                json_schema_object(
                    json!({
                        "table": json_schema_string("Table name"),
                        "sys_id": json_schema_string("sys_id of the record"),
                        "context": json_schema_string("Extra context for the draft")
                    }),
                    vec!["table", "sys_id"],
                ),
            ),
            ai(
                "get_pi_models",
                "List active Predictive Intelligence solutions",
                json_schema_empty(),
            ),
        ]
    }

    async fn call(&self, ctx: &ToolContext, name: &str, args: Args) -> Option<NowResult<Value>> {
        let result = match name {
            "nlq_query" => nlq_query(ctx, &args).await,
            "ai_search" => ai_search(ctx, &args).await,
            "generate_summary" => generate_summary(ctx, &args).await,
            "suggest_resolution" => suggest_resolution(ctx, &args).await,
            "categorize_incident" => categorize_incident(ctx, &args).await,
            "get_virtual_agent_topics" => get_virtual_agent_topics(ctx, &args).await,
            "trigger_agentic_playbook" => trigger_agentic_playbook(ctx, &args).await,
            "get_ms_copilot_topics" => get_ms_copilot_topics(ctx).await,
            "generate_work_notes" => generate_work_notes(ctx, &args).await,
            "get_pi_models" => get_pi_models(ctx).await,
            _ => return None,
        };
        Some(result)
    }
}

/// `base` with the fields of an object `response` laid over it. Other
/// responses are kept under `result`.
fn merge(base: Value, response: Value) -> Value {
    let mut out = match base {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    match response {
        Value::Object(fields) => out.extend(fields),
        Value::Null => {}
        other => {
            out.insert("result".to_string(), other);
        }
    }
    Value::Object(out)
}

/// The value at `pointer` when present and non-empty, else the whole response.
fn pick(response: Value, pointer: &str) -> Value {
    let picked = response.pointer(pointer).filter(|v| !is_blank(v)).cloned();
    picked.unwrap_or(response)
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Bool(b) => !b,
        _ => false,
    }
}

async fn invoke_skill(ctx: &ToolContext, skill: &str, input: Value) -> NowResult<Value> {
    ctx.client
        .rest()
        .post(SKILL_ENDPOINT, &json!({ "skill": skill, "input": input }))
        .await
}

async fn nlq_query(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let question = args.required("question")?;
    let mut payload = json!({
        "question": question,
        "limit": args.limit_or(DEFAULT_LIMIT),
    });
    if let Some(table) = args.str("table") {
        payload["table"] = json!(table);
    }

    let response = ctx
        .client
        .rest()
        .post("/api/sn_nl_text_to_value/text_query", &payload)
        .await?;
    Ok(merge(json!({ "question": question }), response))
}

async fn ai_search(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let query = args.required("query")?;

    let mut params = vec![
        ("q".to_string(), query.to_string()),
        ("limit".to_string(), args.limit_or(DEFAULT_LIMIT).to_string()),
    ];
    if let Some(sources) = args.value("sources").and_then(Value::as_array) {
        let joined = sources
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(",");
        params.push(("sources".to_string(), joined));
    }

    let response = ctx
        .client
        .rest()
        .post_with_query("/api/now/ai_search/search", &params, &json!({}))
        .await?;
    Ok(merge(json!({ "query": query }), response))
}

async fn generate_summary(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    args.require_all(&["table", "sys_id"])?;
    let table = args.required("table")?;
    let sys_id = args.required("sys_id")?;

    let response = invoke_skill(ctx, "summarize", json!({ "table": table, "sys_id": sys_id })).await?;
    Ok(json!({
        "table": table,
        "sys_id": sys_id,
        "summary": pick(response, "/output/summary"),
    }))
}

async fn suggest_resolution(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let incident = args.required("incident_sys_id")?;
    let response = invoke_skill(
        ctx,
        "resolution_suggestion",
        json!({ "table": "incident", "sys_id": incident }),
    )
    .await?;
    Ok(json!({
        "incident_sys_id": incident,
        "suggestion": pick(response, "/output"),
    }))
}

async fn categorize_incident(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let short_description = args.required("short_description")?;

    let solutions = ctx
        .client
        .table()
        .query(
            QueryDescriptor::new(ML_SOLUTION_TABLE)
                .query("active=true^table_name=incident")
                .limit(1)
                .fields(["sys_id", "name"]),
        )
        .await?;
    let Some(solution_id) = solutions
        .records
        .first()
        .and_then(|r| r.get("sys_id"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
    else {
        return Ok(json!({
            "message": "No active Predictive Intelligence solution found for incident table. Enable PI plugin and train a model."
        }));
    };

    let mut payload = json!({ "short_description": short_description });
    if let Some(description) = args.str("description") {
        payload["description"] = json!(description);
    }
    let prediction = ctx
        .client
        .rest()
        .post(&format!("/api/sn_ml/solution/{}/predict", solution_id), &payload)
        .await?;

    Ok(json!({
        "short_description": short_description,
        "prediction": prediction,
    }))
}

async fn get_virtual_agent_topics(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let query = EncodedQuery::new()
        .and_opt(args.bool("active").unwrap_or(true).then_some("active=true"))
        .and_opt(args.str("category").map(|c| format!("category.title={}", c)));

    let descriptor = QueryDescriptor::new("sys_cs_topic")
        .query_opt(query.build_opt())
        .limit(args.limit_or(20))
        .fields(["sys_id", "name", "active", "category", "description"]);
    ctx.list_as(descriptor, "topics").await
}

async fn trigger_agentic_playbook(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let playbook = args.required("playbook_sys_id")?;
    let payload = json!({
        "playbook_sys_id": playbook,
        "context": args.object("context").cloned().unwrap_or_default(),
    });

    let result = ctx
        .client
        .rest()
        .post("/api/sn_assist/playbook/trigger", &payload)
        .await?;
    Ok(json!({ "playbook_sys_id": playbook, "result": result }))
}

async fn get_ms_copilot_topics(ctx: &ToolContext) -> NowResult<Value> {
    let topics = ctx
        .client
        .rest()
        .post("/api/sn_assist/copilot/topics", &json!({}))
        .await?;
    Ok(json!({ "topics": topics }))
}

async fn generate_work_notes(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    args.require_all(&["table", "sys_id"])?;
    let table = args.required("table")?;
    let sys_id = args.required("sys_id")?;

    let mut input = json!({ "table": table, "sys_id": sys_id });
    if let Some(context) = args.str("context") {
        input["context"] = json!(context);
    }
    let response = invoke_skill(ctx, "work_notes_draft", input).await?;
    Ok(json!({
        "table": table,
        "sys_id": sys_id,
        "draft": pick(response, "/output/text"),
    }))
}

async fn get_pi_models(ctx: &ToolContext) -> NowResult<Value> {
    let response = ctx
        .client
        .table()
        .query(
            QueryDescriptor::new(ML_SOLUTION_TABLE)
                .query("active=true")
                .limit(20)
                .fields(["sys_id", "name", "table_name", "type", "active", "sys_updated_on"]),
        )
        .await?;
    Ok(json!({
        "count": response.count,
        "models": to_json(&response.records)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::context::tests::test_context;
    use nowbridge_core::{Capabilities, ErrorKind};
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn call(ctx: &ToolContext, name: &str, args: Value) -> NowResult<Value> {
        NowAssistTools
            .call(ctx, name, Args::new(args).unwrap())
            .await
            .expect("tool belongs to the now_assist domain")
    }

    #[test]
    fn test_every_tool_needs_now_assist() {
        let specs = NowAssistTools.definitions();
        assert_eq!(specs.len(), 10);
        assert!(specs.iter().all(|s| s.tier == ToolTier::NowAssist));
    }

    #[test]
    fn test_merge_and_pick() {
        let merged = merge(json!({"question": "q"}), json!({"answer": 3}));
        assert_eq!(merged, json!({"question": "q", "answer": 3}));

        let merged = merge(json!({"query": "x"}), json!(["a"]));
        assert_eq!(merged["result"], json!(["a"]));

        assert_eq!(pick(json!({"output": {"summary": "short"}}), "/output/summary"), "short");
        let whole = json!({"output": {"summary": ""}});
        assert_eq!(pick(whole.clone(), "/output/summary"), whole);
    }

    #[tokio::test]
    async fn test_generate_summary_uses_skill_output() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/sn_assist/skill/invoke"))
            .and(body_json(json!({
                "skill": "summarize",
                "input": {"table": "incident", "sys_id": "i1"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "output": {"summary": "Email outage in EMEA"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri(), Capabilities::all());
        let result = call(&ctx, "generate_summary", json!({"table": "incident", "sys_id": "i1"}))
            .await
            .unwrap();
        assert_eq!(result["summary"], "Email outage in EMEA");
    }

    #[tokio::test]
    async fn test_ai_search_sends_sources() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/now/ai_search/search"))
            .and(query_param("q", "vpn"))
            .and(query_param("limit", "10"))
            .and(query_param("sources", "kb,catalog"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"title": "VPN setup"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri(), Capabilities::all());
        let result = call(&ctx, "ai_search", json!({"query": "vpn", "sources": ["kb", "catalog"]}))
            .await
            .unwrap();
        assert_eq!(result["query"], "vpn");
        assert_eq!(result["results"][0]["title"], "VPN setup");
    }

    #[tokio::test]
    async fn test_categorize_without_solution() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/now/table/ml_solution"))
            .and(query_param("sysparm_query", "active=true^table_name=incident"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": []})))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri(), Capabilities::all());
        let result = call(&ctx, "categorize_incident", json!({"short_description": "Printer jam"}))
            .await
            .unwrap();
        assert!(result["message"]
            .as_str()
            .unwrap()
            .starts_with("No active Predictive Intelligence solution"));
    }

    #[tokio::test]
    async fn test_categorize_with_solution() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/now/table/ml_solution"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": [{"sys_id": "sol1", "name": "Incident categorization"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/sn_ml/solution/sol1/predict"))
            .and(body_json(json!({"short_description": "Printer jam"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "category": "hardware"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri(), Capabilities::all());
        let result = call(&ctx, "categorize_incident", json!({"short_description": "Printer jam"}))
            .await
            .unwrap();
        assert_eq!(result["prediction"]["category"], "hardware");
    }

    #[tokio::test]
    async fn test_validation() {
        let ctx = test_context("http://127.0.0.1:9", Capabilities::all());
        let err = call(&ctx, "generate_work_notes", json!({"table": "incident"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert_eq!(err.message(), "table and sys_id are required");
    }
}
