// Automated Test Framework tools

use crate::tools::args::Args;
use crate::tools::context::{summarize, to_json, ToolContext};
use crate::tools::registry::{
    json_schema_boolean, json_schema_number, json_schema_object, json_schema_string, ToolDomain,
    ToolSpec,
};
use nowbridge_core::{NowResult, ToolTier};
use nowbridge_sdk::{EncodedQuery, QueryDescriptor};
use serde_json::{json, Value};

const SUITE_TABLE: &str = "sys_atf_test_suite";
const TEST_TABLE: &str = "sys_atf_test";
const SUITE_RESULT_TABLE: &str = "sys_atf_test_suite_result";
const RESULT_TABLE: &str = "sys_atf_result";
const FAILURE_INSIGHT_TABLE: &str = "sys_atf_failure_insight";

const SUITE_FIELDS: [&str; 5] = ["sys_id", "name", "active", "description", "sys_updated_on"];
const RESULT_FIELDS: [&str; 6] = [
    "sys_id",
    "test",
    "status",
    "message",
    "test_suite_result",
    "sys_updated_on",
];

pub struct AtfTools;

#[async_trait::async_trait]
impl ToolDomain for AtfTools {
    fn name(&self) -> &'static str {
        "atf"
    }

    fn definitions(&self) -> Vec<ToolSpec> {
        vec![
            ToolSpec::read(
                "list_atf_suites",
                "List ATF test suites",
                json_schema_object(
                    json!({
                        "active": json_schema_boolean("Only active suites (default true)"),
                        "query": json_schema_string("Additional filter"),
                        "limit": json_schema_number("Maximum results (default 20)")
                    }),
                    vec![],
                ),
            ),
            ToolSpec::read(
                "get_atf_suite",
                "Get a test suite by sys_id or name",
                json_schema_object(
                    json!({ "sys_id_or_name": json_schema_string("Test suite sys_id or name") }),
                    vec!["sys_id_or_name"],
                ),
            ),
            ToolSpec::new(
                "run_atf_suite",
                "Run an ATF test suite (requires ATF_ENABLED=true)",
                json_schema_object(
                    json!({ "sys_id": json_schema_string("sys_id of the test suite") }),
                    vec!["sys_id"],
                ),
                ToolTier::Atf,
            ),
            ToolSpec::read(
                "list_atf_tests",
                "List ATF tests, optionally within one suite",
                json_schema_object(
                    json!({
                        "suite_sys_id": json_schema_string("Only tests of this suite"),
                        "active": json_schema_boolean("Only active tests (default true)"),
                        "limit": json_schema_number("Maximum results (default 20)")
                    }),
                    vec![],
                ),
            ),
            ToolSpec::read(
                "get_atf_test",
                "Get one ATF test",
                json_schema_object(
                    json!({ "sys_id": json_schema_string("sys_id of the test") }),
                    vec!["sys_id"],
                ),
            ),
            ToolSpec::new(
                "run_atf_test",
                "Run a single ATF test (requires ATF_ENABLED=true)",
                json_schema_object(
                    json!({ "sys_id": json_schema_string("sys_id of the test") }),
                    vec!["sys_id"],
                ),
                ToolTier::Atf,
            ),
            ToolSpec::read(
                "get_atf_suite_result",
                "Get the result of a suite run",
                json_schema_object(
                    json!({ "result_sys_id": json_schema_string("sys_id of the suite result") }),
                    vec!["result_sys_id"],
                ),
            ),
            ToolSpec::read(
                "list_atf_test_results",
                "List the individual test results of a suite run",
                json_schema_object(
                    json!({
                        "suite_result_sys_id": json_schema_string("sys_id of the suite result"),
                        "limit": json_schema_number("Maximum results (default 50)")
                    }),
                    vec![],
                ),
            ),
            ToolSpec::read(
                "get_atf_failure_insight",
                "Metadata changes (roles, field values, configuration) between the last passing and a failing run",
                json_schema_object(
                    json!({ "result_sys_id": json_schema_string("sys_id of the failed suite result") }),
                    vec!["result_sys_id"],
                ),
            ),
        ]
    }

    async fn call(&self, ctx: &ToolContext, name: &str, args: Args) -> Option<NowResult<Value>> {
        let result = match name {
            "list_atf_suites" => list_atf_suites(ctx, &args).await,
            "get_atf_suite" => get_atf_suite(ctx, &args).await,
            "run_atf_suite" => run(ctx, &args, "run_suite", "test suite").await,
            "list_atf_tests" => list_atf_tests(ctx, &args).await,
            "get_atf_test" => get_by_sys_id(ctx, &args, TEST_TABLE, "sys_id").await,
            "run_atf_test" => run(ctx, &args, "run_test", "test").await,
            "get_atf_suite_result" => {
                get_by_sys_id(ctx, &args, SUITE_RESULT_TABLE, "result_sys_id").await
            }
            "list_atf_test_results" => list_atf_test_results(ctx, &args).await,
            "get_atf_failure_insight" => get_atf_failure_insight(ctx, &args).await,
            _ => return None,
        };
        Some(result)
    }
}

/// `active=true` unless the caller passed `active: false`.
fn active_filter(args: &Args) -> Option<&'static str> {
    args.bool("active").unwrap_or(true).then_some("active=true")
}

async fn list_atf_suites(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let query = EncodedQuery::new()
        .and_opt(active_filter(args))
        .and_opt(args.str("query"));

    let descriptor = QueryDescriptor::new(SUITE_TABLE)
        .query_opt(query.build_opt())
        .limit(args.limit_or(20))
        .fields(SUITE_FIELDS);
    ctx.list_as(descriptor, "suites").await
}

async fn get_atf_suite(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let identifier = args.required("sys_id_or_name")?;
    ctx.get_by_field_or_sys_id(SUITE_TABLE, "name", identifier, "Test suite")
        .await
}

async fn get_by_sys_id(ctx: &ToolContext, args: &Args, table: &str, key: &str) -> NowResult<Value> {
    let sys_id = args.required(key)?;
    to_json(ctx.client.table().get(table, sys_id, None).await?)
}

/// Start a suite or test through the ATF runner endpoint.
async fn run(ctx: &ToolContext, args: &Args, action: &str, label: &str) -> NowResult<Value> {
    let sys_id = args.required("sys_id")?;
    let response = ctx
        .client
        .rest()
        .post(
            &format!("/api/now/atf/runner/{}", action),
            &json!({ "sys_id": sys_id }),
        )
        .await?;
    Ok(summarize(response, format!("Started {} {}", label, sys_id)))
}

async fn list_atf_tests(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let query = EncodedQuery::new()
        .and_opt(active_filter(args))
        .and_opt(args.str("suite_sys_id").map(|s| format!("test_suite={}", s)));

    let descriptor = QueryDescriptor::new(TEST_TABLE)
        .query_opt(query.build_opt())
        .limit(args.limit_or(20));
    ctx.list_as(descriptor, "tests").await
}

async fn list_atf_test_results(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let descriptor = QueryDescriptor::new(RESULT_TABLE)
        .query_opt(
            args.str("suite_result_sys_id")
                .map(|s| format!("test_suite_result={}", s)),
        )
        .limit(args.limit_or(50))
        .fields(RESULT_FIELDS);
    ctx.list_as(descriptor, "results").await
}

async fn get_atf_failure_insight(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let result_sys_id = args.required("result_sys_id")?;
    let response = ctx
        .client
        .table()
        .query(
            QueryDescriptor::new(FAILURE_INSIGHT_TABLE)
                .query(format!("test_suite_result={}", result_sys_id)),
        )
        .await?;

    Ok(json!({
        "result_sys_id": result_sys_id,
        "failure_insight": to_json(&response.records)?,
        "summary": format!(
            "Found {} metadata change(s) between last passing and failing run",
            response.count
        ),
        "note": "Failure Insight surfaces role changes, field value changes and configuration diffs that caused test failures",
    }))
}
