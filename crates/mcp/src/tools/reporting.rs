// Reporting and analytics tools

use crate::tools::args::Args;
use crate::tools::context::{now_iso, to_json, ToolContext};
use crate::tools::registry::{
    json_schema_boolean, json_schema_number, json_schema_object, json_schema_string, ToolDomain,
    ToolSpec,
};
use chrono::{Datelike, Months, NaiveDate, Utc};
use nowbridge_core::{NowError, NowResult};
use nowbridge_sdk::{EncodedQuery, QueryDescriptor, MAX_QUERY_LIMIT};
use serde_json::{json, Value};
use tracing::warn;

const REPORT_TABLE: &str = "sys_report";

const REPORT_FIELDS: [&str; 7] = [
    "sys_id",
    "title",
    "table",
    "type",
    "category",
    "sys_updated_on",
    "user",
];
const JOB_FIELDS: [&str; 7] = [
    "sys_id",
    "name",
    "run_type",
    "run_time",
    "next_action",
    "active",
    "last_run_time",
];

const DEFAULT_AGGREGATE: &str = "COUNT";
const DEFAULT_TREND_PERIODS: u32 = 6;
const MAX_TREND_PERIODS: u32 = 60;
const DEFAULT_EXPORT_LIMIT: u32 = 100;

pub struct ReportingTools;

#[async_trait::async_trait]
impl ToolDomain for ReportingTools {
    fn name(&self) -> &'static str {
        "reporting"
    }

    fn definitions(&self) -> Vec<ToolSpec> {
        vec![
            ToolSpec::read(
                "list_reports",
                "List saved reports",
                json_schema_object(
                    json!({
                        "search": json_schema_string("Match report names containing this text"),
                        "category": json_schema_string("Filter by report category"),
                        "limit": json_schema_number("Maximum results (default 20)")
                    }),
                    vec![],
                ),
            ),
            ToolSpec::read(
                "get_report",
                "Get the definition of a saved report",
                json_schema_object(
                    json!({ "sys_id_or_name": json_schema_string("Report sys_id or exact title") }),
                    vec!["sys_id_or_name"],
                ),
            ),
            ToolSpec::read(
                "run_aggregate_query",
                "Grouped aggregate (COUNT, SUM, AVG, MIN, MAX) over any table via the Stats API",
                json_schema_object(
                    json!({
                        "table": json_schema_string("Table to aggregate, e.g. \"incident\""),
                        "group_by": json_schema_string("Field to group by, e.g. \"priority\""),
                        "aggregate": json_schema_string("Aggregate function (default COUNT)"),
                        "query": json_schema_string("Optional encoded query filter"),
                        "limit": json_schema_number("Maximum groups (default 20)")
                    }),
                    vec!["table", "group_by"],
                ),
            ),
            ToolSpec::read(
                "trend_query",
                "Monthly counts of a table, grouped by a field",
                json_schema_object(
                    json!({
                        "table": json_schema_string("Table name"),
                        "date_field": json_schema_string("Date field to bucket by, e.g. \"opened_at\""),
                        "group_by": json_schema_string("Grouping field within each month"),
                        "query": json_schema_string("Optional encoded query filter"),
                        "periods": json_schema_number("Months to look back (default 6, max 60)")
                    }),
                    vec!["table", "date_field", "group_by"],
                ),
            ),
            ToolSpec::read(
                "get_performance_analytics",
                "Performance Analytics widget data (requires the PA plugin)",
                json_schema_object(
                    json!({
                        "widget_sys_id": json_schema_string("sys_id of the PA widget"),
                        "time_range": json_schema_string("Time range, e.g. \"last_30_days\"")
                    }),
                    vec!["widget_sys_id"],
                ),
            ),
            ToolSpec::read(
                "export_report_data",
                "Export raw table data as JSON for external reports",
                json_schema_object(
                    json!({
                        "table": json_schema_string("Table to export from"),
                        "query": json_schema_string("Encoded query filter"),
                        "fields": json_schema_string("Comma-separated fields"),
                        "limit": json_schema_number("Maximum records (default 100, max 1000)")
                    }),
                    vec!["table"],
                ),
            ),
            ToolSpec::read(
                "get_sys_log",
                "Read system log entries, newest first",
                json_schema_object(
                    json!({
                        "query": json_schema_string("Encoded filter, e.g. \"level=error\""),
                        "limit": json_schema_number("Maximum entries (default 20)")
                    }),
                    vec![],
                ),
            ),
            ToolSpec::read(
                "list_scheduled_jobs",
                "List scheduled jobs and their run schedules",
                json_schema_object(
                    json!({
                        "active": json_schema_boolean("Only active jobs (default true)"),
                        "query": json_schema_string("Additional filter"),
                        "limit": json_schema_number("Maximum results (default 20)")
                    }),
                    vec![],
                ),
            ),
        ]
    }

    async fn call(&self, ctx: &ToolContext, name: &str, args: Args) -> Option<NowResult<Value>> {
        let result = match name {
            "list_reports" => list_reports(ctx, &args).await,
            "get_report" => get_report(ctx, &args).await,
            "run_aggregate_query" => run_aggregate_query(ctx, &args).await,
            "trend_query" => trend_query(ctx, &args).await,
            "get_performance_analytics" => get_performance_analytics(ctx, &args).await,
            "export_report_data" => export_report_data(ctx, &args).await,
            "get_sys_log" => get_sys_log(ctx, &args).await,
            "list_scheduled_jobs" => list_scheduled_jobs(ctx, &args).await,
            _ => return None,
        };
        Some(result)
    }
}

async fn list_reports(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let query = EncodedQuery::new()
        .and_opt(args.str("search").map(|s| format!("nameLIKE{}", s)))
        .and_opt(args.str("category").map(|c| format!("categoryLIKE{}", c)));

    let descriptor = QueryDescriptor::new(REPORT_TABLE)
        .query_opt(query.build_opt())
        .limit(args.limit_or(20))
        .fields(REPORT_FIELDS);
    ctx.list_as(descriptor, "reports").await
}

async fn get_report(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let identifier = args.required("sys_id_or_name")?;
    ctx.get_by_field_or_sys_id(REPORT_TABLE, "title", identifier, "Report")
        .await
}

async fn run_aggregate_query(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    args.require_all(&["table", "group_by"])?;
    let table = args.required("table")?;
    let group_by = args.required("group_by")?;
    let aggregate = args.str("aggregate").unwrap_or(DEFAULT_AGGREGATE);

    let results = ctx
        .client
        .stats()
        .aggregate(table, group_by, aggregate, args.str("query"))
        .await?;
    Ok(json!({
        "table": table,
        "group_by": group_by,
        "aggregate": aggregate,
        "results": results,
    }))
}

/// One calendar month of a trend.
#[derive(Debug, Clone, PartialEq, Eq)]
struct MonthBucket {
    /// `YYYY-MM`
    period: String,
    first: NaiveDate,
    last: NaiveDate,
}

/// The `periods` months ending with the month of `today`, oldest first.
fn month_buckets(today: NaiveDate, periods: u32) -> Vec<MonthBucket> {
    let Some(current) = today.with_day(1) else {
        return Vec::new();
    };

    (0..periods)
        .rev()
        .filter_map(|back| {
            let first = current.checked_sub_months(Months::new(back))?;
            let last = first.checked_add_months(Months::new(1))?.pred_opt()?;
            Some(MonthBucket {
                period: format!("{:04}-{:02}", first.year(), first.month()),
                first,
                last,
            })
        })
        .collect()
}

/// Requested month count, defaulted and capped. Each month is one stats call.
fn trend_periods(args: &Args) -> u32 {
    args.u32("periods")
        .filter(|p| *p > 0)
        .unwrap_or(DEFAULT_TREND_PERIODS)
        .min(MAX_TREND_PERIODS)
}

async fn trend_query(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    args.require_all(&["table", "date_field", "group_by"])?;
    let table = args.required("table")?;
    let date_field = args.required("date_field")?;
    let group_by = args.required("group_by")?;
    let periods = trend_periods(args);

    let mut results = Vec::new();
    for bucket in month_buckets(Utc::now().date_naive(), periods) {
        let range = format!(
            "{}BETWEEN{} 00:00:00@{} 23:59:59",
            date_field,
            bucket.first.format("%Y-%m-%d"),
            bucket.last.format("%Y-%m-%d")
        );
        let query = EncodedQuery::new().and_opt(args.str("query")).and(range).build();

        // A failed month is reported empty so the rest of the trend survives.
        let data = match ctx
            .client
            .stats()
            .aggregate(table, group_by, DEFAULT_AGGREGATE, Some(&query))
            .await
        {
            Ok(data) => data,
            Err(e) => {
                warn!(table, period = %bucket.period, error = %e, "Trend bucket query failed");
                json!([])
            }
        };
        results.push(json!({ "period": bucket.period, "data": data }));
    }

    Ok(json!({
        "table": table,
        "date_field": date_field,
        "group_by": group_by,
        "periods": results,
    }))
}

async fn get_performance_analytics(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let widget = args.required("widget_sys_id")?;

    let data = match ctx
        .client
        .rest()
        .post(&format!("/api/now/pa/widget/{}", widget), &json!({}))
        .await
    {
        Ok(data) => data,
        Err(e) => {
            warn!(widget, error = %e, "PA widget endpoint failed, falling back to pa_job_log");
            let response = ctx
                .client
                .table()
                .query(
                    QueryDescriptor::new("pa_job_log")
                        .query(format!("sys_id={}", widget))
                        .limit(1),
                )
                .await?;
            match response.records.into_iter().next() {
                Some(record) => to_json(record)?,
                None => json!({}),
            }
        }
    };

    Ok(json!({ "widget_sys_id": widget, "data": data }))
}

async fn export_report_data(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let table = args
        .str("table")
        .ok_or_else(|| NowError::invalid_request("table is required"))?;

    let descriptor = QueryDescriptor::new(table)
        .query_opt(args.str("query"))
        .fields_opt(args.str("fields").map(|f| {
            f.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        }))
        .limit(args.limit_or(DEFAULT_EXPORT_LIMIT).min(MAX_QUERY_LIMIT));

    let response = ctx.client.table().query(descriptor).await?;
    Ok(json!({
        "table": table,
        "count": response.count,
        "records": to_json(&response.records)?,
        "exported_at": now_iso(),
    }))
}

async fn get_sys_log(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let descriptor = QueryDescriptor::new("syslog")
        .query_opt(args.str("query"))
        .limit(args.limit_or(20))
        .order_by("-sys_created_on");
    ctx.list_as(descriptor, "entries").await
}

async fn list_scheduled_jobs(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let active_only = args.bool("active").unwrap_or(true);
    let query = EncodedQuery::new()
        .and_opt(active_only.then_some("active=true"))
        .and_opt(args.str("query"));

    let descriptor = QueryDescriptor::new("sysauto")
        .query_opt(query.build_opt())
        .limit(args.limit_or(20))
        .fields(JOB_FIELDS);
    ctx.list_as(descriptor, "jobs").await
}
