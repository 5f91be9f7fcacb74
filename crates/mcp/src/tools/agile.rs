// Agile tools: stories, epics and scrum tasks
//
// Table names come from the context's agile prefix (`rm_` by default).

use crate::tools::args::Args;
use crate::tools::context::{record_label, to_json, with_summary, ToolContext};
use crate::tools::registry::{
    json_schema_number, json_schema_object, json_schema_record, json_schema_string, ToolDomain,
    ToolSpec,
};
use nowbridge_core::NowResult;
use nowbridge_sdk::{EncodedQuery, QueryDescriptor};
use serde_json::{json, Map, Value};

const STORY: &str = "story";
const EPIC: &str = "epic";
const SCRUM_TASK: &str = "scrum_task";

const STORY_FIELDS: [&str; 8] = [
    "sys_id",
    "number",
    "short_description",
    "state",
    "story_points",
    "sprint",
    "epic",
    "assigned_to",
];

pub struct AgileTools;

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
impl ToolDomain for AgileTools {
    fn name(&self) -> &'static str {
        "agile"
    }

    fn definitions(&self) -> Vec<ToolSpec> {
        vec![
            ToolSpec::write(
                "create_story",
                "Create an agile story (requires WRITE_ENABLED=true)",
                json_schema_object(
                    json!({
                        "short_description": json_schema_string("Story title"),
                        "story_points": json_schema_number("Story point estimate"),
                        "sprint": json_schema_string("Sprint sys_id or name"),
                        "epic": json_schema_string("Epic sys_id"),
                        "description": json_schema_string("Description and acceptance criteria"),
                        "assigned_to": json_schema_string("User sys_id or user name")
                    }),
                    vec!["short_description"],
                ),
            ),
            ToolSpec::write(
                "update_story",
                "Update an agile story (requires WRITE_ENABLED=true)",
                update_schema("story"),
            ),
            ToolSpec::read(
                "list_stories",
                "List agile stories, optionally by sprint or state",
                json_schema_object(
                    json!({
                        "sprint": json_schema_string("Sprint sys_id"),
                        "state": json_schema_string("\"1\"=Open, \"2\"=Work in Progress, \"3\"=Complete"),
                        "limit": json_schema_number("Maximum results (default 20)")
                    }),
                    vec![],
                ),
            ),
            ToolSpec::write(
                "create_epic",
                "Create an epic (requires WRITE_ENABLED=true)",
                json_schema_object(
                    json!({
                        "short_description": json_schema_string("Epic title"),
                        "description": json_schema_string("Description and goals"),
                        "project": json_schema_string("Project sys_id")
                    }),
                    vec!["short_description"],
                ),
            ),
            ToolSpec::write(
                "update_epic",
                "Update an epic (requires WRITE_ENABLED=true)",
                update_schema("epic"),
            ),
            ToolSpec::read(
                "list_epics",
                "List epics, optionally by project or state",
                json_schema_object(
                    json!({
                        "project": json_schema_string("Project sys_id"),
                        "state": json_schema_string("Epic state"),
                        "limit": json_schema_number("Maximum results (default 20)")
                    }),
                    vec![],
                ),
            ),
            ToolSpec::write(
                "create_scrum_task",
                "Create a scrum task under a story (requires WRITE_ENABLED=true)",
                json_schema_object(
                    json!({
                        "short_description": json_schema_string("Task title"),
                        "story_sys_id": json_schema_string("Parent story sys_id"),
                        "assigned_to": json_schema_string("Assignee user name or sys_id")
                    }),
                    vec!["short_description"],
                ),
            ),
            ToolSpec::write(
                "update_scrum_task",
                "Update a scrum task (requires WRITE_ENABLED=true)",
                update_schema("scrum task"),
            ),
            ToolSpec::read(
                "list_scrum_tasks",
                "List scrum tasks, optionally by story or assignee",
                json_schema_object(
                    json!({
                        "story_sys_id": json_schema_string("Parent story sys_id"),
                        "assigned_to": json_schema_string("Assignee user name"),
                        "limit": json_schema_number("Maximum results (default 20)")
                    }),
                    vec![],
                ),
            ),
        ]
    }

    async fn call(&self, ctx: &ToolContext, name: &str, args: Args) -> Option<NowResult<Value>> {
        let result = match name {
            "create_story" => create(ctx, &args.to_value(), &args, STORY, "story").await,
            "update_story" => update(ctx, &args, STORY).await,
            "list_stories" => list_stories(ctx, &args).await,
            "create_epic" => create(ctx, &args.to_value(), &args, EPIC, "epic").await,
            "update_epic" => update(ctx, &args, EPIC).await,
            "list_epics" => list_epics(ctx, &args).await,
            "create_scrum_task" => create_scrum_task(ctx, &args).await,
            "update_scrum_task" => update(ctx, &args, SCRUM_TASK).await,
            "list_scrum_tasks" => list_scrum_tasks(ctx, &args).await,
            _ => return None,
        };
        Some(result)
    }
}

async fn create(
    ctx: &ToolContext,
    data: &Value,
    args: &Args,
    kind: &str,
    label: &str,
) -> NowResult<Value> {
    args.required("short_description")?;
    let record = ctx.client.table().create(&ctx.agile_table(kind), data).await?;
    let summary = format!("Created {} {}", label, record_label(&record));
    with_summary(record, summary)
}

async fn update(ctx: &ToolContext, args: &Args, kind: &str) -> NowResult<Value> {
    args.require_all(&["sys_id", "fields"])?;
    let sys_id = args.required("sys_id")?;
    let fields = args.required_object("fields")?;
    to_json(
        ctx.client
            .table()
            .update(&ctx.agile_table(kind), sys_id, &fields)
            .await?,
    )
}

async fn list_stories(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let query = EncodedQuery::new()
        .and_opt(args.str("sprint").map(|s| format!("sprint={}", s)))
        .and_opt(args.str("state").map(|s| format!("state={}", s)));

    let descriptor = QueryDescriptor::new(ctx.agile_table(STORY))
        .query_opt(query.build_opt())
        .limit(args.limit_or(20))
        .fields(STORY_FIELDS);
    ctx.list_as(descriptor, "stories").await
}

async fn list_epics(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let query = EncodedQuery::new()
        .and_opt(args.str("project").map(|p| format!("project={}", p)))
        .and_opt(args.str("state").map(|s| format!("state={}", s)));

    let descriptor = QueryDescriptor::new(ctx.agile_table(EPIC))
        .query_opt(query.build_opt())
        .limit(args.limit_or(20));
    ctx.list_as(descriptor, "epics").await
}

async fn create_scrum_task(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let mut data = Map::new();
    data.insert("short_description".to_string(), json!(args.str("short_description")));
    if let Some(story) = args.str("story_sys_id") {
        data.insert("story".to_string(), json!(story));
    }
    if let Some(assignee) = args.str("assigned_to") {
        data.insert("assigned_to".to_string(), json!(assignee));
    }
    create(ctx, &Value::Object(data), args, SCRUM_TASK, "scrum task").await
}

async fn list_scrum_tasks(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let query = EncodedQuery::new()
        .and_opt(args.str("story_sys_id").map(|s| format!("story={}", s)))
        .and_opt(
            args.str("assigned_to")
                .map(|u| format!("assigned_to.user_name={}", u)),
        );

    let descriptor = QueryDescriptor::new(ctx.agile_table(SCRUM_TASK))
        .query_opt(query.build_opt())
        .limit(args.limit_or(20));
    ctx.list_as(descriptor, "scrum_tasks").await
}
