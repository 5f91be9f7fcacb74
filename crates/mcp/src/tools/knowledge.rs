// Knowledge base tools

use crate::tools::args::Args;
use crate::tools::context::{record_label, with_summary, ToolContext};
use crate::tools::registry::{
    json_schema_number, json_schema_object, json_schema_record, json_schema_string, ToolDomain,
    ToolSpec,
};
use nowbridge_core::NowResult;
use nowbridge_sdk::{EncodedQuery, QueryDescriptor};
use serde_json::{json, Map, Value};

const ARTICLE_TABLE: &str = "kb_knowledge";
const BASE_TABLE: &str = "kb_knowledge_base";

const BASE_FIELDS: [&str; 5] = ["sys_id", "title", "description", "owner", "workflow_state"];
const ARTICLE_FIELDS: [&str; 6] = [
    "sys_id",
    "number",
    "short_description",
    "workflow_state",
    "kb_knowledge_base",
    "view_count",
];

pub struct KnowledgeTools;

#[async_trait::async_trait]
impl ToolDomain for KnowledgeTools {
    fn name(&self) -> &'static str {
        "knowledge"
    }

    fn definitions(&self) -> Vec<ToolSpec> {
        vec![
            ToolSpec::read(
                "list_knowledge_bases",
                "List the active knowledge bases",
                json_schema_object(
                    json!({ "limit": json_schema_number("Maximum results (default 20)") }),
                    vec![],
                ),
            ),
            ToolSpec::read(
                "search_knowledge",
                "Search published knowledge articles by keyword",
                json_schema_object(
                    json!({
                        "query": json_schema_string("Keywords or phrase"),
                        "limit": json_schema_number("Maximum articles (default 10)"),
                        "knowledge_base": json_schema_string("Optional knowledge base title or sys_id")
                    }),
                    vec!["query"],
                ),
            ),
            ToolSpec::read(
                "get_knowledge_article",
                "Get the full content of an article by number (KB...) or sys_id",
                json_schema_object(
                    json!({ "number_or_sysid": json_schema_string("Article number or sys_id") }),
                    vec!["number_or_sysid"],
                ),
            ),
            ToolSpec::write(
                "create_knowledge_article",
                "Create a draft knowledge article (requires WRITE_ENABLED=true)",
                json_schema_object(
                    json!({
                        "short_description": json_schema_string("Article title"),
                        "text": json_schema_string("Article body, HTML or plain text"),
                        "knowledge_base_sys_id": json_schema_string("sys_id of the target knowledge base"),
                        "category": json_schema_string("Article category")
                    }),
                    vec!["short_description", "text", "knowledge_base_sys_id"],
                ),
            ),
            ToolSpec::write(
                "update_knowledge_article",
                "Update a knowledge article (requires WRITE_ENABLED=true)",
                json_schema_object(
                    json!({
                        "sys_id": json_schema_string("sys_id of the article"),
                        "fields": json_schema_record("Field values to set, e.g. {\"text\": \"...\"}")
                    }),
                    vec!["sys_id", "fields"],
                ),
            ),
            ToolSpec::write(
                "publish_knowledge_article",
                "Publish a draft knowledge article (requires WRITE_ENABLED=true)",
                json_schema_object(
                    json!({ "sys_id": json_schema_string("sys_id of the article") }),
                    vec!["sys_id"],
                ),
            ),
        ]
    }

    async fn call(&self, ctx: &ToolContext, name: &str, args: Args) -> Option<NowResult<Value>> {
        let result = match name {
            "list_knowledge_bases" => list_knowledge_bases(ctx, &args).await,
            "search_knowledge" => search_knowledge(ctx, &args).await,
            "get_knowledge_article" => get_knowledge_article(ctx, &args).await,
            "create_knowledge_article" => create_knowledge_article(ctx, &args).await,
            "update_knowledge_article" => update_knowledge_article(ctx, &args).await,
            "publish_knowledge_article" => publish_knowledge_article(ctx, &args).await,
            _ => return None,
        };
        Some(result)
    }
}

async fn list_knowledge_bases(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let descriptor = QueryDescriptor::new(BASE_TABLE)
        .query("active=true")
        .limit(args.limit_or(20))
        .fields(BASE_FIELDS);
    ctx.list_as(descriptor, "knowledge_bases").await
}

async fn search_knowledge(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let text = args.required("query")?;

    let mut query = EncodedQuery::new()
        .or([
            format!("short_descriptionLIKE{}", text),
            format!("textLIKE{}", text),
        ])
        .and("workflow_state=published");
    if let Some(kb) = args.str("knowledge_base") {
        query = query.or([
            format!("kb_knowledge_base.title={}", kb),
            format!("kb_knowledge_base={}", kb),
        ]);
    }

    let descriptor = QueryDescriptor::new(ARTICLE_TABLE)
        .query(query.build())
        .limit(args.limit_or(10))
        .fields(ARTICLE_FIELDS);
    ctx.list_as(descriptor, "articles").await
}

async fn get_knowledge_article(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let identifier = args.required("number_or_sysid")?;
    ctx.get_by_number_or_sys_id(ARTICLE_TABLE, identifier, "Article")
        .await
}

async fn create_knowledge_article(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    args.require_all(&["short_description", "text", "knowledge_base_sys_id"])?;

    let mut data = Map::new();
    data.insert("short_description".into(), json!(args.str("short_description")));
    data.insert("text".into(), json!(args.str("text")));
    data.insert("kb_knowledge_base".into(), json!(args.str("knowledge_base_sys_id")));
    if let Some(category) = args.str("category") {
        data.insert("category".into(), json!(category));
    }
    data.insert("workflow_state".into(), json!("draft"));

    let record = ctx
        .client
        .table()
        .create(ARTICLE_TABLE, &Value::Object(data))
        .await?;
    let summary = format!("Created knowledge article {}", record_label(&record));
    with_summary(record, summary)
}

async fn update_knowledge_article(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    args.require_all(&["sys_id", "fields"])?;
    let sys_id = args.required("sys_id")?;
    let fields = args.required_object("fields")?;
    ctx.update_with_summary(
        ARTICLE_TABLE,
        sys_id,
        &fields,
        format!("Updated knowledge article {}", sys_id),
    )
    .await
}

async fn publish_knowledge_article(ctx: &ToolContext, args: &Args) -> NowResult<Value> {
    let sys_id = args.required("sys_id")?;
    ctx.update_with_summary(
        ARTICLE_TABLE,
        sys_id,
        &json!({ "workflow_state": "published" }),
        format!("Published knowledge article {}", sys_id),
    )
    .await
}
