// ServiceNow tools exposed over MCP, grouped by domain

pub mod agile;
pub mod args;
pub mod atf;
pub mod catalog;
pub mod change;
pub mod context;
pub mod core;
pub mod incident;
pub mod knowledge;
pub mod now_assist;
pub mod problem;
pub mod reporting;
pub mod script;
pub mod task;
pub mod user;
mod registry;

use std::sync::Arc;

pub use args::Args;
pub use context::ToolContext;
pub use registry::{
    json_schema_boolean, json_schema_empty, json_schema_number, json_schema_object,
    json_schema_record, json_schema_string, RegistryError, ToolDomain, ToolRegistry, ToolSpec,
};

/// Every built-in domain. A tool name is resolved against the domains in
/// this order.
pub fn builtin_domains() -> Vec<Arc<dyn ToolDomain>> {
    vec![
        Arc::new(core::CoreTools),
        Arc::new(incident::IncidentTools),
        Arc::new(problem::ProblemTools),
        Arc::new(change::ChangeTools),
        Arc::new(task::TaskTools),
        Arc::new(knowledge::KnowledgeTools),
        Arc::new(catalog::CatalogTools),
        Arc::new(user::UserTools),
        Arc::new(reporting::ReportingTools),
        Arc::new(atf::AtfTools),
        Arc::new(now_assist::NowAssistTools),
        Arc::new(script::ScriptTools),
        Arc::new(agile::AgileTools),
    ]
}
