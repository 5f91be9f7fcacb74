//! Role-based tool packages.
//!
//! A package is an allow-list of tool names. Selecting one (via
//! `MCP_TOOL_PACKAGE` or `--package`) narrows what `tools/list` reports.
//! It does not bypass capability tiers: a write tool in a package still
//! needs `WRITE_ENABLED=true`.

/// The package that exposes every tool.
pub const FULL: &str = "full";

const SERVICE_DESK: &[&str] = &[
    "query_records",
    "get_record",
    "get_user",
    "get_group",
    "create_incident",
    "get_incident",
    "update_incident",
    "resolve_incident",
    "close_incident",
    "add_work_note",
    "add_comment",
    "get_my_approvals",
    "approve_request",
    "reject_request",
    "search_knowledge",
    "get_knowledge_article",
    "list_knowledge_bases",
    "get_sla_details",
    "list_active_slas",
    "get_task",
    "list_my_tasks",
    "complete_task",
    "natural_language_search",
];

const CHANGE_COORDINATOR: &[&str] = &[
    "query_records",
    "get_record",
    "get_user",
    "get_group",
    "create_change_request",
    "get_change_request",
    "update_change_request",
    "list_change_requests",
    "submit_change_for_approval",
    "close_change_request",
    "get_my_approvals",
    "approve_request",
    "reject_request",
    "get_problem",
    "search_cmdb_ci",
    "get_cmdb_ci",
    "list_relationships",
];

const KNOWLEDGE_AUTHOR: &[&str] = &[
    "query_records",
    "get_record",
    "get_user",
    "list_knowledge_bases",
    "search_knowledge",
    "get_knowledge_article",
    "create_knowledge_article",
    "update_knowledge_article",
    "publish_knowledge_article",
    "list_catalog_items",
    "search_catalog",
    "get_catalog_item",
];

const CATALOG_BUILDER: &[&str] = &[
    "query_records",
    "get_record",
    "get_user",
    "list_catalog_items",
    "search_catalog",
    "get_catalog_item",
    "order_catalog_item",
    "list_users",
    "list_groups",
];

const SYSTEM_ADMINISTRATOR: &[&str] = &[
    "query_records",
    "get_record",
    "get_user",
    "get_group",
    "get_table_schema",
    "list_users",
    "create_user",
    "update_user",
    "list_groups",
    "create_group",
    "update_group",
    "add_user_to_group",
    "remove_user_from_group",
    "list_reports",
    "get_report",
    "run_aggregate_query",
    "trend_query",
    "export_report_data",
    "get_sys_log",
    "list_scheduled_jobs",
];

const PLATFORM_DEVELOPER: &[&str] = &[
    "query_records",
    "get_record",
    "get_table_schema",
    "list_business_rules",
    "get_business_rule",
    "create_business_rule",
    "update_business_rule",
    "list_script_includes",
    "get_script_include",
    "create_script_include",
    "update_script_include",
    "list_client_scripts",
    "get_client_script",
    "list_changesets",
    "get_changeset",
    "commit_changeset",
    "publish_changeset",
    "list_atf_suites",
    "get_atf_suite",
    "run_atf_suite",
    "list_atf_tests",
    "get_atf_test",
    "run_atf_test",
    "get_atf_suite_result",
    "list_atf_test_results",
    "get_atf_failure_insight",
];

const ITOM_ENGINEER: &[&str] = &[
    "query_records",
    "get_record",
    "get_table_schema",
    "search_cmdb_ci",
    "get_cmdb_ci",
    "list_relationships",
    "cmdb_health_dashboard",
    "service_mapping_summary",
    "list_discovery_schedules",
    "list_mid_servers",
    "list_active_events",
    "run_aggregate_query",
    "trend_query",
];

const AGILE_MANAGER: &[&str] = &[
    "query_records",
    "get_record",
    "get_user",
    "create_story",
    "update_story",
    "list_stories",
    "create_epic",
    "update_epic",
    "list_epics",
    "create_scrum_task",
    "update_scrum_task",
    "list_scrum_tasks",
    "list_users",
];

const AI_DEVELOPER: &[&str] = &[
    "query_records",
    "get_record",
    "natural_language_search",
    "nlq_query",
    "ai_search",
    "generate_summary",
    "suggest_resolution",
    "categorize_incident",
    "get_virtual_agent_topics",
    "trigger_agentic_playbook",
    "get_ms_copilot_topics",
    "generate_work_notes",
    "get_pi_models",
    "search_knowledge",
    "get_knowledge_article",
];

/// Every named package and its allow-list.
pub const PACKAGES: &[(&str, &[&str])] = &[
    ("service_desk", SERVICE_DESK),
    ("change_coordinator", CHANGE_COORDINATOR),
    ("knowledge_author", KNOWLEDGE_AUTHOR),
    ("catalog_builder", CATALOG_BUILDER),
    ("system_administrator", SYSTEM_ADMINISTRATOR),
    ("platform_developer", PLATFORM_DEVELOPER),
    ("itom_engineer", ITOM_ENGINEER),
    ("agile_manager", AGILE_MANAGER),
    ("ai_developer", AI_DEVELOPER),
];

/// Allow-list of a named package. `full` and unknown names return `None`.
pub fn tools_for(package: &str) -> Option<&'static [&'static str]> {
    PACKAGES
        .iter()
        .find(|(name, _)| *name == package)
        .map(|(_, tools)| *tools)
}
