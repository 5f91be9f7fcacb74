// Tool registry: name lookup, package filtering and capability-gated dispatch

use crate::packages;
use crate::protocol::ToolSchema;
use crate::tools::args::Args;
use crate::tools::context::ToolContext;
use nowbridge_core::{NowError, NowResult, ToolTier};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// A tool definition together with the capability it needs.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub schema: ToolSchema,
    pub tier: ToolTier,
}

impl ToolSpec {
    pub fn new(name: &str, description: &str, input_schema: Value, tier: ToolTier) -> Self {
        Self {
            schema: ToolSchema {
                name: name.to_string(),
                description: description.to_string(),
                input_schema,
            },
            tier,
        }
    }

    /// A read-only tool.
    pub fn read(name: &str, description: &str, input_schema: Value) -> Self {
        Self::new(name, description, input_schema, ToolTier::Read)
    }

    /// A tool that mutates records.
    pub fn write(name: &str, description: &str, input_schema: Value) -> Self {
        Self::new(name, description, input_schema, ToolTier::Write)
    }
}

/// A group of related tools.
#[async_trait::async_trait]
pub trait ToolDomain: Send + Sync {
    /// Domain name used in logs.
    fn name(&self) -> &'static str;

    /// Definitions of every tool in the domain.
    fn definitions(&self) -> Vec<ToolSpec>;

    /// Run a tool. Returns `None` when the name does not belong to this
    /// domain.
    async fn call(&self, ctx: &ToolContext, name: &str, args: Args) -> Option<NowResult<Value>>;
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("tool '{name}' is defined by both '{first}' and '{second}'")]
    DuplicateTool {
        name: String,
        first: &'static str,
        second: &'static str,
    },
}

struct Entry {
    domain: usize,
    tier: ToolTier,
}

/// Registry for every tool the server exposes.
pub struct ToolRegistry {
    ctx: ToolContext,
    domains: Vec<Arc<dyn ToolDomain>>,
    specs: Vec<ToolSpec>,
    index: HashMap<String, Entry>,
}

impl ToolRegistry {
    /// Register every domain's definitions, in order. Tool names must be
    /// unique across domains.
    pub fn new(ctx: ToolContext, domains: Vec<Arc<dyn ToolDomain>>) -> Result<Self, RegistryError> {
        let mut specs = Vec::new();
        let mut index: HashMap<String, Entry> = HashMap::new();

        for (position, domain) in domains.iter().enumerate() {
            for spec in domain.definitions() {
                if let Some(existing) = index.get(&spec.schema.name) {
                    return Err(RegistryError::DuplicateTool {
                        name: spec.schema.name.clone(),
                        first: domains[existing.domain].name(),
                        second: domain.name(),
                    });
                }
                index.insert(
                    spec.schema.name.clone(),
                    Entry {
                        domain: position,
                        tier: spec.tier,
                    },
                );
                specs.push(spec);
            }
        }

        Ok(Self {
            ctx,
            domains,
            specs,
            index,
        })
    }

    /// The default registry with every built-in domain.
    pub fn with_builtin_domains(ctx: ToolContext) -> Result<Self, RegistryError> {
        Self::new(ctx, crate::tools::builtin_domains())
    }

    pub fn context(&self) -> &ToolContext {
        &self.ctx
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn tier(&self, name: &str) -> Option<ToolTier> {
        self.index.get(name).map(|e| e.tier)
    }

    /// Every tool spec, in registration order.
    pub fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    /// Tool definitions visible under a package.
    ///
    /// `None` and `full` list everything. An unknown package also lists
    /// everything, with a warning.
    pub fn list_tools(&self, package: Option<&str>) -> Vec<ToolSchema> {
        let package = package.map(|p| p.trim().to_ascii_lowercase());
        let allowed = match package.as_deref() {
            None | Some("") | Some(packages::FULL) => None,
            Some(name) => match packages::tools_for(name) {
                Some(tools) => Some(tools),
                None => {
                    warn!(package = name, "Unknown tool package, exposing all tools");
                    None
                }
            },
        };

        self.specs
            .iter()
            .filter(|spec| allowed.map_or(true, |tools| tools.contains(&spec.schema.name.as_str())))
            .map(|spec| spec.schema.clone())
            .collect()
    }

    /// Run a tool by name.
    pub async fn call_tool(&self, name: &str, args: Value) -> NowResult<Value> {
        let entry = self
            .index
            .get(name)
            .ok_or_else(|| NowError::unknown_tool(name))?;

        self.ctx.capabilities.require(entry.tier)?;
        let args = Args::new(args)?;

        let domain = &self.domains[entry.domain];
        debug!(tool = name, domain = domain.name(), "Dispatching tool call");

        domain
            .call(&self.ctx, name, args)
            .await
            .unwrap_or_else(|| Err(NowError::unknown_tool(name)))
    }
}

// Helper functions for creating tool schemas

pub fn json_schema_object(properties: Value, required: Vec<&str>) -> Value {
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required
    })
}

pub fn json_schema_string(description: &str) -> Value {
    serde_json::json!({
        "type": "string",
        "description": description
    })
}

pub fn json_schema_number(description: &str) -> Value {
    serde_json::json!({
        "type": "number",
        "description": description
    })
}

pub fn json_schema_boolean(description: &str) -> Value {
    serde_json::json!({
        "type": "boolean",
        "description": description
    })
}

pub fn json_schema_record(description: &str) -> Value {
    serde_json::json!({
        "type": "object",
        "description": description
    })
}

/// Schema for a tool without arguments.
pub fn json_schema_empty() -> Value {
    json_schema_object(serde_json::json!({}), vec![])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::context::tests::test_context;
    use nowbridge_core::{Capabilities, ErrorKind};
    use serde_json::json;

    struct EchoDomain {
        name: &'static str,
        tools: Vec<(&'static str, ToolTier)>,
    }

    #[async_trait::async_trait]
    impl ToolDomain for EchoDomain {
        fn name(&self) -> &'static str {
            self.name
        }

        fn definitions(&self) -> Vec<ToolSpec> {
            self.tools
                .iter()
                .map(|(name, tier)| ToolSpec::new(name, "echo", json_schema_empty(), *tier))
                .collect()
        }

        async fn call(&self, _ctx: &ToolContext, name: &str, args: Args) -> Option<NowResult<Value>> {
            if !self.tools.iter().any(|(n, _)| *n == name) {
                return None;
            }
            Some(Ok(json!({"tool": name, "args": args.to_value()})))
        }
    }

    fn echo(name: &'static str, tools: Vec<(&'static str, ToolTier)>) -> Arc<dyn ToolDomain> {
        Arc::new(EchoDomain { name, tools })
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let result = ToolRegistry::new(
            test_context("http://127.0.0.1:9", Capabilities::default()),
            vec![
                echo("first", vec![("query_records", ToolTier::Read)]),
                echo("second", vec![("query_records", ToolTier::Read)]),
            ],
        );

        match result {
            Err(RegistryError::DuplicateTool { name, first, second }) => {
                assert_eq!(name, "query_records");
                assert_eq!(first, "first");
                assert_eq!(second, "second");
            }
            Ok(_) => panic!("expected duplicate tool error"),
        }
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let registry = ToolRegistry::new(
            test_context("http://127.0.0.1:9", Capabilities::all()),
            vec![echo("echo", vec![("ping", ToolTier::Read)])],
        )
        .unwrap();

        let err = registry.call_tool("frobnicate", json!({})).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownTool);
        assert_eq!(err.message(), "Unknown tool: frobnicate");
    }

    #[tokio::test]
    async fn test_tier_is_checked_before_dispatch() {
        let registry = ToolRegistry::new(
            test_context("http://127.0.0.1:9", Capabilities::default()),
            vec![echo(
                "echo",
                vec![("read_it", ToolTier::Read), ("write_it", ToolTier::Write)],
            )],
        )
        .unwrap();

        let ok = registry.call_tool("read_it", json!({"a": 1})).await.unwrap();
        assert_eq!(ok["args"]["a"], 1);

        let err = registry.call_tool("write_it", json!({})).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WriteNotEnabled);
    }

    #[test]
    fn test_registration_order_is_kept() {
        let registry = ToolRegistry::new(
            test_context("http://127.0.0.1:9", Capabilities::default()),
            vec![
                echo("a", vec![("zeta", ToolTier::Read), ("alpha", ToolTier::Read)]),
                echo("b", vec![("mid", ToolTier::Write)]),
            ],
        )
        .unwrap();

        let names: Vec<_> = registry.list_tools(None).into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
        assert_eq!(registry.tier("mid"), Some(ToolTier::Write));
    }
}
