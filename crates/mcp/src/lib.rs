// MCP server exposing ServiceNow tools to agent clients over stdio

pub mod config;
pub mod packages;
pub mod protocol;
pub mod server;
pub mod tools;

pub use config::McpConfig;
pub use server::McpServer;
pub use tools::{ToolContext, ToolRegistry};
