// Core types shared by the nowbridge client and MCP server

pub mod error;
pub mod permissions;
pub mod record;

pub use error::{ErrorKind, NowError, NowResult};
pub use permissions::{Capabilities, ToolTier};
pub use record::{is_sys_id, FieldValue, Record};
