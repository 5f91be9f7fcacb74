//! # nowbridge SDK
//!
//! Async client for the ServiceNow Table, Stats and scripted REST APIs.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nowbridge_sdk::{NowClient, NowResult, QueryDescriptor};
//!
//! #[tokio::main]
//! async fn main() -> NowResult<()> {
//!     let client = NowClient::builder()
//!         .base_url("https://dev12345.service-now.com")
//!         .basic_auth("admin", "password")
//!         .build()?;
//!
//!     let incidents = client
//!         .table()
//!         .query(
//!             QueryDescriptor::new("incident")
//!                 .query("active=true^priority=1")
//!                 .order_by("-sys_updated_on")
//!                 .limit(20),
//!         )
//!         .await?;
//!     println!("Found {} incidents", incidents.count);
//!
//!     Ok(())
//! }
//! ```
//!
//! Every request is retried with exponential backoff on transient failures.
//! Authentication, validation and not-found errors are returned at once.

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod query;
pub mod transport;

// Re-export main client
pub use client::{NowClient, NowClientBuilder};
pub use config::{AuthMethod, BasicCredentials, ClientConfig, OAuthCredentials, RetryConfig};
pub use error::TransportError;
pub use query::{EncodedQuery, QueryDescriptor, DEFAULT_LIMIT, MAX_CMDB_CI_LIMIT, MAX_QUERY_LIMIT};

// Re-export core types for convenience
pub use nowbridge_core::{is_sys_id, ErrorKind, FieldValue, NowError, NowResult, Record};
