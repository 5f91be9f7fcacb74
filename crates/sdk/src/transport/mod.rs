//! Transport layer for the nowbridge SDK.

pub mod http;

pub use http::HttpTransport;
