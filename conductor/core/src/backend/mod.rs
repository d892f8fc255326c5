//! Assistant Backend Client
//!
//! Stateless request building and transport for the assistant backend.
//!
//! # Usage
//!
//! ```ignore
//! use klai_core::backend::{AssistantBackend, BackendConfig, HttpBackend, QueryRequest};
//!
//! let backend = HttpBackend::new(BackendConfig::new("http://localhost:8080"))?;
//! let signal = backend.probe_availability().await;
//! let reply = backend.send_query(&QueryRequest::new("Hello")).await?;
//! ```

mod http;
pub mod reply;
mod traits;

pub use http::HttpBackend;
pub use reply::{parse_reply, BackendReply, Directive, DirectiveKind, QueryResponse};
pub use traits::{AssistantBackend, BackendConfig, QueryRequest, ServiceStatus};
