//! Backend Client Traits
//!
//! Trait definitions for the assistant backend. The Conductor and the
//! availability monitor only ever talk to [`AssistantBackend`], so tests can
//! swap in a scripted backend and other transports can be added later.
//!
//! # Operations
//!
//! - Availability probe: is the language-model engine up? Never fails.
//! - Service probe: is the backend process itself reachable?
//! - Query: text, optional image, optional bearer token. No retries.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::reply::BackendReply;
use crate::availability::AvailabilitySignal;
use crate::conversation::Attachment;
use crate::error::BackendError;

/// A query to the backend
#[derive(Clone, Debug, Default)]
pub struct QueryRequest {
    /// The user's message (never empty; see the Conductor's image prompt)
    pub message: String,
    /// Bearer token from the signed-in session
    pub access_token: Option<String>,
    /// Image to send along with the message
    pub attachment: Option<Attachment>,
}

impl QueryRequest {
    /// Create a text-only request
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    /// Set the access token
    #[must_use]
    pub fn with_access_token(mut self, token: Option<String>) -> Self {
        self.access_token = token;
        self
    }

    /// Set the attachment
    #[must_use]
    pub fn with_attachment(mut self, attachment: Option<Attachment>) -> Self {
        self.attachment = attachment;
        self
    }
}

/// Result of the backend's own health endpoint
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    /// Reported status (`ok` when healthy)
    pub status: String,
    /// Server timestamp, if reported
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl ServiceStatus {
    /// Whether the backend reports itself healthy
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("ok")
    }
}

/// Backend connection settings
#[derive(Clone, Debug)]
pub struct BackendConfig {
    /// Base URL, without trailing slash
    pub base_url: String,
    /// User identifier sent with every query
    pub user_id: String,
    /// Backend-side session identifier
    pub session_id: String,
    /// Upper bound on a single availability probe
    pub probe_timeout: Duration,
    /// Upper bound on a single query
    pub query_timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            user_id: "anon".to_string(),
            session_id: "default".to_string(),
            probe_timeout: Duration::from_secs(5),
            query_timeout: Duration::from_secs(60),
        }
    }
}

impl BackendConfig {
    /// Create a config for a base URL with default timeouts
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }
}

/// Assistant backend trait
#[async_trait]
pub trait AssistantBackend: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &str;

    /// Probe whether the language-model engine is available
    ///
    /// Transport failures report `available = false`; this never errors.
    async fn probe_availability(&self) -> AvailabilitySignal;

    /// Probe the backend service itself
    async fn probe_service(&self) -> Result<ServiceStatus, BackendError>;

    /// Send a query and parse the reply
    async fn send_query(&self, request: &QueryRequest) -> Result<BackendReply, BackendError>;
}
