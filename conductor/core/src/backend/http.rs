//! HTTP Backend Implementation
//!
//! Talks to the assistant backend's REST surface.
//!
//! # Endpoints
//!
//! - `GET /ollama/status` - `{ "ollama_available": bool }`
//! - `GET /health` - `{ "status": "ok", "timestamp": "..." }`
//! - `POST /chat` - JSON query, text only
//! - `POST /unified_query` - multipart query carrying an image
//!
//! Both query endpoints return the same reply shape (see [`super::reply`]).

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use super::reply::{parse_reply, BackendReply};
use super::traits::{AssistantBackend, BackendConfig, QueryRequest, ServiceStatus};
use crate::availability::AvailabilitySignal;
use crate::error::BackendError;

/// Longest error body kept in a [`BackendError::Status`]
const MAX_ERROR_BODY: usize = 512;

#[derive(Deserialize)]
struct EngineStatus {
    #[serde(default)]
    ollama_available: bool,
}

/// HTTP backend client
#[derive(Clone)]
pub struct HttpBackend {
    config: BackendConfig,
    http_client: reqwest::Client,
}

impl HttpBackend {
    /// Create a new HTTP backend
    pub fn new(config: BackendConfig) -> Result<Self, BackendError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(config.probe_timeout)
            .timeout(config.query_timeout)
            .build()
            .map_err(|e| BackendError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// The configuration in use
    #[must_use]
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn json_body(&self, request: &QueryRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "message": request.message,
            "user_id": self.config.user_id,
            "session_id": self.config.session_id,
        });
        if let Some(ref token) = request.access_token {
            body["access_token"] = serde_json::json!(token);
        }
        body
    }

    fn multipart_body(&self, request: &QueryRequest) -> Form {
        let mut form = Form::new()
            .text("message", request.message.clone())
            .text("user_id", self.config.user_id.clone())
            .text("session_id", self.config.session_id.clone());

        if let Some(ref token) = request.access_token {
            form = form.text("access_token", token.clone());
        }

        if let Some(ref attachment) = request.attachment {
            let part = Part::bytes(attachment.bytes.clone()).file_name(attachment.name.clone());
            let part = match part.mime_str(&attachment.mime_type) {
                Ok(part) => part,
                Err(e) => {
                    tracing::warn!(
                        mime_type = %attachment.mime_type,
                        error = %e,
                        "Invalid attachment MIME type; sending without one"
                    );
                    Part::bytes(attachment.bytes.clone()).file_name(attachment.name.clone())
                }
            };
            form = form.part("image", part);
        }

        form
    }

    async fn read_reply(response: reqwest::Response) -> Result<BackendReply, BackendError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let mut body = body;
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        parse_reply(&body)
    }
}

#[async_trait]
impl AssistantBackend for HttpBackend {
    fn name(&self) -> &str {
        "HTTP"
    }

    async fn probe_availability(&self) -> AvailabilitySignal {
        let result = self
            .http_client
            .get(self.url("/ollama/status"))
            .timeout(self.config.probe_timeout)
            .send()
            .await;

        let available = match result {
            Ok(response) if response.status().is_success() => {
                match response.json::<EngineStatus>().await {
                    Ok(status) => status.ollama_available,
                    Err(e) => {
                        tracing::debug!(error = %e, "Unreadable availability probe body");
                        false
                    }
                }
            }
            Ok(response) => {
                tracing::debug!(status = %response.status(), "Availability probe rejected");
                false
            }
            Err(e) => {
                tracing::debug!(error = %e, "Availability probe failed");
                false
            }
        };

        AvailabilitySignal::now(available)
    }

    async fn probe_service(&self) -> Result<ServiceStatus, BackendError> {
        let response = self
            .http_client
            .get(self.url("/health"))
            .timeout(self.config.probe_timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status { status, body });
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| BackendError::Protocol(format!("invalid health body: {e}")))
    }

    async fn send_query(&self, request: &QueryRequest) -> Result<BackendReply, BackendError> {
        let builder = if request.attachment.is_some() {
            self.http_client
                .post(self.url("/unified_query"))
                .multipart(self.multipart_body(request))
        } else {
            self.http_client
                .post(self.url("/chat"))
                .json(&self.json_body(request))
        };

        tracing::debug!(
            has_image = request.attachment.is_some(),
            authorized = request.access_token.is_some(),
            "Sending query"
        );

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::timeout(self.config.query_timeout)
            } else {
                BackendError::from(e)
            }
        })?;

        Self::read_reply(response).await
    }
}
