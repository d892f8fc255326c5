//! Backend Reply Parsing
//!
//! The backend answers every query with one JSON shape. Whether that reply is
//! plain conversation or a structured directive is decided here, once, by the
//! `instruction` field. Everything downstream matches on [`BackendReply`] and
//! never inspects raw fields again.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::BackendError;

/// Parameter key for the directive's target phone number
pub const PARAM_RECIPIENT: &str = "recipient";
/// Parameter key for the directive's message body
pub const PARAM_CONTENT: &str = "content";
/// Parameter key for the recipient's display name
pub const PARAM_DISPLAY_NAME: &str = "display_name";

/// Reply body as sent by the backend
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Conversational text (fallback text when the engine is unavailable)
    #[serde(default)]
    pub response: Option<String>,
    /// Which backend path produced the reply
    #[serde(default)]
    pub source: Option<String>,
    /// Directive discriminator (e.g. `SEND_SMS`)
    #[serde(default)]
    pub instruction: Option<String>,
    /// Directive recipient
    #[serde(default)]
    pub recipient: Option<String>,
    /// Directive message body
    #[serde(default)]
    pub message_content: Option<String>,
    /// Directive recipient display name
    #[serde(default)]
    pub contact_name: Option<String>,
}

/// Recognized directive kinds
///
/// New kinds are added here; unrecognized wire values never reach the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DirectiveKind {
    /// Send a text message from the device (`SEND_SMS`)
    SendMessage,
    /// A message the backend already scheduled (`SCHEDULE_SMS`)
    ScheduleMessage,
}

impl DirectiveKind {
    /// Map a wire `instruction` value to a kind
    #[must_use]
    pub fn from_wire(instruction: &str) -> Option<Self> {
        match instruction.trim() {
            "SEND_SMS" => Some(Self::SendMessage),
            "SCHEDULE_SMS" => Some(Self::ScheduleMessage),
            _ => None,
        }
    }

    /// The wire value for this kind
    #[must_use]
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::SendMessage => "SEND_SMS",
            Self::ScheduleMessage => "SCHEDULE_SMS",
        }
    }
}

/// A machine-actionable instruction embedded in a reply
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Directive {
    /// What to do
    pub kind: DirectiveKind,
    /// The backend's conversational text accompanying the directive
    pub text: String,
    /// Directive parameters; a key may be present with no value
    pub params: BTreeMap<String, Option<String>>,
    /// Which backend path produced the reply
    pub source: Option<String>,
}

impl Directive {
    /// Create a directive with no parameters
    pub fn new(kind: DirectiveKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            params: BTreeMap::new(),
            source: None,
        }
    }

    /// Set a parameter
    #[must_use]
    pub fn with_param(mut self, key: &str, value: Option<&str>) -> Self {
        self.params
            .insert(key.to_string(), value.map(ToString::to_string));
        self
    }

    /// A parameter value, treating empty or whitespace-only values as absent
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .get(key)
            .and_then(Option::as_deref)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

/// A parsed backend reply
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendReply {
    /// Plain conversational text
    Text {
        /// Reply text
        text: String,
        /// Which backend path produced the reply
        source: Option<String>,
    },
    /// A structured directive
    Directive(Directive),
}

impl BackendReply {
    /// A text reply with no source
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            source: None,
        }
    }

    /// The backend source, if reported
    #[must_use]
    pub fn source(&self) -> Option<&str> {
        match self {
            Self::Text { source, .. } => source.as_deref(),
            Self::Directive(directive) => directive.source.as_deref(),
        }
    }
}

impl QueryResponse {
    /// Decide between text and directive
    ///
    /// Unknown instructions degrade to text using whatever `response` is present.
    pub fn into_reply(self) -> Result<BackendReply, BackendError> {
        let kind = self.instruction.as_deref().and_then(|instruction| {
            let kind = DirectiveKind::from_wire(instruction);
            if kind.is_none() {
                tracing::warn!(
                    instruction = instruction,
                    "Unrecognized directive; treating reply as text"
                );
            }
            kind
        });

        match kind {
            Some(kind) => {
                let directive = Directive {
                    kind,
                    text: self.response.unwrap_or_default(),
                    params: BTreeMap::new(),
                    source: self.source,
                }
                .with_param(PARAM_RECIPIENT, self.recipient.as_deref())
                .with_param(PARAM_CONTENT, self.message_content.as_deref())
                .with_param(PARAM_DISPLAY_NAME, self.contact_name.as_deref());
                Ok(BackendReply::Directive(directive))
            }
            None => match self.response {
                Some(text) => Ok(BackendReply::Text {
                    text,
                    source: self.source,
                }),
                None => Err(BackendError::Protocol(
                    "reply has no `response` field".to_string(),
                )),
            },
        }
    }
}

/// Parse a raw reply body
pub fn parse_reply(body: &str) -> Result<BackendReply, BackendError> {
    let response: QueryResponse = serde_json::from_str(body)
        .map_err(|e| BackendError::Protocol(format!("invalid reply body: {e}")))?;
    response.into_reply()
}
