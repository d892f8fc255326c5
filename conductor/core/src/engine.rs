//! Instruction Execution Engine
//!
//! Turns a [`Directive`] from the backend into at most one device action and
//! exactly one follow-up turn for the conversation.
//!
//! # Design Philosophy
//!
//! The engine never retries and never panics. Every path ends in an
//! [`Execution`] that the Conductor appends as-is:
//!
//! ```text
//! Directive ──► validate fields ──► ensure permission ──► native call (once)
//!                    │                     │                    │
//!                    ▼                     ▼                    ▼
//!             InvalidDirective      PermissionDenied     sent / NativeAction
//! ```
//!
//! Fields are validated before any permission prompt, so a malformed directive
//! can never cause the user to be asked for messaging access.

use crate::backend::reply::{PARAM_CONTENT, PARAM_DISPLAY_NAME, PARAM_RECIPIENT};
use crate::backend::{Directive, DirectiveKind};
use crate::capability::{Capability, CapabilityGateway, NativeBridge};
use crate::conversation::NewTurn;
use crate::error::ClientError;

/// Whether the directive's action happened
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The action completed (or needed no device action)
    Completed,
    /// The action was aborted or failed
    Failed(ClientError),
}

/// Result of executing a directive
#[derive(Clone, Debug, PartialEq)]
pub struct Execution {
    /// Success or failure
    pub outcome: ExecutionOutcome,
    /// Turn to append to the conversation
    pub follow_up: NewTurn,
}

impl Execution {
    fn completed(turn: NewTurn) -> Self {
        Self {
            outcome: ExecutionOutcome::Completed,
            follow_up: turn,
        }
    }

    fn failed(error: ClientError, turn: NewTurn) -> Self {
        Self {
            outcome: ExecutionOutcome::Failed(error),
            follow_up: turn,
        }
    }

    /// Whether the outcome is [`ExecutionOutcome::Completed`]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome == ExecutionOutcome::Completed
    }
}

/// Validated send-message parameters
struct MessageTarget<'a> {
    recipient: &'a str,
    content: &'a str,
    display_name: &'a str,
}

impl<'a> MessageTarget<'a> {
    fn from_directive(directive: &'a Directive) -> Result<Self, ClientError> {
        let recipient = directive.param(PARAM_RECIPIENT);
        let content = directive.param(PARAM_CONTENT);

        match (recipient, content) {
            (Some(recipient), Some(content)) => Ok(Self {
                recipient,
                content,
                display_name: directive.param(PARAM_DISPLAY_NAME).unwrap_or(recipient),
            }),
            (None, Some(_)) => Err(ClientError::InvalidDirective(
                "no recipient was given".to_string(),
            )),
            (Some(_), None) => Err(ClientError::InvalidDirective(
                "no message content was given".to_string(),
            )),
            (None, None) => Err(ClientError::InvalidDirective(
                "no recipient or message content was given".to_string(),
            )),
        }
    }

    /// "John (+1555...)" or just the number when there is no separate name
    fn label(&self) -> String {
        if self.display_name == self.recipient {
            self.recipient.to_string()
        } else {
            format!("{} ({})", self.display_name, self.recipient)
        }
    }
}

/// Executes backend directives against device capabilities
pub struct InstructionEngine<N: NativeBridge> {
    gateway: CapabilityGateway<N>,
}

impl<N: NativeBridge> InstructionEngine<N> {
    /// Create an engine over a capability gateway
    pub fn new(gateway: CapabilityGateway<N>) -> Self {
        Self { gateway }
    }

    /// The gateway used for permission checks and native actions
    pub fn gateway(&self) -> &CapabilityGateway<N> {
        &self.gateway
    }

    /// Execute a directive
    pub async fn execute(&self, directive: &Directive) -> Execution {
        tracing::debug!(kind = directive.kind.wire_name(), "Executing directive");

        let execution = match directive.kind {
            DirectiveKind::SendMessage => self.send_message(directive).await,
            DirectiveKind::ScheduleMessage => Self::confirm_schedule(directive),
        };

        match &execution.outcome {
            ExecutionOutcome::Completed => {
                tracing::info!(kind = directive.kind.wire_name(), "Directive completed");
            }
            ExecutionOutcome::Failed(err) => {
                tracing::warn!(
                    kind = directive.kind.wire_name(),
                    error = %err,
                    "Directive failed"
                );
            }
        }

        execution
    }

    async fn send_message(&self, directive: &Directive) -> Execution {
        let target = match MessageTarget::from_directive(directive) {
            Ok(target) => target,
            Err(err) => return Self::failure(directive, err),
        };

        if let Err(err) = self.gateway.ensure(Capability::Messaging).await {
            return Self::failure(directive, err);
        }

        match self
            .gateway
            .send_message(target.recipient, target.content)
            .await
        {
            Ok(()) => Execution::completed(
                NewTurn::system(format!(
                    "Message sent to {}: \"{}\"",
                    target.label(),
                    target.content
                ))
                .with_source(directive.source.clone()),
            ),
            Err(err) => {
                let text = format!(
                    "Failed to send message to {}. {}",
                    target.label(),
                    err.user_message()
                );
                Execution::failed(
                    err,
                    NewTurn::error(text).with_source(directive.source.clone()),
                )
            }
        }
    }

    /// The backend already scheduled the message; nothing runs on the device
    fn confirm_schedule(directive: &Directive) -> Execution {
        let target = match MessageTarget::from_directive(directive) {
            Ok(target) => target,
            Err(err) => return Self::failure(directive, err),
        };

        let text = if directive.text.trim().is_empty() {
            format!(
                "Message to {} scheduled: \"{}\"",
                target.label(),
                target.content
            )
        } else {
            directive.text.clone()
        };

        Execution::completed(NewTurn::system(text).with_source(directive.source.clone()))
    }

    fn failure(directive: &Directive, err: ClientError) -> Execution {
        let turn = NewTurn::error(err.user_message()).with_source(directive.source.clone());
        Execution::failed(err, turn)
    }
}
