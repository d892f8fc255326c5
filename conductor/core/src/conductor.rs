//! Conductor - The Conversation Orchestrator
//!
//! The Conductor owns the turn log and sequences every send:
//!
//! ```text
//! submit ─► user turn ─► InputCleared ─► busy ─► spawn query
//!                                                    │
//!            poll_completion / wait_completion ◄─────┘
//!                       │
//!                       ▼
//!     text ─► assistant turn          directive ─► InstructionEngine ─► system turn
//!                       │
//!                       ▼
//!           release: busy = false, pending attachment cleared
//! ```
//!
//! # Design Philosophy
//!
//! The Conductor is UI-agnostic. It communicates through:
//! - `ConductorMessage`: Commands sent TO the UI surface
//! - `SurfaceEvent`: Events received FROM the UI surface
//!
//! All state lives in this one struct and is only touched from `&mut self`.
//! The query runs as a spawned task whose result comes back through a
//! channel, so the UI loop never blocks on the network. At most one query is
//! in flight; a submit while busy is a no-op.
//!
//! Every attempt ends through the same release path, whether the backend
//! answered, failed, timed out, or the task was lost. Busy is always cleared
//! and the pending attachment is always dropped.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use crate::availability::{Availability, AvailabilitySignal};
use crate::backend::{AssistantBackend, BackendReply, QueryRequest};
use crate::capability::{Capability, CapabilityGateway, NativeBridge};
use crate::conversation::{Attachment, ConversationTurn, NewTurn, TurnLog};
use crate::engine::InstructionEngine;
use crate::error::{BackendError, ClientError};
use crate::events::SurfaceEvent;
use crate::messages::{ConductorMessage, NotifyLevel};
use crate::session::{IdentityProvider, Session, SessionManager};

/// Prompt sent when the user submits an image with no text
pub const DEFAULT_IMAGE_PROMPT: &str = "Please analyze this image.";

/// Reply `source` the backend uses when a request needs a signed-in user
const SOURCE_AUTH_REQUIRED: &str = "auth_required";

/// Conductor configuration
#[derive(Clone, Debug)]
pub struct ConductorConfig {
    /// Prompt sent in place of empty text when an image is attached
    pub image_prompt: String,
    /// Longest accepted input, in characters
    pub max_message_chars: usize,
    /// Upper bound on a single query
    pub query_timeout: Duration,
}

impl Default for ConductorConfig {
    fn default() -> Self {
        Self {
            image_prompt: DEFAULT_IMAGE_PROMPT.to_string(),
            max_message_chars: 4000,
            query_timeout: Duration::from_secs(60),
        }
    }
}

/// Result of a spawned query
type Completion = Result<BackendReply, BackendError>;

/// The query currently in flight
struct InFlight {
    rx: oneshot::Receiver<Completion>,
    /// Result already taken off `rx` but not yet applied (`Some(None)`: task lost)
    arrived: Option<Option<Completion>>,
}

/// The Conductor - headless conversation orchestrator
pub struct Conductor<B, N, P>
where
    B: AssistantBackend + ?Sized,
    N: NativeBridge,
    P: IdentityProvider + ?Sized,
{
    /// Configuration
    config: ConductorConfig,
    /// Assistant backend
    backend: Arc<B>,
    /// Directive executor
    engine: InstructionEngine<N>,
    /// Sign-in state
    session: SessionManager<P>,
    /// Ordered conversation
    log: TurnLog,
    /// Image selected but not yet sent
    pending_attachment: Option<Attachment>,
    /// Current query; `Some` means busy
    in_flight: Option<InFlight>,
    /// Last availability probe result
    availability: Option<AvailabilitySignal>,
    /// Channel to send messages to UI surface
    tx: mpsc::Sender<ConductorMessage>,
    /// Set once the surface asked to quit
    quit_requested: bool,
}

impl<B, N, P> Conductor<B, N, P>
where
    B: AssistantBackend + ?Sized + 'static,
    N: NativeBridge,
    P: IdentityProvider + ?Sized,
{
    /// Create a new Conductor
    pub fn new(
        backend: Arc<B>,
        bridge: Arc<N>,
        identity: Arc<P>,
        config: ConductorConfig,
        tx: mpsc::Sender<ConductorMessage>,
    ) -> Self {
        Self {
            config,
            backend,
            engine: InstructionEngine::new(CapabilityGateway::new(bridge)),
            session: SessionManager::new(identity),
            log: TurnLog::new(),
            pending_attachment: None,
            in_flight: None,
            availability: None,
            tx,
            quit_requested: false,
        }
    }

    /// Restore a previous session and announce the initial state
    pub async fn start(&mut self) {
        self.session.restore().await;
        self.send_session().await;
        self.send(ConductorMessage::BusyChanged { busy: false }).await;
    }

    /// All turns in order
    pub fn turns(&self) -> &[ConversationTurn] {
        self.log.turns()
    }

    /// Whether a send is in flight
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// The image that will go with the next send
    pub fn pending_attachment(&self) -> Option<&Attachment> {
        self.pending_attachment.as_ref()
    }

    /// Current sign-in state
    pub fn session(&self) -> &Session {
        self.session.session()
    }

    /// Latest availability
    pub fn availability(&self) -> Availability {
        Availability::from_signal(self.availability.as_ref())
    }

    /// Whether the surface asked to quit
    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    /// Configuration in use
    pub fn config(&self) -> &ConductorConfig {
        &self.config
    }

    /// Handle an event from the UI surface
    pub async fn handle_event(&mut self, event: SurfaceEvent) {
        tracing::trace!(event = event.name(), "Surface event");

        match event {
            SurfaceEvent::Submit { text } => {
                self.submit(text, None).await;
            }

            SurfaceEvent::AttachImage { path } => {
                self.attach_image(&path).await;
            }

            SurfaceEvent::ClearAttachment => {
                if self.is_busy() {
                    self.notify(NotifyLevel::Warning, "Wait for the current reply first")
                        .await;
                } else if self.pending_attachment.take().is_some() {
                    self.send(ConductorMessage::AttachmentChanged { name: None })
                        .await;
                }
            }

            SurfaceEvent::SignIn => {
                self.sign_in().await;
            }

            SurfaceEvent::SignOut => {
                self.session.sign_out().await;
                self.send_session().await;
                self.notify(NotifyLevel::Info, "Signed out").await;
            }

            SurfaceEvent::Quit => {
                self.quit_requested = true;
                self.send(ConductorMessage::Quit {
                    message: Some("Goodbye!".to_string()),
                })
                .await;
            }
        }
    }

    /// Submit text (and optionally a newly picked image) to the backend
    ///
    /// Returns `false` if the submit was ignored: a send is already in flight,
    /// there is nothing to send, or the text is too long. Completion is
    /// observed via [`Self::poll_completion`] or [`Self::wait_completion`].
    pub async fn submit(&mut self, text: impl Into<String>, attachment: Option<Attachment>) -> bool {
        if self.is_busy() {
            tracing::debug!("Submit ignored: a send is already in flight");
            return false;
        }

        let text = text.into().trim().to_string();
        if text.is_empty() && attachment.is_none() && self.pending_attachment.is_none() {
            return false;
        }

        let chars = text.chars().count();
        if chars > self.config.max_message_chars {
            tracing::warn!(
                chars = chars,
                limit = self.config.max_message_chars,
                "Rejected oversized message"
            );
            self.notify(
                NotifyLevel::Warning,
                &format!(
                    "Message is too long ({chars} characters, limit {})",
                    self.config.max_message_chars
                ),
            )
            .await;
            return false;
        }

        if let Some(attachment) = attachment {
            self.set_attachment(attachment).await;
        }

        if !text.is_empty() {
            let image = self.pending_attachment.as_ref().map(Attachment::image_ref);
            self.append(NewTurn::user(text.clone()).with_attachment(image))
                .await;
        }
        self.send(ConductorMessage::InputCleared).await;

        let message = if text.is_empty() {
            self.config.image_prompt.clone()
        } else {
            text
        };
        let request = QueryRequest::new(message)
            .with_access_token(self.session.access_token().map(ToString::to_string))
            .with_attachment(self.pending_attachment.clone());

        let (done_tx, done_rx) = oneshot::channel();
        let backend = Arc::clone(&self.backend);
        let query_timeout = self.config.query_timeout;

        tracing::debug!(
            backend = self.backend.name(),
            has_image = request.attachment.is_some(),
            "Starting query"
        );

        tokio::spawn(async move {
            let result = match tokio::time::timeout(query_timeout, backend.send_query(&request)).await
            {
                Ok(result) => result,
                Err(_) => Err(BackendError::timeout(query_timeout)),
            };
            // The Conductor may have been dropped; nothing to deliver to then
            let _ = done_tx.send(result);
        });

        self.in_flight = Some(InFlight {
            rx: done_rx,
            arrived: None,
        });
        self.send(ConductorMessage::BusyChanged { busy: true }).await;
        true
    }

    /// Apply the in-flight result if it has arrived
    ///
    /// Returns `true` if an attempt finished.
    pub async fn poll_completion(&mut self) -> bool {
        let received = match self.in_flight.as_mut() {
            None => return false,
            Some(in_flight) => match in_flight.arrived.take() {
                Some(arrived) => arrived,
                None => match in_flight.rx.try_recv() {
                    Ok(completion) => Some(completion),
                    Err(oneshot::error::TryRecvError::Empty) => return false,
                    Err(oneshot::error::TryRecvError::Closed) => None,
                },
            },
        };
        self.finish(received).await;
        true
    }

    /// Wait until the in-flight query has reported, without applying it
    ///
    /// Cancel-safe, so it can sit in a `tokio::select!` next to user input.
    /// Follow up with [`Self::poll_completion`]. Returns immediately if
    /// nothing is in flight.
    pub async fn completion_ready(&mut self) {
        if let Some(in_flight) = self.in_flight.as_mut() {
            if in_flight.arrived.is_none() {
                let received = (&mut in_flight.rx).await.ok();
                in_flight.arrived = Some(received);
            }
        }
    }

    /// Wait for the in-flight result and apply it
    ///
    /// Returns `false` immediately if nothing is in flight.
    pub async fn wait_completion(&mut self) -> bool {
        self.completion_ready().await;
        self.poll_completion().await
    }

    /// Record a new availability probe result
    pub async fn observe_availability(&mut self, signal: Option<AvailabilitySignal>) {
        self.availability = signal;
        if let Some(signal) = signal {
            self.send(ConductorMessage::Availability { signal }).await;
        }
    }

    /// Close out the in-flight attempt
    ///
    /// `None` means the query task went away without reporting.
    async fn finish(&mut self, received: Option<Completion>) {
        if self.in_flight.take().is_none() {
            return;
        }

        let turn = match received {
            Some(Ok(reply)) => self.interpret(reply).await,
            Some(Err(err)) => {
                let err = ClientError::from(err);
                tracing::warn!(error = %err, "Query failed");
                NewTurn::error(err.user_message())
            }
            None => {
                tracing::error!("Query task ended without a result");
                NewTurn::error(
                    ClientError::Transport("the request was interrupted".to_string())
                        .user_message(),
                )
            }
        };

        self.append(turn).await;
        self.release().await;
    }

    /// Turn a reply into the single turn that closes the attempt
    async fn interpret(&mut self, reply: BackendReply) -> NewTurn {
        match reply {
            BackendReply::Text { text, source } => {
                if source.as_deref() == Some(SOURCE_AUTH_REQUIRED)
                    && !self.session.session().is_signed_in()
                {
                    self.notify(
                        NotifyLevel::Warning,
                        "Sign in to let the assistant use your account",
                    )
                    .await;
                }
                NewTurn::assistant(text).with_source(source)
            }
            BackendReply::Directive(directive) => {
                self.engine.execute(&directive).await.follow_up
            }
        }
    }

    /// Clear busy and the pending attachment
    async fn release(&mut self) {
        if self.pending_attachment.take().is_some() {
            self.send(ConductorMessage::AttachmentChanged { name: None })
                .await;
        }
        self.send(ConductorMessage::BusyChanged { busy: false }).await;
    }

    async fn attach_image(&mut self, path: &Path) {
        if self.is_busy() {
            self.notify(NotifyLevel::Warning, "Wait for the current reply first")
                .await;
            return;
        }

        let loaded = match self.engine.gateway().ensure(Capability::Storage).await {
            Ok(()) => Attachment::load(path).await,
            Err(err) => Err(err),
        };

        match loaded {
            Ok(attachment) => {
                tracing::info!(
                    name = %attachment.name,
                    bytes = attachment.bytes.len(),
                    "Attachment selected"
                );
                self.set_attachment(attachment).await;
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Could not attach image");
                self.append(NewTurn::error(err.user_message())).await;
            }
        }
    }

    async fn set_attachment(&mut self, attachment: Attachment) {
        let name = attachment.name.clone();
        self.pending_attachment = Some(attachment);
        self.send(ConductorMessage::AttachmentChanged { name: Some(name) })
            .await;
    }

    async fn sign_in(&mut self) {
        let result = self
            .session
            .sign_in()
            .await
            .map(|session| session.display_name().unwrap_or("user").to_string());

        match result {
            Ok(name) => {
                self.send_session().await;
                self.notify(NotifyLevel::Success, &format!("Signed in as {name}"))
                    .await;
            }
            Err(e) => {
                self.notify(NotifyLevel::Warning, &format!("Sign-in failed: {e}"))
                    .await;
            }
        }
    }

    async fn append(&mut self, turn: NewTurn) {
        let turn = self.log.append(turn).clone();
        self.send(ConductorMessage::TurnAppended { turn }).await;
    }

    async fn send_session(&self) {
        let session = self.session.session();
        self.send(ConductorMessage::SessionChanged {
            signed_in: session.is_signed_in(),
            display_name: session.display_name().map(ToString::to_string),
        })
        .await;
    }

    /// Send notification
    async fn notify(&self, level: NotifyLevel, message: &str) {
        self.send(ConductorMessage::Notify {
            level,
            message: message.to_string(),
        })
        .await;
    }

    /// Send a message to the UI surface
    async fn send(&self, msg: ConductorMessage) {
        if let Err(e) = self.tx.send(msg).await {
            tracing::warn!("Failed to send message to surface: {}", e);
        }
    }
}
