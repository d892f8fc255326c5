//! Klai Core - Headless Conversation Orchestration
//!
//! This crate is the client-side orchestration layer of klai: it turns user
//! input into backend queries, interprets replies (plain text or structured
//! directives), executes directives against device capabilities, and tracks
//! whether the backend's language-model engine is up. It has no UI of its own
//! and can drive a terminal, a mobile shell, or a test harness.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          UI Surface                              │
//! │            SurfaceEvent (up)     ConductorMessage (down)         │
//! └───────────────────────────────┬──────────────────────────────────┘
//!                                 │
//! ┌───────────────────────────────┼──────────────────────────────────┐
//! │                          KLAI CORE                               │
//! │  ┌────────────────────────────┴───────────────────────────────┐  │
//! │  │                        Conductor                           │  │
//! │  │  ┌──────────┐  ┌──────────────────┐  ┌──────────────────┐  │  │
//! │  │  │ TurnLog  │  │ InstructionEngine│  │  SessionManager  │  │  │
//! │  │  └──────────┘  └────────┬─────────┘  └──────────────────┘  │  │
//! │  └─────────────┬───────────┼──────────────────────────────────┘  │
//! │                │           │                                     │
//! │  ┌─────────────┴──┐  ┌─────┴─────────────┐  ┌─────────────────┐  │
//! │  │AssistantBackend│  │ CapabilityGateway │  │ Availability    │  │
//! │  │  (HTTP)        │  │  (NativeBridge)   │  │ Monitor         │  │
//! │  └────────────────┘  └───────────────────┘  └─────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`Conductor`]: Owns the turn log and sequences every send
//! - [`ConductorMessage`]: Messages sent from Conductor to UI surfaces
//! - [`SurfaceEvent`]: Events sent from UI surfaces to Conductor
//! - [`AvailabilityMonitor`]: Background poll of the backend's engine
//! - [`InstructionEngine`]: Executes backend directives
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use klai_core::{
//!     backend::{BackendConfig, HttpBackend},
//!     capability::DesktopBridge,
//!     session::EnvIdentityProvider,
//!     Conductor, ConductorConfig, SurfaceEvent,
//! };
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let (tx, mut rx) = mpsc::channel(100);
//!     let backend = Arc::new(HttpBackend::new(BackendConfig::default())?);
//!     let mut conductor = Conductor::new(
//!         backend,
//!         Arc::new(DesktopBridge::new()),
//!         Arc::new(EnvIdentityProvider::new()),
//!         ConductorConfig::default(),
//!         tx,
//!     );
//!     conductor.start().await;
//!
//!     conductor
//!         .handle_event(SurfaceEvent::Submit { text: "Hello".into() })
//!         .await;
//!     conductor.wait_completion().await;
//!
//!     while let Ok(msg) = rx.try_recv() {
//!         // Render message to UI
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`availability`]: Periodic, cancellable backend availability probe
//! - [`backend`]: Backend client abstraction and the HTTP implementation
//! - [`capability`]: Permission-gated access to device capabilities
//! - [`conductor`]: Main Conductor struct
//! - [`config`]: Layered TOML/env/CLI configuration
//! - [`conversation`]: Turn log and attachments
//! - [`engine`]: Directive execution
//! - [`error`]: Error taxonomy
//! - [`events`]: Events from UI surfaces to Conductor
//! - [`messages`]: Messages from Conductor to UI surfaces
//! - [`session`]: Sign-in state and identity providers

#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod availability;
pub mod backend;
pub mod capability;
pub mod conductor;
pub mod config;
pub mod conversation;
pub mod engine;
pub mod error;
pub mod events;
pub mod messages;
pub mod session;

// Re-exports for convenience
pub use availability::{
    Availability, AvailabilityMonitor, AvailabilitySignal, MonitorConfig, MonitorHandle,
    MonitorState,
};
pub use backend::{
    AssistantBackend, BackendConfig, BackendReply, Directive, DirectiveKind, HttpBackend,
    QueryRequest, ServiceStatus,
};
pub use capability::{
    Capability, CapabilityGateway, DesktopBridge, NativeBridge, NativeError, NativeErrorCode,
    PermissionState,
};
pub use conductor::{Conductor, ConductorConfig};
pub use conversation::{Attachment, ConversationTurn, ImageRef, NewTurn, TurnId, TurnLog, TurnRole};
pub use engine::{Execution, ExecutionOutcome, InstructionEngine};
pub use error::{BackendError, ClientError};
pub use events::SurfaceEvent;
pub use messages::{ConductorMessage, NotifyLevel};
pub use session::{
    Credentials, EnvIdentityProvider, Identity, IdentityError, IdentityProvider, Session,
    SessionManager,
};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, ClientConfig, ClientToml,
    ConfigError, ConfigOverrides, ConfigSource,
};
