//! Conductor Messages
//!
//! Messages sent from the Conductor to UI surfaces.
//!
//! # Design Philosophy
//!
//! UI surfaces are pure renderers. Everything they show (the turn log, the busy
//! indicator, the attachment chip, the availability badge) arrives as a
//! [`ConductorMessage`], so a terminal, a mobile shell, or a test harness can
//! drive the same Conductor.

use serde::{Deserialize, Serialize};

use crate::availability::AvailabilitySignal;
use crate::conversation::ConversationTurn;

/// Messages from Conductor to UI Surface
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ConductorMessage {
    // ============================================
    // Conversation
    // ============================================
    /// A turn was appended to the log
    TurnAppended {
        /// The appended turn
        turn: ConversationTurn,
    },

    /// A send started or finished
    BusyChanged {
        /// Whether a send is in flight
        busy: bool,
    },

    /// The input field should be emptied
    InputCleared,

    /// The pending attachment changed
    AttachmentChanged {
        /// File name of the new attachment, `None` when cleared
        name: Option<String>,
    },

    // ============================================
    // Status
    // ============================================
    /// A new availability probe result
    Availability {
        /// The probe result
        signal: AvailabilitySignal,
    },

    /// Sign-in state changed
    SessionChanged {
        /// Whether a user is signed in
        signed_in: bool,
        /// Signed-in user's display name
        display_name: Option<String>,
    },

    /// Transient notification (not part of the turn log)
    Notify {
        /// Severity
        level: NotifyLevel,
        /// Text to show
        message: String,
    },

    // ============================================
    // Lifecycle
    // ============================================
    /// The surface should exit
    Quit {
        /// Farewell text
        message: Option<String>,
    },
}

/// Notification levels
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotifyLevel {
    /// Informational
    Info,
    /// Warning
    Warning,
    /// Error
    Error,
    /// Success
    Success,
}

impl NotifyLevel {
    /// Short prefix for text surfaces
    #[must_use]
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Success => "ok",
        }
    }
}
