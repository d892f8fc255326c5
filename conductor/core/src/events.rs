//! Surface Events
//!
//! Events sent from UI surfaces to the Conductor.
//!
//! # Design Philosophy
//!
//! UI surfaces are "dumb" renderers that forward user actions to the Conductor.
//! They don't interpret what actions mean - they just report what happened.
//! The Conductor decides how to respond.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Events from UI Surface to Conductor
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurfaceEvent {
    /// User pressed send
    Submit {
        /// Contents of the input field (may be empty when an image is attached)
        text: String,
    },

    /// User picked an image
    AttachImage {
        /// Where the image lives
        path: PathBuf,
    },

    /// User removed the pending image
    ClearAttachment,

    /// User asked to sign in
    SignIn,

    /// User asked to sign out
    SignOut,

    /// User wants to quit
    Quit,
}

impl SurfaceEvent {
    /// Event name for logging
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Submit { .. } => "submit",
            Self::AttachImage { .. } => "attach_image",
            Self::ClearAttachment => "clear_attachment",
            Self::SignIn => "sign_in",
            Self::SignOut => "sign_out",
            Self::Quit => "quit",
        }
    }
}
