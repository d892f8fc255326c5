//! Conversation Turn Log
//!
//! The ordered, append-only record of what the user, the assistant, and the
//! client itself have said. Turns are immutable once appended, and their
//! `created_at` timestamps never go backwards.
//!
//! Also home to [`Attachment`], the image the user has picked but not yet sent.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ClientError;

/// Unique identifier for a turn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TurnId(pub Uuid);

impl TurnId {
    /// Create a new unique turn ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TurnId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form: first 8 chars of UUID
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Who a turn belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnRole {
    /// Typed by the user
    User,
    /// Produced by the backend
    Assistant,
    /// Produced by the client (action confirmations, errors)
    System,
}

impl TurnRole {
    /// Display label
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::User => "You",
            Self::Assistant => "Assistant",
            Self::System => "System",
        }
    }
}

/// Reference to an image carried by a turn (the bytes are not kept in the log)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    /// File name shown to the user
    pub name: String,
    /// MIME type
    pub mime_type: String,
    /// Size of the image in bytes
    pub size_bytes: usize,
}

/// An image selected by the user, with its bytes loaded
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    /// File name
    pub name: String,
    /// MIME type
    pub mime_type: String,
    /// Raw image bytes
    pub bytes: Vec<u8>,
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl Attachment {
    /// Create an attachment from bytes already in memory
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Read an image file
    ///
    /// The MIME type is inferred from the extension.
    pub async fn load(path: &Path) -> Result<Self, ClientError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ClientError::Attachment(format!("{}: {e}", path.display())))?;
        if bytes.is_empty() {
            return Err(ClientError::Attachment(format!(
                "{} is empty",
                path.display()
            )));
        }

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image")
            .to_string();

        Ok(Self {
            mime_type: mime_type_for(path).to_string(),
            name,
            bytes,
        })
    }

    /// The reference recorded in the turn log
    #[must_use]
    pub fn image_ref(&self) -> ImageRef {
        ImageRef {
            name: self.name.clone(),
            mime_type: self.mime_type.clone(),
            size_bytes: self.bytes.len(),
        }
    }
}

/// Guess an image MIME type from a file extension
#[must_use]
pub fn mime_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        _ => "application/octet-stream",
    }
}

/// A turn in the conversation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Unique turn ID
    pub id: TurnId,
    /// Who the turn belongs to
    pub role: TurnRole,
    /// Turn text
    pub text: String,
    /// Image sent with the turn, if any
    pub attachment: Option<ImageRef>,
    /// Whether this turn reports a failure
    pub is_error: bool,
    /// When the turn was appended
    pub created_at: DateTime<Utc>,
    /// Backend-reported origin of an assistant turn (e.g. `assistant`, `google_sms`)
    pub source: Option<String>,
}

/// A turn that has not been appended yet
#[derive(Clone, Debug, PartialEq)]
pub struct NewTurn {
    /// Who the turn belongs to
    pub role: TurnRole,
    /// Turn text
    pub text: String,
    /// Image sent with the turn
    pub attachment: Option<ImageRef>,
    /// Whether this turn reports a failure
    pub is_error: bool,
    /// Backend-reported origin
    pub source: Option<String>,
}

impl NewTurn {
    fn with_role(role: TurnRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            attachment: None,
            is_error: false,
            source: None,
        }
    }

    /// A user turn
    pub fn user(text: impl Into<String>) -> Self {
        Self::with_role(TurnRole::User, text)
    }

    /// An assistant turn
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::with_role(TurnRole::Assistant, text)
    }

    /// A system turn
    pub fn system(text: impl Into<String>) -> Self {
        Self::with_role(TurnRole::System, text)
    }

    /// A system turn reporting a failure
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::with_role(TurnRole::System, text)
        }
    }

    /// Attach an image reference
    #[must_use]
    pub fn with_attachment(mut self, attachment: Option<ImageRef>) -> Self {
        self.attachment = attachment;
        self
    }

    /// Record the backend source
    #[must_use]
    pub fn with_source(mut self, source: Option<String>) -> Self {
        self.source = source;
        self
    }
}

/// Append-only ordered log of turns
#[derive(Clone, Debug, Default)]
pub struct TurnLog {
    turns: Vec<ConversationTurn>,
}

impl TurnLog {
    /// Create an empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn and return it
    ///
    /// `created_at` is clamped to the previous turn's timestamp so the log stays
    /// ordered even if the wall clock steps backwards.
    pub fn append(&mut self, turn: NewTurn) -> &ConversationTurn {
        let now = Utc::now();
        let created_at = match self.turns.last() {
            Some(last) if last.created_at > now => last.created_at,
            _ => now,
        };

        self.turns.push(ConversationTurn {
            id: TurnId::new(),
            role: turn.role,
            text: turn.text,
            attachment: turn.attachment,
            is_error: turn.is_error,
            created_at,
            source: turn.source,
        });

        let appended = &self.turns[self.turns.len() - 1];
        tracing::debug!(
            turn_id = %appended.id,
            role = ?appended.role,
            is_error = appended.is_error,
            "Appended turn"
        );
        appended
    }

    /// All turns in order
    #[must_use]
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// The most recent turn
    #[must_use]
    pub fn last(&self) -> Option<&ConversationTurn> {
        self.turns.last()
    }

    /// Number of turns
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether the log is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Look up a turn by ID
    #[must_use]
    pub fn get(&self, id: TurnId) -> Option<&ConversationTurn> {
        self.turns.iter().find(|t| t.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_append_preserves_order() {
        let mut log = TurnLog::new();
        log.append(NewTurn::user("Hello"));
        log.append(NewTurn::assistant("Hi there!"));
        log.append(NewTurn::error("boom"));

        let roles: Vec<_> = log.turns().iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![TurnRole::User, TurnRole::Assistant, TurnRole::System]
        );
        assert!(log.turns()[2].is_error);
        assert!(!log.turns()[0].is_error);
    }

    #[test]
    fn test_timestamps_non_decreasing() {
        let mut log = TurnLog::new();
        for i in 0..50 {
            log.append(NewTurn::user(format!("turn {i}")));
        }
        assert!(log
            .turns()
            .windows(2)
            .all(|w| w[0].created_at <= w[1].created_at));
    }

    #[test]
    fn test_get_by_id() {
        let mut log = TurnLog::new();
        let id = log.append(NewTurn::system("sent")).id;
        assert_eq!(log.get(id).map(|t| t.text.as_str()), Some("sent"));
        assert!(log.get(TurnId::new()).is_none());
    }

    #[test]
    fn test_mime_type_inference() {
        assert_eq!(mime_type_for(Path::new("a.PNG")), "image/png");
        assert_eq!(mime_type_for(Path::new("a.jpeg")), "image/jpeg");
        assert_eq!(mime_type_for(Path::new("a.jpg")), "image/jpeg");
        assert_eq!(mime_type_for(Path::new("noext")), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_attachment_load() {
        let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        file.write_all(&[0x89, b'P', b'N', b'G']).unwrap();

        let attachment = Attachment::load(file.path()).await.unwrap();
        assert_eq!(attachment.mime_type, "image/png");
        assert_eq!(attachment.bytes.len(), 4);
        assert_eq!(attachment.image_ref().size_bytes, 4);
    }

    #[tokio::test]
    async fn test_attachment_load_missing_file() {
        let err = Attachment::load(Path::new("/definitely/not/here.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Attachment(_)));
    }
}
