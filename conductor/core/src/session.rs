//! Session and Identity Management
//!
//! Holds the sign-in state and the bearer token that authorizes backend
//! queries.
//!
//! # Design Philosophy
//!
//! The client never stores credentials itself. An [`IdentityProvider`] (an
//! OAuth flow on mobile, environment variables on the desktop) owns durable
//! state and hands the token back on [`SessionManager::restore`]. The
//! [`SessionManager`] only keeps the current [`Session`] in memory.
//!
//! Sign-in failures are never fatal: the previous session stays as it was.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable holding the bearer token
pub const ENV_ACCESS_TOKEN: &str = "KLAI_ACCESS_TOKEN";
/// Environment variable holding the display name
pub const ENV_DISPLAY_NAME: &str = "KLAI_DISPLAY_NAME";
/// Environment variable holding the account email
pub const ENV_EMAIL: &str = "KLAI_EMAIL";
/// Environment variable holding the avatar URL
pub const ENV_AVATAR_URL: &str = "KLAI_AVATAR_URL";

/// Account identity as reported by the identity provider
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Name shown in the UI
    pub display_name: String,
    /// Account email
    pub email: Option<String>,
    /// Profile picture
    pub avatar_url: Option<String>,
}

/// Identity plus the token that authorizes backend calls
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Who signed in
    pub identity: Identity,
    /// Bearer token
    pub access_token: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identity", &self.identity)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Identity provider failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdentityError {
    /// The user backed out of the sign-in flow
    #[error("sign-in was cancelled")]
    Cancelled,

    /// No identity is available from this provider
    #[error("no identity available: {0}")]
    Unavailable(String),

    /// The provider reported an error
    #[error("identity provider error: {0}")]
    Provider(String),
}

/// Current sign-in state
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Session {
    identity: Option<Identity>,
    access_token: Option<String>,
    signed_in: bool,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.identity)
            .field("has_token", &self.access_token.is_some())
            .field("signed_in", &self.signed_in)
            .finish()
    }
}

impl Session {
    /// A signed-out session
    #[must_use]
    pub fn signed_out() -> Self {
        Self::default()
    }

    /// A signed-in session
    #[must_use]
    pub fn from_credentials(credentials: Credentials) -> Self {
        Self {
            identity: Some(credentials.identity),
            access_token: Some(credentials.access_token),
            signed_in: true,
        }
    }

    /// Whether a user is signed in
    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.signed_in
    }

    /// The signed-in identity
    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Bearer token for backend calls
    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    /// Name to greet the user with
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.identity.as_ref().map(|i| i.display_name.as_str())
    }
}

/// Source of identities and tokens
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &str;

    /// Return a previously granted identity, if the provider remembers one
    async fn restore(&self) -> Result<Option<Credentials>, IdentityError>;

    /// Run the sign-in flow
    async fn sign_in(&self) -> Result<Credentials, IdentityError>;

    /// Forget the granted identity
    async fn sign_out(&self) -> Result<(), IdentityError>;
}

/// Owns the in-memory [`Session`]
pub struct SessionManager<P: IdentityProvider + ?Sized> {
    provider: Arc<P>,
    session: Session,
}

impl<P: IdentityProvider + ?Sized> SessionManager<P> {
    /// Create a manager with a signed-out session
    pub fn new(provider: Arc<P>) -> Self {
        Self {
            provider,
            session: Session::signed_out(),
        }
    }

    /// Current session
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Token to attach to the next backend query
    pub fn access_token(&self) -> Option<&str> {
        self.session.access_token()
    }

    /// Restore a previously granted identity
    ///
    /// Provider errors leave the session signed out.
    pub async fn restore(&mut self) -> &Session {
        match self.provider.restore().await {
            Ok(Some(credentials)) => {
                tracing::info!(
                    provider = self.provider.name(),
                    user = %credentials.identity.display_name,
                    "Restored session"
                );
                self.session = Session::from_credentials(credentials);
            }
            Ok(None) => {
                tracing::debug!(provider = self.provider.name(), "No session to restore");
                self.session = Session::signed_out();
            }
            Err(e) => {
                tracing::warn!(
                    provider = self.provider.name(),
                    error = %e,
                    "Session restore failed; continuing signed out"
                );
                self.session = Session::signed_out();
            }
        }
        &self.session
    }

    /// Sign in
    ///
    /// On failure the current session is left untouched.
    pub async fn sign_in(&mut self) -> Result<&Session, IdentityError> {
        match self.provider.sign_in().await {
            Ok(credentials) => {
                tracing::info!(
                    provider = self.provider.name(),
                    user = %credentials.identity.display_name,
                    "Signed in"
                );
                self.session = Session::from_credentials(credentials);
                Ok(&self.session)
            }
            Err(e) => {
                tracing::warn!(provider = self.provider.name(), error = %e, "Sign-in failed");
                Err(e)
            }
        }
    }

    /// Sign out and clear the session
    ///
    /// The local session is cleared even if the provider fails to forget.
    pub async fn sign_out(&mut self) {
        if let Err(e) = self.provider.sign_out().await {
            tracing::warn!(provider = self.provider.name(), error = %e, "Provider sign-out failed");
        }
        self.session = Session::signed_out();
        tracing::info!("Signed out");
    }
}

type Lookup = dyn Fn(&str) -> Option<String> + Send + Sync;

/// Identity provider backed by environment variables
///
/// Reads [`ENV_ACCESS_TOKEN`] plus optional profile fields. There is no
/// interactive flow, so signing in only succeeds if the token is set.
pub struct EnvIdentityProvider {
    lookup: Box<Lookup>,
}

impl EnvIdentityProvider {
    /// Read from the process environment
    #[must_use]
    pub fn new() -> Self {
        Self::with_lookup(|key| std::env::var(key).ok())
    }

    /// Read from a custom lookup
    pub fn with_lookup(lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            lookup: Box::new(lookup),
        }
    }

    fn var(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn credentials(&self) -> Option<Credentials> {
        let access_token = self.var(ENV_ACCESS_TOKEN)?;
        let email = self.var(ENV_EMAIL);
        let display_name = self
            .var(ENV_DISPLAY_NAME)
            .or_else(|| email.clone())
            .unwrap_or_else(|| "User".to_string());

        Some(Credentials {
            identity: Identity {
                display_name,
                email,
                avatar_url: self.var(ENV_AVATAR_URL),
            },
            access_token,
        })
    }
}

impl Default for EnvIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for EnvIdentityProvider {
    fn name(&self) -> &str {
        "env"
    }

    async fn restore(&self) -> Result<Option<Credentials>, IdentityError> {
        Ok(self.credentials())
    }

    async fn sign_in(&self) -> Result<Credentials, IdentityError> {
        self.credentials().ok_or_else(|| {
            IdentityError::Unavailable(format!("set {ENV_ACCESS_TOKEN} to sign in"))
        })
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        Ok(())
    }
}
