//! Capability Gateway
//!
//! Privileged device functions (messaging, camera, storage) sit behind OS-level
//! permissions. The platform side is reached through the narrow [`NativeBridge`]
//! trait; the [`CapabilityGateway`] wraps it with an idempotent
//! check-then-request flow and maps bridge failures into [`ClientError`]s.
//!
//! The gateway never caches a permission decision. Every action re-checks the
//! platform's own permission store first.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// A privileged device function
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// Taking photos
    Camera,
    /// Reading images from the gallery / filesystem
    Storage,
    /// Sending text messages
    Messaging,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Camera => write!(f, "camera"),
            Self::Storage => write!(f, "storage"),
            Self::Messaging => write!(f, "messaging"),
        }
    }
}

/// Per-capability permission state as reported by the platform
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionState {
    /// The user granted access
    Granted,
    /// The user refused access
    Denied,
    /// The user has not been asked yet
    Undetermined,
}

/// Error codes reported by the platform bridge
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NativeErrorCode {
    /// The capability is not granted
    NoPermission,
    /// The platform accepted the request but delivery failed
    SendFailed,
    /// The platform rejected an argument (e.g. a malformed number)
    InvalidArgument,
    /// The device has no such capability
    Unsupported,
}

impl fmt::Display for NativeErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Self::NoPermission => "NO_PERMISSION",
            Self::SendFailed => "SEND_FAILED",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::Unsupported => "UNSUPPORTED",
        };
        f.write_str(code)
    }
}

/// Failure reported by a native action
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NativeError {
    /// Enumerated code
    pub code: NativeErrorCode,
    /// Human-readable detail
    pub detail: String,
}

impl NativeError {
    /// Create a new native error
    pub fn new(code: NativeErrorCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: detail.into(),
        }
    }
}

/// Platform bridge to device capabilities
///
/// One implementation exists per target platform. Calls may suspend (a
/// permission prompt waits for the user).
#[async_trait]
pub trait NativeBridge: Send + Sync {
    /// Platform name, for logging
    fn platform(&self) -> &str;

    /// Whether the capability is currently granted
    async fn has_permission(&self, capability: Capability) -> bool;

    /// Ask the user for the capability; returns whether it is now granted
    async fn request_permission(&self, capability: Capability) -> bool;

    /// Tri-state view of the permission
    ///
    /// Platforms that can tell "never asked" from "refused" should override
    /// this; the default only knows granted or not.
    async fn permission_state(&self, capability: Capability) -> PermissionState {
        if self.has_permission(capability).await {
            PermissionState::Granted
        } else {
            PermissionState::Undetermined
        }
    }

    /// Send a text message to a phone number
    async fn send_message(&self, phone_number: &str, message: &str) -> Result<(), NativeError>;
}

/// Idempotent permission wrapper around a [`NativeBridge`]
pub struct CapabilityGateway<N: NativeBridge> {
    bridge: Arc<N>,
}

impl<N: NativeBridge> Clone for CapabilityGateway<N> {
    fn clone(&self) -> Self {
        Self {
            bridge: Arc::clone(&self.bridge),
        }
    }
}

impl<N: NativeBridge> CapabilityGateway<N> {
    /// Create a gateway over a bridge
    pub fn new(bridge: Arc<N>) -> Self {
        Self { bridge }
    }

    /// The underlying bridge
    pub fn bridge(&self) -> &Arc<N> {
        &self.bridge
    }

    /// Current permission state, freshly queried
    pub async fn check(&self, capability: Capability) -> PermissionState {
        self.bridge.permission_state(capability).await
    }

    /// Make sure a capability is granted, prompting if needed
    ///
    /// Already-granted capabilities never trigger a prompt.
    pub async fn ensure(&self, capability: Capability) -> Result<(), ClientError> {
        let state = self.check(capability).await;
        if state == PermissionState::Granted {
            return Ok(());
        }

        tracing::debug!(
            capability = %capability,
            state = ?state,
            platform = self.bridge.platform(),
            "Requesting capability permission"
        );

        if self.bridge.request_permission(capability).await {
            tracing::info!(capability = %capability, "Capability granted");
            Ok(())
        } else {
            tracing::warn!(capability = %capability, "Capability denied");
            Err(ClientError::PermissionDenied(capability))
        }
    }

    /// Send a text message; the caller is expected to have called [`Self::ensure`]
    pub async fn send_message(&self, phone_number: &str, message: &str) -> Result<(), ClientError> {
        self.bridge
            .send_message(phone_number, message)
            .await
            .map_err(|err| match err.code {
                NativeErrorCode::NoPermission => ClientError::PermissionDenied(Capability::Messaging),
                code => ClientError::NativeAction {
                    code,
                    detail: err.detail,
                },
            })
    }
}

/// Bridge for desktop terminals
///
/// Images come from the filesystem, so storage is granted and the camera
/// (a file picker here) is granted on request. A desktop cannot send text
/// messages, so messaging is always denied.
pub struct DesktopBridge {
    grants: RwLock<HashMap<Capability, PermissionState>>,
}

impl DesktopBridge {
    /// Create a bridge with the desktop defaults
    #[must_use]
    pub fn new() -> Self {
        let mut grants = HashMap::new();
        grants.insert(Capability::Camera, PermissionState::Undetermined);
        grants.insert(Capability::Storage, PermissionState::Granted);
        grants.insert(Capability::Messaging, PermissionState::Denied);
        Self {
            grants: RwLock::new(grants),
        }
    }

    fn state_of(&self, capability: Capability) -> PermissionState {
        self.grants
            .read()
            .get(&capability)
            .copied()
            .unwrap_or(PermissionState::Undetermined)
    }
}

impl Default for DesktopBridge {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NativeBridge for DesktopBridge {
    fn platform(&self) -> &str {
        "desktop"
    }

    async fn has_permission(&self, capability: Capability) -> bool {
        self.state_of(capability) == PermissionState::Granted
    }

    async fn request_permission(&self, capability: Capability) -> bool {
        let granted = !matches!(capability, Capability::Messaging);
        let state = if granted {
            PermissionState::Granted
        } else {
            PermissionState::Denied
        };
        self.grants.write().insert(capability, state);
        granted
    }

    async fn permission_state(&self, capability: Capability) -> PermissionState {
        self.state_of(capability)
    }

    async fn send_message(&self, _phone_number: &str, _message: &str) -> Result<(), NativeError> {
        Err(NativeError::new(
            NativeErrorCode::Unsupported,
            "this device cannot send text messages",
        ))
    }
}
