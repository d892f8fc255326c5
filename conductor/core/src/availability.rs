//! Backend Availability Monitor
//!
//! A cancellable background task that probes whether the backend's language
//! model engine is up and publishes the answer on a `watch` channel.
//!
//! # Lifecycle
//!
//! ```text
//! +---------+   start()   +---------+   stop()   +---------+
//! |  (new)  | ----------> | Running | ---------> | Stopped |
//! +---------+             +---------+            +---------+
//!                          probe now, then every `interval`
//! ```
//!
//! Each probe is bounded by `probe_timeout`; a probe that runs out of time
//! counts as unavailable. Once `stop()` has been called, results of a probe
//! that was still in flight are discarded instead of published.
//!
//! Availability never gates anything. It only feeds a status indicator; the
//! backend supplies its own fallback text when the engine is down.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::AssistantBackend;

/// Result of one availability probe
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilitySignal {
    /// Whether the engine answered as available
    pub available: bool,
    /// When the probe completed
    pub last_checked_at: DateTime<Utc>,
}

impl AvailabilitySignal {
    /// A signal stamped with the current time
    #[must_use]
    pub fn now(available: bool) -> Self {
        Self {
            available,
            last_checked_at: Utc::now(),
        }
    }
}

/// Tri-state availability as shown to the user
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Availability {
    /// No probe has completed yet
    Unknown,
    /// The engine is up
    Available,
    /// The engine is down or unreachable
    Unavailable,
}

impl Availability {
    /// Interpret the published cell
    #[must_use]
    pub fn from_signal(signal: Option<&AvailabilitySignal>) -> Self {
        match signal {
            None => Self::Unknown,
            Some(s) if s.available => Self::Available,
            Some(_) => Self::Unavailable,
        }
    }

    /// Short label for status displays
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unknown => "checking...",
            Self::Available => "AI online",
            Self::Unavailable => "AI offline (fallback replies)",
        }
    }
}

/// Monitor timing
#[derive(Clone, Debug)]
pub struct MonitorConfig {
    /// Time between probes
    pub interval: Duration,
    /// Upper bound on a single probe
    pub probe_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(5),
        }
    }
}

/// Whether the poll task is live
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MonitorState {
    /// Probing on schedule
    Running,
    /// Cancelled or finished
    Stopped,
}

/// Periodic availability poller
pub struct AvailabilityMonitor<B: AssistantBackend + ?Sized> {
    backend: Arc<B>,
    config: MonitorConfig,
    tx: Arc<watch::Sender<Option<AvailabilitySignal>>>,
}

impl<B: AssistantBackend + ?Sized + 'static> AvailabilityMonitor<B> {
    /// Create a monitor; nothing runs until [`Self::start`]
    pub fn new(backend: Arc<B>, config: MonitorConfig) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            backend,
            config,
            tx: Arc::new(tx),
        }
    }

    /// Receive availability updates
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<AvailabilitySignal>> {
        self.tx.subscribe()
    }

    /// Latest published availability
    #[must_use]
    pub fn current(&self) -> Availability {
        Availability::from_signal(self.tx.borrow().as_ref())
    }

    /// Spawn the poll task; the first probe happens immediately
    pub fn start(&self) -> MonitorHandle {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_monitor(
            Arc::clone(&self.backend),
            self.config.clone(),
            Arc::clone(&self.tx),
            cancel.clone(),
        ));

        info!(
            backend = self.backend.name(),
            interval_secs = self.config.interval.as_secs(),
            "Availability monitor started"
        );

        MonitorHandle {
            cancel,
            task,
            rx: self.tx.subscribe(),
        }
    }
}

/// Handle to a running monitor
///
/// Dropping the handle does not stop the task; call [`MonitorHandle::stop`]
/// when the owning surface is torn down.
pub struct MonitorHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
    rx: watch::Receiver<Option<AvailabilitySignal>>,
}

impl MonitorHandle {
    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> MonitorState {
        if self.cancel.is_cancelled() || self.task.is_finished() {
            MonitorState::Stopped
        } else {
            MonitorState::Running
        }
    }

    /// Latest published availability
    #[must_use]
    pub fn current(&self) -> Availability {
        Availability::from_signal(self.rx.borrow().as_ref())
    }

    /// Latest published signal
    #[must_use]
    pub fn signal(&self) -> Option<AvailabilitySignal> {
        *self.rx.borrow()
    }

    /// Receive availability updates
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<AvailabilitySignal>> {
        self.rx.clone()
    }

    /// Cancel the poll task and wait for it to exit
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Availability monitor task ended abnormally");
        }
        info!("Availability monitor stopped");
    }
}

async fn run_monitor<B: AssistantBackend + ?Sized>(
    backend: Arc<B>,
    config: MonitorConfig,
    tx: Arc<watch::Sender<Option<AvailabilitySignal>>>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let probe = tokio::time::timeout(config.probe_timeout, backend.probe_availability());
        let signal = tokio::select! {
            () = cancel.cancelled() => break,
            result = probe => match result {
                Ok(signal) => signal,
                Err(_) => {
                    warn!(
                        timeout_secs = config.probe_timeout.as_secs(),
                        "Availability probe timed out"
                    );
                    AvailabilitySignal::now(false)
                }
            },
        };

        // The owner may have gone away while the probe was finishing
        if cancel.is_cancelled() {
            break;
        }

        let previous = tx.send_replace(Some(signal));
        match previous {
            Some(prev) if prev.available == signal.available => {
                debug!(available = signal.available, "Availability unchanged");
            }
            _ => {
                info!(available = signal.available, "Availability changed");
            }
        }
    }
}
