//! Port traits: the hexagonal boundary between the access-control core
//! and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AccessController (domain)
//! ```
//!
//! Driven adapters (actuators, the backend client, event sinks, storage)
//! implement these traits.  The [`AccessController`](super::service::AccessController)
//! consumes them via generics, so the domain core never touches hardware
//! or sockets directly.
//!
//! The link-layer port lives next to its only consumer in
//! [`connectivity`](crate::connectivity).

use crate::config::SystemConfig;
use crate::diagnostics::StatusReport;
use crate::error::CommsError;
use crate::scanner::AccessRequest;

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port for the indicator LEDs, buzzer and gate relay.
///
/// Only the [`FeedbackController`](crate::feedback::FeedbackController)
/// calls this; every method must return immediately.
pub trait ActuatorPort {
    /// Drive both indicator LEDs.
    fn set_lights(&mut self, green: bool, red: bool);

    /// Start a continuous tone at `freq_hz`.  Stopping is the caller's job.
    fn start_tone(&mut self, freq_hz: u32);

    /// Silence the buzzer.
    fn stop_tone(&mut self);

    /// Energise (`true`) or release the gate relay.
    fn set_relay(&mut self, engaged: bool);

    /// Everything off: safe state.
    fn all_off(&mut self) {
        self.set_relay(false);
        self.stop_tone();
        self.set_lights(false, false);
    }
}

// ───────────────────────────────────────────────────────────────
// Validation port (driven adapter: domain ↔ backend)
// ───────────────────────────────────────────────────────────────

/// Verdict of one validation exchange.  Consumed exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Granted,
    Denied { reason: Option<String> },
    /// Transport failure or a transient server error (5xx).
    NetworkError,
    /// No verdict before the per-call deadline.
    Timeout,
    /// The backend answered outside its contract.  Never retried.
    MalformedResponse,
}

impl ValidationOutcome {
    /// Outcomes that count toward the retry ceiling.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::NetworkError | Self::Timeout)
    }

    pub const fn label(&self) -> &'static str {
        match self {
            Self::Granted => "GRANTED",
            Self::Denied { .. } => "DENIED",
            Self::NetworkError => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::MalformedResponse => "MALFORMED",
        }
    }
}

/// Non-blocking membership validation.
///
/// `start` begins an exchange and returns at once; `poll` is called every
/// tick until it yields an outcome.  At most one exchange is in flight.
pub trait ValidationPort {
    /// Begin validating `request`.  Any in-flight exchange is abandoned.
    fn start(&mut self, request: &AccessRequest, now_ms: u64) -> Result<(), CommsError>;

    /// Advance the in-flight exchange by one non-blocking step.
    fn poll(&mut self, now_ms: u64) -> Option<ValidationOutcome>;

    /// Drop the in-flight exchange.  Nothing it produces is surfaced later.
    fn abandon(&mut self);

    /// Fire-and-forget device status report.
    fn report_status(&mut self, report: &StatusReport, now_ms: u64);

    /// Advance background work (status report delivery).
    fn service(&mut self, _now_ms: u64) {}
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// Implementations validate before persisting and after loading.  Invalid
/// ranges are rejected with [`ConfigError::ValidationFailed`], never
/// clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`ConfigError::NotFound`] on first boot.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&mut self, config: &SystemConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed deserialisation.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl From<ConfigError> for crate::error::Error {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::ValidationFailed(msg) => Self::Config(msg),
            ConfigError::NotFound => Self::Config("not found"),
            ConfigError::Corrupted => Self::Config("corrupted"),
            ConfigError::StorageFull => Self::Config("storage full"),
            ConfigError::IoError => Self::Config("I/O error"),
        }
    }
}
