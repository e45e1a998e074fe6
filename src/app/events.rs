//! Outbound application events.
//!
//! The [`AccessController`](super::service::AccessController) emits these
//! through the [`EventSink`](super::ports::EventSink) port.  Adapters on
//! the other side decide what to do with them: log to serial, count them
//! in tests.

use crate::connectivity::LinkStatus;
use crate::error::ParseError;
use crate::fsm::StateId;

use super::ports::ValidationOutcome;

/// Why a scanned code did not start an access attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanRejection {
    /// The frame could not be parsed.
    Malformed(ParseError),
    /// A complete code arrived while the controller was in this state.
    Busy(StateId),
}

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The controller has started (carries initial state).
    Started(StateId),

    /// The FSM transitioned between states.
    StateChanged { from: StateId, to: StateId },

    ScanRejected(ScanRejection),

    /// A validation exchange was handed to the backend.
    ValidationStarted { member_id: String, attempt: u8 },

    /// A validation exchange produced a verdict.
    ValidationResolved {
        outcome: ValidationOutcome,
        attempt: u8,
    },

    AccessGranted { owner_id: String, member_id: String },

    AccessDenied {
        member_id: String,
        reason: Option<String>,
    },

    /// The network link went up or down.
    LinkChanged(LinkStatus),

    /// A periodic status report was handed to the backend.
    StatusReported { linked: bool, state: StateId },
}
