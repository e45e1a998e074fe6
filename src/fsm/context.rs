//! Shared mutable context threaded through every FSM handler.
//!
//! `FsmContext` is the blackboard the state handlers read from and write
//! to.  The [`AccessController`](crate::app::service::AccessController)
//! fills the input fields before each tick and executes the requested side
//! effects afterwards; handlers themselves never touch hardware or the
//! network.

use crate::app::ports::ValidationOutcome;
use crate::config::SystemConfig;
use crate::connectivity::LinkStatus;
use crate::feedback::FeedbackCommand;
use crate::scanner::AccessRequest;

use super::ErrorKind;

/// The shared context passed to every state handler function.
pub struct FsmContext {
    // -- Timing --
    /// Tick clock reading (ms since boot).  Set once per tick.
    pub now_ms: u64,
    /// Clock reading when the current state was entered.
    pub state_entered_ms: u64,
    /// Absolute deadline of the current state, if it has one.
    pub state_deadline_ms: Option<u64>,
    /// Ticks elapsed since the current state was entered.
    pub ticks_in_state: u64,
    /// Monotonic total tick count.
    pub total_ticks: u64,

    // -- Inputs (written by the service before each tick) --
    /// Link status copied from the connectivity supervisor.
    pub link: LinkStatus,
    /// A completed scan waiting to be picked up.
    pub pending_request: Option<AccessRequest>,
    /// The assembler holds part of a code.
    pub scan_in_progress: bool,
    /// A validation verdict, consumed exactly once with `take()`.
    pub outcome: Option<ValidationOutcome>,
    /// Debounced manual-trigger edge for this tick.
    pub trigger: bool,
    /// Operator asked to clear a latched fault.
    pub clear_fault: bool,

    // -- Attempt bookkeeping --
    /// Request being validated; kept across retries.
    pub active_request: Option<AccessRequest>,
    /// Transient validation failures in a row.
    pub consecutive_failures: u8,
    /// Set while in `Error`.
    pub error_kind: Option<ErrorKind>,
    /// Reason text of the most recent denial.
    pub denial_reason: Option<String>,

    // -- Side-effect requests (consumed by the service after each tick) --
    /// Feedback to apply.
    pub feedback: Option<FeedbackCommand>,
    /// Start a validation exchange for `active_request`.
    pub issue_validation: bool,
    /// Drop whatever exchange is in flight.
    pub abandon_validation: bool,

    // -- Configuration --
    pub config: SystemConfig,
}

impl FsmContext {
    /// Create a new context with the given configuration.
    pub fn new(config: SystemConfig) -> Self {
        Self {
            now_ms: 0,
            state_entered_ms: 0,
            state_deadline_ms: None,
            ticks_in_state: 0,
            total_ticks: 0,
            link: LinkStatus::default(),
            pending_request: None,
            scan_in_progress: false,
            outcome: None,
            trigger: false,
            clear_fault: false,
            active_request: None,
            consecutive_failures: 0,
            error_kind: None,
            denial_reason: None,
            feedback: None,
            issue_validation: false,
            abandon_validation: false,
            config,
        }
    }

    /// Milliseconds since the current state was entered.
    pub fn ms_in_state(&self) -> u64 {
        self.now_ms.saturating_sub(self.state_entered_ms)
    }

    /// Arm the state deadline `duration_ms` from now.
    pub fn arm_deadline(&mut self, duration_ms: u32) {
        self.state_deadline_ms = Some(self.now_ms + u64::from(duration_ms));
    }

    /// `true` once the armed deadline has been reached.
    pub fn deadline_elapsed(&self) -> bool {
        self.state_deadline_ms.is_some_and(|t| self.now_ms >= t)
    }

    /// Guard deadline for one validation attempt.
    pub fn validation_guard_ms(&self) -> u32 {
        self.config
            .http_timeout_ms
            .saturating_add(self.config.control_loop_interval_ms.saturating_mul(2))
    }
}
