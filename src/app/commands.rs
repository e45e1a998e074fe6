//! Inbound commands to the application service.
//!
//! These represent actions requested by the outside world (the manual
//! button, a debug console) that the
//! [`AccessController`](super::service::AccessController) interprets and
//! acts upon.

use crate::fsm::StateId;

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    /// Debounced press of the manual test button.  Runs the actuator test
    /// sequence when idle; ignored otherwise.
    ManualTrigger,

    /// Operator acknowledgement of a latched protocol fault (long press).
    ClearFault,

    /// Force the FSM into a specific state (debug / testing only).
    ForceState(StateId),
}
