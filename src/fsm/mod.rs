//! Function-pointer finite state machine engine.
//!
//! Classic embedded FSM pattern in Rust:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  StateTable                                                 │
//! │  ┌────────────┬───────────┬──────────┬───────────────────┐  │
//! │  │ StateId    │ on_enter  │ on_exit  │ on_update         │  │
//! │  ├────────────┼───────────┼──────────┼───────────────────┤  │
//! │  │ Idle       │ fn(ctx)   │          │ fn(ctx)->Option<> │  │
//! │  │ Scanning   │           │          │ fn(ctx)->Option<> │  │
//! │  │ Validating │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> │  │
//! │  │ Granted    │ fn(ctx)   │          │ fn(ctx)->Option<> │  │
//! │  │ Denied     │ fn(ctx)   │          │ fn(ctx)->Option<> │  │
//! │  │ Error      │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> │  │
//! │  │ Testing    │ fn(ctx)   │          │ fn(ctx)->Option<> │  │
//! │  └────────────┴───────────┴──────────┴───────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine calls `on_update` for the **current** state.
//! If it returns `Some(next_id)`, the engine runs `on_exit` for the
//! current state, then `on_enter` for the next, and updates the
//! current pointer.  All functions receive `&mut FsmContext`, which
//! carries the tick clock, the inputs gathered by the service, and the
//! side-effect requests the service executes after the tick.

pub mod context;
pub mod states;

use context::FsmContext;
use log::info;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Enumeration of all possible controller states.
/// Must stay in sync with the state table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StateId {
    Idle = 0,
    Scanning = 1,
    Validating = 2,
    Granted = 3,
    Denied = 4,
    Error = 5,
    Testing = 6,
}

impl StateId {
    /// Total number of states, used to size the table array.
    pub const COUNT: usize = 7;

    /// Convert an index back to `StateId`.  Panics on out-of-range in
    /// debug builds; returns `Error` in release.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Idle,
            1 => Self::Scanning,
            2 => Self::Validating,
            3 => Self::Granted,
            4 => Self::Denied,
            5 => Self::Error,
            6 => Self::Testing,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Error
            }
        }
    }

    /// Upper-case label used in logs and status reports.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Scanning => "SCANNING",
            Self::Validating => "VALIDATING",
            Self::Granted => "GRANTED",
            Self::Denied => "DENIED",
            Self::Error => "ERROR",
            Self::Testing => "TESTING",
        }
    }

    /// States in which a completed scan starts an access attempt.
    pub const fn accepts_scans(self) -> bool {
        matches!(self, Self::Idle | Self::Scanning)
    }
}

/// Why the controller is in `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Link down too long, or validation retries exhausted.
    NetworkUnavailable,
    /// The backend violated its contract.  Cleared only by an operator.
    ProtocolFault,
}

/// Externally visible device state: the FSM state plus the error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Idle,
    Scanning,
    Validating,
    Granted,
    Denied,
    Error(ErrorKind),
    Testing,
}

impl DeviceState {
    pub fn from_parts(state: StateId, kind: Option<ErrorKind>) -> Self {
        match state {
            StateId::Idle => Self::Idle,
            StateId::Scanning => Self::Scanning,
            StateId::Validating => Self::Validating,
            StateId::Granted => Self::Granted,
            StateId::Denied => Self::Denied,
            StateId::Error => Self::Error(kind.unwrap_or(ErrorKind::NetworkUnavailable)),
            StateId::Testing => Self::Testing,
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
/// These run exactly once on each state transition.
pub type StateActionFn = fn(&mut FsmContext);

/// Signature for the per-tick update handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type StateUpdateFn = fn(&mut FsmContext) -> Option<StateId>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single FSM state.
/// Stored in a fixed-size array: no heap, no `dyn`.
pub struct StateDescriptor {
    pub id: StateId,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// The finite state machine engine.
///
/// Owns the state table (array of [`StateDescriptor`]) and threads a
/// mutable [`FsmContext`] through every handler call.
pub struct Fsm {
    /// Fixed-size table indexed by `StateId as usize`.
    table: [StateDescriptor; StateId::COUNT],
    /// Index of the currently active state.
    current: usize,
    /// Monotonically increasing tick counter.
    tick_count: u64,
    /// Tick at which the current state was entered.
    state_entry_tick: u64,
}

impl Fsm {
    /// Construct a new FSM with the given state table, starting in `initial`.
    pub fn new(table: [StateDescriptor; StateId::COUNT], initial: StateId) -> Self {
        Self {
            table,
            current: initial as usize,
            tick_count: 0,
            state_entry_tick: 0,
        }
    }

    /// Run the initial `on_enter` for the starting state.
    /// Call once after construction, before the first `tick()`.
    pub fn start(&mut self, ctx: &mut FsmContext) {
        info!("FSM starting in state: {}", self.table[self.current].name);
        ctx.state_entered_ms = ctx.now_ms;
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Advance the FSM by one tick.
    ///
    /// 1. Call `on_update` for the current state.
    /// 2. If it returns `Some(next)`, execute the transition:
    ///    `on_exit(current)` → update pointer → `on_enter(next)`.
    ///
    /// Returns the `(from, to)` pair when a transition happened.
    pub fn tick(&mut self, ctx: &mut FsmContext) -> Option<(StateId, StateId)> {
        self.tick_count += 1;
        ctx.ticks_in_state = self.tick_count - self.state_entry_tick;
        ctx.total_ticks = self.tick_count;

        let next = (self.table[self.current].on_update)(ctx)?;
        let from = self.current_state();
        self.transition(next, ctx);
        Some((from, next))
    }

    /// Force an immediate transition regardless of what `on_update` would
    /// return.  A no-op when already in `next`.
    pub fn force_transition(
        &mut self,
        next: StateId,
        ctx: &mut FsmContext,
    ) -> Option<(StateId, StateId)> {
        if next as usize == self.current {
            return None;
        }
        let from = self.current_state();
        self.transition(next, ctx);
        Some((from, next))
    }

    /// The current state's identity.
    pub fn current_state(&self) -> StateId {
        StateId::from_index(self.current)
    }

    /// How many ticks the FSM has been in the current state.
    pub fn ticks_in_current_state(&self) -> u64 {
        self.tick_count - self.state_entry_tick
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: StateId, ctx: &mut FsmContext) {
        let next_idx = next_id as usize;

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        self.state_entry_tick = self.tick_count;
        ctx.ticks_in_state = 0;
        ctx.state_entered_ms = ctx.now_ms;
        ctx.state_deadline_ms = None;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::context::FsmContext;
    use super::*;
    use crate::app::ports::ValidationOutcome;
    use crate::config::SystemConfig;
    use crate::connectivity::LinkStatus;
    use crate::feedback::{LightCommand, RelayCommand};
    use crate::scanner::AccessRequest;

    fn make_ctx() -> FsmContext {
        let mut ctx = FsmContext::new(SystemConfig::default());
        ctx.link = LinkStatus {
            connected: true,
            last_change_ms: 0,
        };
        ctx
    }

    fn make_fsm() -> Fsm {
        Fsm::new(states::build_state_table(), StateId::Idle)
    }

    fn request() -> AccessRequest {
        AccessRequest {
            owner_id: "GYM42".into(),
            member_id: "MEM7".into(),
            received_at_ms: 0,
        }
    }

    fn started() -> (Fsm, FsmContext) {
        let mut fsm = make_fsm();
        let mut ctx = make_ctx();
        fsm.start(&mut ctx);
        (fsm, ctx)
    }

    fn to_validating(fsm: &mut Fsm, ctx: &mut FsmContext) {
        ctx.pending_request = Some(request());
        fsm.tick(ctx);
        assert_eq!(fsm.current_state(), StateId::Validating);
        ctx.issue_validation = false;
    }

    #[test]
    fn starts_in_idle_with_outputs_off() {
        let (fsm, ctx) = started();
        assert_eq!(fsm.current_state(), StateId::Idle);
        let fb = ctx.feedback.unwrap();
        assert_eq!(fb.lights, LightCommand::Off);
        assert_eq!(fb.relay, RelayCommand::Release);
    }

    #[test]
    fn tick_increments_counter() {
        let (mut fsm, mut ctx) = started();
        fsm.tick(&mut ctx);
        assert_eq!(fsm.ticks_in_current_state(), 1);
        fsm.tick(&mut ctx);
        assert_eq!(fsm.ticks_in_current_state(), 2);
    }

    #[test]
    fn request_moves_idle_to_validating_and_issues_call() {
        let (mut fsm, mut ctx) = started();
        ctx.pending_request = Some(request());
        let t = fsm.tick(&mut ctx);
        assert_eq!(t, Some((StateId::Idle, StateId::Validating)));
        assert!(ctx.issue_validation);
        assert!(ctx.pending_request.is_none());
        assert_eq!(ctx.active_request.as_ref().unwrap().member_id, "MEM7");
    }

    #[test]
    fn partial_scan_moves_idle_to_scanning_and_back() {
        let (mut fsm, mut ctx) = started();
        ctx.scan_in_progress = true;
        fsm.tick(&mut ctx);
        assert_eq!(fsm.current_state(), StateId::Scanning);
        ctx.scan_in_progress = false;
        fsm.tick(&mut ctx);
        assert_eq!(fsm.current_state(), StateId::Idle);
    }

    #[test]
    fn granted_outcome_engages_relay() {
        let (mut fsm, mut ctx) = started();
        to_validating(&mut fsm, &mut ctx);
        ctx.outcome = Some(ValidationOutcome::Granted);
        fsm.tick(&mut ctx);
        assert_eq!(fsm.current_state(), StateId::Granted);
        assert_eq!(
            ctx.feedback.unwrap().relay,
            RelayCommand::Engage {
                duration_ms: ctx.config.access_open_ms
            }
        );
        assert!(ctx.abandon_validation);
    }

    #[test]
    fn granted_returns_to_idle_at_deadline() {
        let (mut fsm, mut ctx) = started();
        to_validating(&mut fsm, &mut ctx);
        ctx.consecutive_failures = 1;
        ctx.outcome = Some(ValidationOutcome::Granted);
        fsm.tick(&mut ctx);

        let open = u64::from(ctx.config.access_open_ms);
        ctx.now_ms += open - 1;
        fsm.tick(&mut ctx);
        assert_eq!(fsm.current_state(), StateId::Granted);
        ctx.now_ms += 1;
        fsm.tick(&mut ctx);
        assert_eq!(fsm.current_state(), StateId::Idle);
        assert_eq!(ctx.consecutive_failures, 0);
    }

    #[test]
    fn denied_outcome_never_engages_relay() {
        let (mut fsm, mut ctx) = started();
        to_validating(&mut fsm, &mut ctx);
        ctx.outcome = Some(ValidationOutcome::Denied {
            reason: Some("expired".into()),
        });
        fsm.tick(&mut ctx);
        assert_eq!(fsm.current_state(), StateId::Denied);
        let fb = ctx.feedback.unwrap();
        assert_eq!(fb.relay, RelayCommand::Release);
        assert_eq!(fb.lights, LightCommand::RedOn);
        assert_eq!(ctx.denial_reason.as_deref(), Some("expired"));
    }

    #[test]
    fn transient_failure_reissues_until_ceiling() {
        let (mut fsm, mut ctx) = started();
        to_validating(&mut fsm, &mut ctx);
        let max = ctx.config.max_validation_attempts;
        for attempt in 1..max {
            ctx.outcome = Some(ValidationOutcome::Timeout);
            fsm.tick(&mut ctx);
            assert_eq!(fsm.current_state(), StateId::Validating);
            assert_eq!(ctx.consecutive_failures, attempt);
            assert!(ctx.issue_validation);
            ctx.issue_validation = false;
        }
        ctx.outcome = Some(ValidationOutcome::NetworkError);
        fsm.tick(&mut ctx);
        assert_eq!(fsm.current_state(), StateId::Error);
        assert_eq!(ctx.error_kind, Some(ErrorKind::NetworkUnavailable));
    }

    #[test]
    fn validating_waits_for_an_outcome_past_the_guard() {
        let (mut fsm, mut ctx) = started();
        to_validating(&mut fsm, &mut ctx);
        let guard = ctx.state_deadline_ms.unwrap();
        assert_eq!(guard, ctx.now_ms + u64::from(ctx.validation_guard_ms()));

        ctx.now_ms = guard + 50;
        fsm.tick(&mut ctx);
        assert_eq!(fsm.current_state(), StateId::Validating);
        assert_eq!(ctx.consecutive_failures, 0);

        ctx.outcome = Some(ValidationOutcome::Timeout);
        fsm.tick(&mut ctx);
        assert_eq!(ctx.consecutive_failures, 1);
        assert!(ctx.issue_validation);
        assert_eq!(
            ctx.state_deadline_ms,
            Some(ctx.now_ms + u64::from(ctx.validation_guard_ms()))
        );
    }

    #[test]
    fn malformed_response_is_protocol_fault_without_retry() {
        let (mut fsm, mut ctx) = started();
        to_validating(&mut fsm, &mut ctx);
        ctx.outcome = Some(ValidationOutcome::MalformedResponse);
        fsm.tick(&mut ctx);
        assert_eq!(fsm.current_state(), StateId::Error);
        assert_eq!(ctx.error_kind, Some(ErrorKind::ProtocolFault));
        assert!(!ctx.issue_validation);
        assert_eq!(ctx.feedback.unwrap().lights, LightCommand::AmberOn);
    }

    #[test]
    fn protocol_fault_waits_for_clear() {
        let (mut fsm, mut ctx) = started();
        ctx.error_kind = Some(ErrorKind::ProtocolFault);
        fsm.force_transition(StateId::Error, &mut ctx);
        for _ in 0..10 {
            ctx.now_ms += 10_000;
            fsm.tick(&mut ctx);
        }
        assert_eq!(fsm.current_state(), StateId::Error);
        ctx.clear_fault = true;
        fsm.tick(&mut ctx);
        assert_eq!(fsm.current_state(), StateId::Idle);
    }

    #[test]
    fn network_error_clears_on_restore_edge() {
        let (mut fsm, mut ctx) = started();
        ctx.now_ms = 1_000;
        ctx.link = LinkStatus {
            connected: false,
            last_change_ms: 500,
        };
        ctx.error_kind = Some(ErrorKind::NetworkUnavailable);
        fsm.force_transition(StateId::Error, &mut ctx);
        ctx.consecutive_failures = 3;

        ctx.now_ms = 2_000;
        fsm.tick(&mut ctx);
        assert_eq!(fsm.current_state(), StateId::Error);

        ctx.link = LinkStatus {
            connected: true,
            last_change_ms: 2_000,
        };
        fsm.tick(&mut ctx);
        assert_eq!(fsm.current_state(), StateId::Idle);
        assert_eq!(ctx.consecutive_failures, 0);
    }

    #[test]
    fn network_error_with_link_up_clears_after_hold() {
        let (mut fsm, mut ctx) = started();
        ctx.now_ms = 1_000;
        ctx.error_kind = Some(ErrorKind::NetworkUnavailable);
        fsm.force_transition(StateId::Error, &mut ctx);

        let hold = u64::from(ctx.config.network_error_hold_ms);
        ctx.now_ms = 1_000 + hold - 1;
        fsm.tick(&mut ctx);
        assert_eq!(fsm.current_state(), StateId::Error);
        ctx.now_ms = 1_000 + hold;
        fsm.tick(&mut ctx);
        assert_eq!(fsm.current_state(), StateId::Idle);
    }

    #[test]
    fn idle_enters_error_after_link_timeout() {
        let (mut fsm, mut ctx) = started();
        ctx.link = LinkStatus {
            connected: false,
            last_change_ms: 0,
        };
        ctx.now_ms = u64::from(ctx.config.link_timeout_ms) - 1;
        fsm.tick(&mut ctx);
        assert_eq!(fsm.current_state(), StateId::Idle);
        ctx.now_ms += 1;
        fsm.tick(&mut ctx);
        assert_eq!(fsm.current_state(), StateId::Error);
        assert_eq!(ctx.error_kind, Some(ErrorKind::NetworkUnavailable));
    }

    #[test]
    fn trigger_runs_testing_cycle() {
        let (mut fsm, mut ctx) = started();
        ctx.trigger = true;
        fsm.tick(&mut ctx);
        assert_eq!(fsm.current_state(), StateId::Testing);
        assert_eq!(
            ctx.feedback.unwrap().relay,
            RelayCommand::Engage {
                duration_ms: ctx.config.test_relay_pulse_ms
            }
        );
        ctx.trigger = false;
        ctx.now_ms += u64::from(ctx.config.test_cycle_ms);
        fsm.tick(&mut ctx);
        assert_eq!(fsm.current_state(), StateId::Idle);
    }

    #[test]
    fn trigger_ignored_outside_idle() {
        let (mut fsm, mut ctx) = started();
        to_validating(&mut fsm, &mut ctx);
        ctx.trigger = true;
        fsm.tick(&mut ctx);
        assert_eq!(fsm.current_state(), StateId::Validating);
    }

    #[test]
    fn force_transition_same_state_is_noop() {
        let (mut fsm, mut ctx) = started();
        assert!(fsm.force_transition(StateId::Idle, &mut ctx).is_none());
    }

    #[test]
    fn state_id_from_index_roundtrip() {
        for i in 0..StateId::COUNT {
            let id = StateId::from_index(i);
            assert_eq!(id as usize, i);
        }
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn state_id_from_invalid_index_returns_error() {
        let id = StateId::from_index(99);
        assert_eq!(id, StateId::Error);
    }
}
