//! Concrete state handler functions and table builder.
//!
//! Each state is defined by plain `fn` pointers: no closures, no dynamic
//! dispatch, no heap.  Handlers only read inputs from and write requests
//! to the [`FsmContext`].
//!
//! ```text
//!  IDLE ──[bytes]──▶ SCANNING ──[code]──▶ VALIDATING ──[granted]──▶ GRANTED
//!   │ ▲                 │                   │  │  ▲                   │
//!   │ └──[discarded]────┘                   │  └──┘ retry             │
//!   │ ▲                          [denied]   │                         │
//!   │ └───────[display done]──── DENIED ◀───┤                         │
//!   │ ▲                                     │ [retries out/malformed] │
//!   │ └──────[link back/cleared]── ERROR ◀──┘                         │
//!   │ ▲                                                               │
//!   │ └─────────────────────────[open time over]──────────────────────┘
//!   └──[button]──▶ TESTING ──[cycle done]──▶ IDLE
//! ```

use super::context::FsmContext;
use super::{ErrorKind, StateDescriptor, StateId};
use crate::app::ports::ValidationOutcome;
use crate::feedback::{
    BlinkRate, BuzzerCommand, Colour, FeedbackCommand, LightCommand, RelayCommand,
};
use log::{debug, info, warn};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        // Index 0: Idle
        StateDescriptor {
            id: StateId::Idle,
            name: "Idle",
            on_enter: Some(idle_enter),
            on_exit: None,
            on_update: idle_update,
        },
        // Index 1: Scanning
        StateDescriptor {
            id: StateId::Scanning,
            name: "Scanning",
            on_enter: None,
            on_exit: None,
            on_update: scanning_update,
        },
        // Index 2: Validating
        StateDescriptor {
            id: StateId::Validating,
            name: "Validating",
            on_enter: Some(validating_enter),
            on_exit: Some(validating_exit),
            on_update: validating_update,
        },
        // Index 3: Granted
        StateDescriptor {
            id: StateId::Granted,
            name: "Granted",
            on_enter: Some(granted_enter),
            on_exit: None,
            on_update: granted_update,
        },
        // Index 4: Denied
        StateDescriptor {
            id: StateId::Denied,
            name: "Denied",
            on_enter: Some(denied_enter),
            on_exit: None,
            on_update: denied_update,
        },
        // Index 5: Error
        StateDescriptor {
            id: StateId::Error,
            name: "Error",
            on_enter: Some(error_enter),
            on_exit: Some(error_exit),
            on_update: error_update,
        },
        // Index 6: Testing
        StateDescriptor {
            id: StateId::Testing,
            name: "Testing",
            on_enter: Some(testing_enter),
            on_exit: None,
            on_update: testing_update,
        },
    ]
}

fn success_tone(ctx: &FsmContext) -> BuzzerCommand {
    BuzzerCommand::Tone {
        freq_hz: ctx.config.tone_success_hz,
        duration_ms: ctx.config.tone_duration_ms,
    }
}

fn error_tone(ctx: &FsmContext) -> BuzzerCommand {
    BuzzerCommand::Tone {
        freq_hz: ctx.config.tone_error_hz,
        duration_ms: ctx.config.tone_duration_ms,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE state
// ═══════════════════════════════════════════════════════════════════════════

fn idle_enter(ctx: &mut FsmContext) {
    ctx.feedback = Some(FeedbackCommand::OFF);
    ctx.active_request = None;
    info!("IDLE: ready for scan");
}

fn idle_update(ctx: &mut FsmContext) -> Option<StateId> {
    if ctx.trigger {
        info!("IDLE: manual trigger, running actuator test");
        return Some(StateId::Testing);
    }

    if let Some(req) = ctx.pending_request.take() {
        ctx.active_request = Some(req);
        return Some(StateId::Validating);
    }

    if ctx.scan_in_progress {
        return Some(StateId::Scanning);
    }

    // Also covers the boot-time establishment deadline: the supervisor
    // reports the link as down since boot.
    let down_ms = ctx.link.down_for(ctx.now_ms);
    if down_ms >= u64::from(ctx.config.link_timeout_ms) {
        warn!("IDLE: link down for {down_ms} ms, suspending scans");
        ctx.error_kind = Some(ErrorKind::NetworkUnavailable);
        return Some(StateId::Error);
    }

    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  SCANNING state: a code is arriving byte by byte
// ═══════════════════════════════════════════════════════════════════════════

fn scanning_update(ctx: &mut FsmContext) -> Option<StateId> {
    if let Some(req) = ctx.pending_request.take() {
        ctx.active_request = Some(req);
        return Some(StateId::Validating);
    }

    if !ctx.scan_in_progress {
        debug!("SCANNING: buffer discarded, back to idle");
        return Some(StateId::Idle);
    }

    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  VALIDATING state: waiting on the backend
// ═══════════════════════════════════════════════════════════════════════════

fn validating_enter(ctx: &mut FsmContext) {
    ctx.feedback = Some(FeedbackCommand {
        lights: LightCommand::Blink {
            colour: Colour::Green,
            rate: BlinkRate::Processing,
        },
        buzzer: BuzzerCommand::Silent,
        relay: RelayCommand::Release,
    });
    issue_attempt(ctx);
    if let Some(req) = &ctx.active_request {
        info!(
            "VALIDATING: owner={} member={}",
            req.owner_id, req.member_id
        );
    }
}

fn validating_exit(ctx: &mut FsmContext) {
    ctx.abandon_validation = true;
    ctx.issue_validation = false;
    ctx.outcome = None;
}

fn validating_update(ctx: &mut FsmContext) -> Option<StateId> {
    // The orchestrator turns an elapsed attempt guard into a Timeout outcome.
    let outcome = ctx.outcome.take()?;

    match outcome {
        ValidationOutcome::Granted => {
            ctx.consecutive_failures = 0;
            Some(StateId::Granted)
        }
        ValidationOutcome::Denied { reason } => {
            ctx.consecutive_failures = 0;
            ctx.denial_reason = reason;
            Some(StateId::Denied)
        }
        ValidationOutcome::NetworkError | ValidationOutcome::Timeout => {
            ctx.consecutive_failures = ctx.consecutive_failures.saturating_add(1);
            if ctx.consecutive_failures < ctx.config.max_validation_attempts {
                warn!(
                    "VALIDATING: {} (attempt {}/{}), retrying",
                    outcome.label(),
                    ctx.consecutive_failures,
                    ctx.config.max_validation_attempts
                );
                issue_attempt(ctx);
                None
            } else {
                warn!(
                    "VALIDATING: {} after {} attempts, giving up",
                    outcome.label(),
                    ctx.consecutive_failures
                );
                ctx.error_kind = Some(ErrorKind::NetworkUnavailable);
                Some(StateId::Error)
            }
        }
        ValidationOutcome::MalformedResponse => {
            warn!("VALIDATING: backend response outside contract");
            ctx.error_kind = Some(ErrorKind::ProtocolFault);
            Some(StateId::Error)
        }
    }
}

fn issue_attempt(ctx: &mut FsmContext) {
    ctx.issue_validation = true;
    let guard = ctx.validation_guard_ms();
    ctx.arm_deadline(guard);
}

// ═══════════════════════════════════════════════════════════════════════════
//  GRANTED state: gate open
// ═══════════════════════════════════════════════════════════════════════════

fn granted_enter(ctx: &mut FsmContext) {
    let open_ms = ctx.config.clamp_relay_ms(ctx.config.access_open_ms);
    ctx.feedback = Some(FeedbackCommand {
        lights: LightCommand::GreenOn,
        buzzer: success_tone(ctx),
        relay: RelayCommand::Engage {
            duration_ms: ctx.config.access_open_ms,
        },
    });
    ctx.arm_deadline(open_ms);
    info!("GRANTED: gate open for {} ms", open_ms);
}

fn granted_update(ctx: &mut FsmContext) -> Option<StateId> {
    if ctx.deadline_elapsed() {
        ctx.consecutive_failures = 0;
        return Some(StateId::Idle);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  DENIED state
// ═══════════════════════════════════════════════════════════════════════════

fn denied_enter(ctx: &mut FsmContext) {
    ctx.feedback = Some(FeedbackCommand {
        lights: LightCommand::RedOn,
        buzzer: error_tone(ctx),
        relay: RelayCommand::Release,
    });
    ctx.arm_deadline(ctx.config.denied_display_ms);
    info!(
        "DENIED: reason={}",
        ctx.denial_reason.as_deref().unwrap_or("none")
    );
}

fn denied_update(ctx: &mut FsmContext) -> Option<StateId> {
    if ctx.deadline_elapsed() {
        return Some(StateId::Idle);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  ERROR state: scans ignored, relay held released
// ═══════════════════════════════════════════════════════════════════════════

fn error_enter(ctx: &mut FsmContext) {
    let kind = *ctx.error_kind.get_or_insert(ErrorKind::NetworkUnavailable);
    let lights = match kind {
        ErrorKind::NetworkUnavailable => LightCommand::Blink {
            colour: Colour::Red,
            rate: BlinkRate::Fast,
        },
        ErrorKind::ProtocolFault => LightCommand::AmberOn,
    };
    ctx.feedback = Some(FeedbackCommand {
        lights,
        buzzer: error_tone(ctx),
        relay: RelayCommand::Release,
    });
    ctx.active_request = None;
    warn!("ERROR: {:?}", kind);
}

fn error_exit(ctx: &mut FsmContext) {
    info!("ERROR: cleared, resuming normal operation");
    ctx.error_kind = None;
    ctx.consecutive_failures = 0;
    ctx.clear_fault = false;
}

fn error_update(ctx: &mut FsmContext) -> Option<StateId> {
    match ctx.error_kind {
        Some(ErrorKind::ProtocolFault) => {
            if ctx.clear_fault {
                return Some(StateId::Idle);
            }
        }
        _ => {
            if !ctx.link.connected {
                return None;
            }
            let restored_since_entry = ctx.link.last_change_ms > ctx.state_entered_ms;
            let stable_long_enough =
                ctx.ms_in_state() >= u64::from(ctx.config.network_error_hold_ms);
            if restored_since_entry || stable_long_enough {
                return Some(StateId::Idle);
            }
        }
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  TESTING state: operator actuator check, no network
// ═══════════════════════════════════════════════════════════════════════════

fn testing_enter(ctx: &mut FsmContext) {
    ctx.feedback = Some(FeedbackCommand {
        lights: LightCommand::GreenOn,
        buzzer: success_tone(ctx),
        relay: RelayCommand::Engage {
            duration_ms: ctx.config.test_relay_pulse_ms,
        },
    });
    ctx.arm_deadline(ctx.config.test_cycle_ms);
}

fn testing_update(ctx: &mut FsmContext) -> Option<StateId> {
    if ctx.deadline_elapsed() {
        return Some(StateId::Idle);
    }
    None
}
