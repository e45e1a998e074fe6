//! Application service: the hexagonal core.
//!
//! [`AccessController`] owns the FSM, the QR assembler, the feedback
//! controller and the shared context.  It exposes a hardware-agnostic API;
//! all I/O flows through port traits injected at call sites, so the whole
//! service is testable with mock adapters.
//!
//! ```text
//!  scanner bytes ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!  LinkStatus ─────▶ │    AccessController      │ ──▶ ActuatorPort
//!  AppCommand ─────▶ │ FSM · Assembler · Feedback│ ◀─▶ ValidationPort
//!                    └──────────────────────────┘
//! ```
//!
//! ## Tick sequence
//!
//! 1. latch the clock and link status
//! 2. expire a stale partial scan
//! 3. service the status report, poll the in-flight validation or time it
//!    out at the attempt guard
//! 4. run the FSM
//! 5. abandon / issue validation as requested by the handlers
//! 6. apply feedback, advance feedback timers
//! 7. periodic status report

use log::{debug, info, warn};

use crate::config::SystemConfig;
use crate::connectivity::LinkStatus;
use crate::diagnostics::{AccessCounters, StatusReport};
use crate::feedback::FeedbackController;
use crate::fsm::context::FsmContext;
use crate::fsm::states::build_state_table;
use crate::fsm::{DeviceState, Fsm, StateId};
use crate::scanner::QrAssembler;

use super::commands::AppCommand;
use super::events::{AppEvent, ScanRejection};
use super::ports::{ActuatorPort, EventSink, ValidationOutcome, ValidationPort};

// ───────────────────────────────────────────────────────────────
// AccessController
// ───────────────────────────────────────────────────────────────

/// The access controller orchestrates all domain logic.
pub struct AccessController {
    fsm: Fsm,
    ctx: FsmContext,
    assembler: QrAssembler,
    feedback: FeedbackController,
    counters: AccessCounters,
    device_id: heapless::String<16>,
    tick_count: u64,
    next_status_at: u64,
}

impl AccessController {
    /// Construct the service from configuration.
    ///
    /// Does **not** start the FSM; call [`start`](Self::start) next.
    pub fn new(config: SystemConfig, device_id: &str) -> Self {
        let assembler = QrAssembler::new(&config);
        let feedback = FeedbackController::new(&config);
        let ctx = FsmContext::new(config);
        let fsm = Fsm::new(build_state_table(), StateId::Idle);

        Self {
            fsm,
            ctx,
            assembler,
            feedback,
            counters: AccessCounters::default(),
            device_id: crate::config::truncated(device_id),
            tick_count: 0,
            next_status_at: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Enter the initial state (Idle) and drive its outputs.
    pub fn start(&mut self, now_ms: u64, hw: &mut impl ActuatorPort, sink: &mut impl EventSink) {
        self.ctx.now_ms = now_ms;
        self.ctx.link = LinkStatus {
            connected: false,
            last_change_ms: now_ms,
        };
        self.fsm.start(&mut self.ctx);
        self.apply_feedback(now_ms, hw);
        self.next_status_at = now_ms + u64::from(self.ctx.config.status_interval_ms);
        sink.emit(&AppEvent::Started(self.fsm.current_state()));
        info!(
            "AccessController {} started in {:?}",
            self.device_id,
            self.fsm.current_state()
        );
    }

    // ── Inputs ────────────────────────────────────────────────

    /// Feed one byte from the scanner UART.
    pub fn push_scanner_byte(&mut self, byte: u8, now_ms: u64, sink: &mut impl EventSink) {
        let failures_before = self.assembler.failure_count();
        let request = self.assembler.push(byte, now_ms);

        if self.assembler.failure_count() != failures_before {
            self.counters.record_parse_failure();
            if let Some(e) = self.assembler.last_error() {
                sink.emit(&AppEvent::ScanRejected(ScanRejection::Malformed(e)));
            }
        }

        let Some(request) = request else {
            return;
        };

        let state = self.fsm.current_state();
        if state.accepts_scans() && self.ctx.pending_request.is_none() {
            debug!(
                "SCAN: owner={} member={}",
                request.owner_id, request.member_id
            );
            self.ctx.pending_request = Some(request);
        } else {
            info!("SCAN: ignored in {}", state.label());
            sink.emit(&AppEvent::ScanRejected(ScanRejection::Busy(state)));
        }
    }

    /// Process an external command (manual button, debug console).
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        now_ms: u64,
        hw: &mut impl ActuatorPort,
        sink: &mut impl EventSink,
    ) {
        match cmd {
            AppCommand::ManualTrigger => {
                if self.fsm.current_state() == StateId::Idle {
                    self.ctx.trigger = true;
                } else {
                    debug!(
                        "Manual trigger ignored in {}",
                        self.fsm.current_state().label()
                    );
                }
            }
            AppCommand::ClearFault => {
                if self.fsm.current_state() == StateId::Error {
                    info!("Fault clear requested");
                    self.ctx.clear_fault = true;
                }
            }
            AppCommand::ForceState(target) => {
                self.ctx.now_ms = now_ms;
                if let Some((from, to)) = self.fsm.force_transition(target, &mut self.ctx) {
                    self.on_transition(from, to, sink);
                    self.apply_feedback(now_ms, hw);
                }
            }
        }
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one control cycle.
    pub fn tick(
        &mut self,
        now_ms: u64,
        link: LinkStatus,
        hw: &mut impl ActuatorPort,
        backend: &mut impl ValidationPort,
        sink: &mut impl EventSink,
    ) {
        self.tick_count += 1;

        // 1. Clock and link
        self.ctx.now_ms = now_ms;
        if link.connected != self.ctx.link.connected {
            sink.emit(&AppEvent::LinkChanged(link));
        }
        self.ctx.link = link;

        // 2. Scanner housekeeping
        self.assembler.expire_stale(now_ms);
        self.ctx.scan_in_progress = self.assembler.has_partial();

        // 3. Backend
        if self.ctx.abandon_validation {
            self.ctx.abandon_validation = false;
            backend.abandon();
        }
        backend.service(now_ms);
        if self.fsm.current_state() == StateId::Validating && self.ctx.outcome.is_none() {
            if let Some(outcome) = backend.poll(now_ms) {
                self.resolve(outcome, sink);
            } else if self.ctx.deadline_elapsed() {
                warn!("Attempt guard deadline passed, abandoning exchange");
                backend.abandon();
                self.resolve(ValidationOutcome::Timeout, sink);
            }
        }

        // 4. FSM
        let transition = self.fsm.tick(&mut self.ctx);
        self.ctx.trigger = false;
        self.ctx.clear_fault = false;
        if let Some((from, to)) = transition {
            self.on_transition(from, to, sink);
        }

        // 5. Validation requests from the handlers
        if self.ctx.abandon_validation {
            self.ctx.abandon_validation = false;
            backend.abandon();
        }
        if self.ctx.issue_validation {
            self.ctx.issue_validation = false;
            self.issue_validation(now_ms, backend, sink);
        }

        // 6. Outputs
        self.apply_feedback(now_ms, hw);
        self.feedback.tick(now_ms, hw);

        // 7. Health report
        if now_ms >= self.next_status_at {
            let report = self.build_status_report(now_ms);
            backend.report_status(&report, now_ms);
            sink.emit(&AppEvent::StatusReported {
                linked: report.linked,
                state: self.fsm.current_state(),
            });
            self.next_status_at = now_ms + u64::from(self.ctx.config.status_interval_ms);
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Current FSM state.
    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    /// FSM state plus error kind.
    pub fn device_state(&self) -> DeviceState {
        DeviceState::from_parts(self.fsm.current_state(), self.ctx.error_kind)
    }

    pub fn consecutive_failures(&self) -> u8 {
        self.ctx.consecutive_failures
    }

    pub fn counters(&self) -> &AccessCounters {
        &self.counters
    }

    pub fn feedback(&self) -> &FeedbackController {
        &self.feedback
    }

    pub fn assembler(&self) -> &QrAssembler {
        &self.assembler
    }

    /// Total control ticks executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn config(&self) -> &SystemConfig {
        &self.ctx.config
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Snapshot for the status endpoint.
    pub fn build_status_report(&self, now_ms: u64) -> StatusReport {
        StatusReport {
            device_id: self.device_id.clone(),
            linked: self.ctx.link.connected,
            uptime_ms: now_ms,
            state: self.fsm.current_state().label(),
            counters: self.counters,
        }
    }

    // ── Internal ──────────────────────────────────────────────

    fn attempt_number(&self) -> u8 {
        self.ctx.consecutive_failures.saturating_add(1)
    }

    /// Hand a verdict to the FSM (consumed on the next FSM tick).
    fn resolve(&mut self, outcome: ValidationOutcome, sink: &mut impl EventSink) {
        self.counters.record_outcome(&outcome);
        sink.emit(&AppEvent::ValidationResolved {
            outcome: outcome.clone(),
            attempt: self.attempt_number(),
        });
        self.ctx.outcome = Some(outcome);
    }

    fn issue_validation(
        &mut self,
        now_ms: u64,
        backend: &mut impl ValidationPort,
        sink: &mut impl EventSink,
    ) {
        let Some(request) = self.ctx.active_request.clone() else {
            warn!("Validation requested with no active request");
            return;
        };

        if !self.ctx.link.connected {
            debug!("Link down, failing attempt without contacting backend");
            self.resolve(ValidationOutcome::NetworkError, sink);
            return;
        }

        match backend.start(&request, now_ms) {
            Ok(()) => sink.emit(&AppEvent::ValidationStarted {
                member_id: request.member_id,
                attempt: self.attempt_number(),
            }),
            Err(e) => {
                warn!("Validation not started: {e}");
                self.resolve(ValidationOutcome::NetworkError, sink);
            }
        }
    }

    fn on_transition(&mut self, from: StateId, to: StateId, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::StateChanged { from, to });

        match to {
            StateId::Granted => {
                if let Some(req) = &self.ctx.active_request {
                    sink.emit(&AppEvent::AccessGranted {
                        owner_id: req.owner_id.clone(),
                        member_id: req.member_id.clone(),
                    });
                }
            }
            StateId::Denied => {
                if let Some(req) = &self.ctx.active_request {
                    sink.emit(&AppEvent::AccessDenied {
                        member_id: req.member_id.clone(),
                        reason: self.ctx.denial_reason.clone(),
                    });
                }
            }
            StateId::Testing => self.counters.record_test_cycle(),
            _ => {}
        }
    }

    fn apply_feedback(&mut self, now_ms: u64, hw: &mut impl ActuatorPort) {
        if let Some(cmd) = self.ctx.feedback.take() {
            if self.feedback.apply(cmd, now_ms, hw).is_some() {
                self.counters.record_relay_clamp();
            }
        }
    }
}
