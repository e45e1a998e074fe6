//! Mock adapters for integration tests.
//!
//! Records every actuator call with the tick time it happened at, so tests
//! can assert on relay windows and indicator history without touching real
//! GPIO/PWM registers.

use std::collections::VecDeque;

use gymgate::app::events::AppEvent;
use gymgate::app::ports::{ActuatorPort, EventSink, ValidationOutcome, ValidationPort};
use gymgate::app::service::AccessController;
use gymgate::config::SystemConfig;
use gymgate::connectivity::LinkStatus;
use gymgate::diagnostics::StatusReport;
use gymgate::error::CommsError;
use gymgate::scanner::AccessRequest;

// ── Actuator call record ──────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorCall {
    SetLights { green: bool, red: bool },
    StartTone(u32),
    StopTone,
    SetRelay(bool),
}

// ── MockHardware ──────────────────────────────────────────────

#[derive(Default)]
pub struct MockHardware {
    /// Set by the rig before every controller call.
    pub now_ms: u64,
    pub calls: Vec<(u64, ActuatorCall)>,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn relay_engaged(&self) -> bool {
        self.calls
            .iter()
            .rev()
            .find_map(|(_, c)| match c {
                ActuatorCall::SetRelay(on) => Some(*on),
                _ => None,
            })
            .unwrap_or(false)
    }

    /// Every `(on_at, off_at)` interval the relay was energised for.
    /// A still-open window ends at `None`.
    pub fn relay_windows(&self) -> Vec<(u64, Option<u64>)> {
        let mut windows = Vec::new();
        let mut open: Option<u64> = None;
        for (t, c) in &self.calls {
            match (c, open) {
                (ActuatorCall::SetRelay(true), None) => open = Some(*t),
                (ActuatorCall::SetRelay(false), Some(on)) => {
                    windows.push((on, Some(*t)));
                    open = None;
                }
                _ => {}
            }
        }
        if let Some(on) = open {
            windows.push((on, None));
        }
        windows
    }

    pub fn lights(&self) -> (bool, bool) {
        self.calls
            .iter()
            .rev()
            .find_map(|(_, c)| match c {
                ActuatorCall::SetLights { green, red } => Some((*green, *red)),
                _ => None,
            })
            .unwrap_or((false, false))
    }

    pub fn tones(&self) -> Vec<u32> {
        self.calls
            .iter()
            .filter_map(|(_, c)| match c {
                ActuatorCall::StartTone(hz) => Some(*hz),
                _ => None,
            })
            .collect()
    }

    pub fn ever_lit(&self, green: bool, red: bool) -> bool {
        self.calls
            .iter()
            .any(|(_, c)| *c == ActuatorCall::SetLights { green, red })
    }
}

impl ActuatorPort for MockHardware {
    fn set_lights(&mut self, green: bool, red: bool) {
        self.calls
            .push((self.now_ms, ActuatorCall::SetLights { green, red }));
    }

    fn start_tone(&mut self, freq_hz: u32) {
        self.calls.push((self.now_ms, ActuatorCall::StartTone(freq_hz)));
    }

    fn stop_tone(&mut self) {
        self.calls.push((self.now_ms, ActuatorCall::StopTone));
    }

    fn set_relay(&mut self, engaged: bool) {
        self.calls.push((self.now_ms, ActuatorCall::SetRelay(engaged)));
    }
}

// ── ScriptedBackend ───────────────────────────────────────────

/// One scripted reply: `outcome` is delivered once `after_ms` has passed
/// since the exchange started.  `None` never answers.
#[derive(Debug, Clone)]
pub struct Reply {
    pub outcome: Option<ValidationOutcome>,
    pub after_ms: u64,
}

#[allow(dead_code)]
impl Reply {
    pub fn after(after_ms: u64, outcome: ValidationOutcome) -> Self {
        Self {
            outcome: Some(outcome),
            after_ms,
        }
    }

    pub fn silent() -> Self {
        Self {
            outcome: None,
            after_ms: 0,
        }
    }
}

#[derive(Default)]
pub struct ScriptedBackend {
    pub script: VecDeque<Reply>,
    pub started: Vec<AccessRequest>,
    pub reports: Vec<StatusReport>,
    pub abandons: u32,
    in_flight: Option<(u64, Reply)>,
}

#[allow(dead_code)]
impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, reply: Reply) {
        self.script.push_back(reply);
    }

    pub fn starts(&self) -> usize {
        self.started.len()
    }
}

impl ValidationPort for ScriptedBackend {
    fn start(&mut self, request: &AccessRequest, now_ms: u64) -> Result<(), CommsError> {
        self.started.push(request.clone());
        let reply = self.script.pop_front().unwrap_or_else(Reply::silent);
        self.in_flight = Some((now_ms, reply));
        Ok(())
    }

    fn poll(&mut self, now_ms: u64) -> Option<ValidationOutcome> {
        let (started_at, reply) = self.in_flight.as_ref()?;
        if now_ms < started_at + reply.after_ms {
            return None;
        }
        let outcome = reply.outcome.clone()?;
        self.in_flight = None;
        Some(outcome)
    }

    fn abandon(&mut self) {
        if self.in_flight.take().is_some() {
            self.abandons += 1;
        }
    }

    fn report_status(&mut self, report: &StatusReport, _now_ms: u64) {
        self.reports.push(report.clone());
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Rig: controller + mocks on a simulated clock ──────────────

pub struct Rig<B: ValidationPort = ScriptedBackend> {
    pub app: AccessController,
    pub hw: MockHardware,
    pub backend: B,
    pub sink: RecordingSink,
    pub now_ms: u64,
    pub link: LinkStatus,
    pub step_ms: u64,
}

impl Rig<ScriptedBackend> {
    pub fn new() -> Self {
        Self::with_backend(SystemConfig::default(), ScriptedBackend::new())
    }
}

#[allow(dead_code)]
impl<B: ValidationPort> Rig<B> {
    /// Started controller with the link up since t=0.
    pub fn with_backend(config: SystemConfig, backend: B) -> Self {
        let step_ms = u64::from(config.control_loop_interval_ms);
        let mut rig = Self {
            app: AccessController::new(config, "GG-TEST01"),
            hw: MockHardware::new(),
            backend,
            sink: RecordingSink::default(),
            now_ms: 0,
            link: LinkStatus {
                connected: true,
                last_change_ms: 0,
            },
            step_ms,
        };
        rig.app.start(0, &mut rig.hw, &mut rig.sink);
        rig
    }

    /// Feed a whole scanner frame at the current time.
    pub fn scan(&mut self, frame: &str) {
        for b in frame.bytes() {
            self.app.push_scanner_byte(b, self.now_ms, &mut self.sink);
        }
    }

    /// Advance one control period and tick.
    pub fn step(&mut self) {
        self.now_ms += self.step_ms;
        self.hw.now_ms = self.now_ms;
        self.app.tick(
            self.now_ms,
            self.link,
            &mut self.hw,
            &mut self.backend,
            &mut self.sink,
        );
    }

    pub fn run_for(&mut self, ms: u64) {
        let until = self.now_ms + ms;
        while self.now_ms < until {
            self.step();
        }
    }

    /// Step until `pred` holds or `limit_ms` passes.  Returns whether it held.
    pub fn run_until(&mut self, limit_ms: u64, pred: impl Fn(&Self) -> bool) -> bool {
        let until = self.now_ms + limit_ms;
        while self.now_ms < until {
            self.step();
            if pred(self) {
                return true;
            }
        }
        false
    }

    pub fn set_link(&mut self, connected: bool) {
        if connected != self.link.connected {
            self.link = LinkStatus {
                connected,
                last_change_ms: self.now_ms,
            };
        }
    }
}
