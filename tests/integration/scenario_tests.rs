//! End-to-end access scenarios: scanner bytes in, relay/lights/buzzer out,
//! with a scripted backend and a simulated 10 ms control clock.

use gymgate::app::commands::AppCommand;
use gymgate::app::events::{AppEvent, ScanRejection};
use gymgate::app::ports::ValidationOutcome;
use gymgate::config::SystemConfig;
use gymgate::error::ParseError;
use gymgate::fsm::{DeviceState, ErrorKind, StateId};

use crate::mock_hw::{ActuatorCall, Reply, Rig, ScriptedBackend};

fn denied(reason: &str) -> ValidationOutcome {
    ValidationOutcome::Denied {
        reason: Some(reason.to_string()),
    }
}

// ── Granted ───────────────────────────────────────────────────

#[test]
fn granted_scan_opens_gate_for_configured_time() {
    let mut rig = Rig::new();
    rig.backend
        .push(Reply::after(50, ValidationOutcome::Granted));

    rig.scan("GYM42:MEM7\n");
    assert!(rig.run_until(200, |r| r.app.state() == StateId::Granted));

    let sent = &rig.backend.started[0];
    assert_eq!(sent.owner_id, "GYM42");
    assert_eq!(sent.member_id, "MEM7");
    assert!(rig.hw.relay_engaged());
    assert_eq!(rig.hw.lights(), (true, false));
    assert_eq!(rig.hw.tones(), vec![1_000]);

    assert!(rig.run_until(11_000, |r| r.app.state() == StateId::Idle));
    let windows = rig.hw.relay_windows();
    assert_eq!(windows.len(), 1);
    let (on, off) = windows[0];
    assert_eq!(off.map(|off| off - on), Some(10_000));
    assert_eq!(rig.hw.lights(), (false, false));
    assert_eq!(rig.app.counters().granted, 1);
    assert_eq!(
        rig.sink.count(|e| matches!(e, AppEvent::AccessGranted { member_id, .. } if member_id == "MEM7")),
        1
    );
}

#[test]
fn processing_indication_blinks_while_validating() {
    let mut rig = Rig::new();
    rig.backend
        .push(Reply::after(1_000, ValidationOutcome::Granted));

    rig.scan("GYM42:MEM7\n");
    rig.run_for(500);
    assert_eq!(rig.app.state(), StateId::Validating);
    assert!(!rig.hw.relay_engaged());
    let toggles = rig
        .hw
        .calls
        .iter()
        .filter(|(t, c)| {
            *t > 10 && matches!(c, ActuatorCall::SetLights { .. })
        })
        .count();
    assert!(toggles >= 2, "expected a blinking indicator, saw {toggles} changes");
}

// ── Denied ────────────────────────────────────────────────────

#[test]
fn denied_scan_shows_red_and_never_opens() {
    let mut rig = Rig::new();
    rig.backend.push(Reply::after(50, denied("expired")));

    rig.scan("GYM42:MEM7\n");
    assert!(rig.run_until(200, |r| r.app.state() == StateId::Denied));
    let entered = rig.now_ms;

    assert_eq!(rig.hw.lights(), (false, true));
    assert_eq!(rig.hw.tones(), vec![400]);
    assert!(rig.hw.relay_windows().is_empty());
    assert!(rig.sink.events.contains(&AppEvent::AccessDenied {
        member_id: "MEM7".into(),
        reason: Some("expired".into()),
    }));

    rig.run_for(2_990);
    assert_eq!(rig.app.state(), StateId::Denied);
    assert!(rig.run_until(20, |r| r.app.state() == StateId::Idle));
    assert_eq!(rig.now_ms - entered, 3_000);
    assert!(rig.hw.relay_windows().is_empty());
    assert_eq!(rig.app.counters().denied, 1);
}

// ── Backend unreachable ───────────────────────────────────────

#[test]
fn unreachable_backend_exhausts_attempts_then_recovers_with_link() {
    let mut rig = Rig::new();
    for _ in 0..3 {
        rig.backend
            .push(Reply::after(20, ValidationOutcome::NetworkError));
    }

    rig.scan("GYM42:MEM7\n");
    assert!(rig.run_until(500, |r| r.app.state() == StateId::Error));
    assert_eq!(rig.backend.starts(), 3);
    assert_eq!(
        rig.app.device_state(),
        DeviceState::Error(ErrorKind::NetworkUnavailable)
    );
    assert!(rig.hw.relay_windows().is_empty());
    assert_eq!(rig.app.counters().network_errors, 3);

    // Scans are ignored while the fault stands.
    rig.scan("GYM42:MEM8\n");
    rig.step();
    assert_eq!(rig.backend.starts(), 3);
    assert!(rig.sink.events.contains(&AppEvent::ScanRejected(
        ScanRejection::Busy(StateId::Error)
    )));

    // Link bounces; its return clears the error.
    rig.set_link(false);
    rig.run_for(1_000);
    assert_eq!(rig.app.state(), StateId::Error);
    rig.set_link(true);
    assert!(rig.run_until(50, |r| r.app.state() == StateId::Idle));
    assert_eq!(rig.app.consecutive_failures(), 0);

    rig.backend
        .push(Reply::after(30, ValidationOutcome::Granted));
    rig.scan("GYM42:MEM9\n");
    assert!(rig.run_until(200, |r| r.app.state() == StateId::Granted));
    assert_eq!(rig.backend.started.last().map(|r| r.member_id.as_str()), Some("MEM9"));
}

#[test]
fn transient_failure_then_grant_resets_streak() {
    let mut rig = Rig::new();
    rig.backend.push(Reply::after(20, ValidationOutcome::Timeout));
    rig.backend
        .push(Reply::after(20, ValidationOutcome::Granted));

    rig.scan("GYM42:MEM7\n");
    assert!(rig.run_until(200, |r| r.app.state() == StateId::Granted));
    assert_eq!(rig.backend.starts(), 2);
    assert_eq!(rig.app.consecutive_failures(), 0);
    assert!(rig.sink.events.contains(&AppEvent::ValidationStarted {
        member_id: "MEM7".into(),
        attempt: 2,
    }));
}

#[test]
fn silent_backend_times_out_on_the_guard() {
    let mut rig = Rig::new();
    rig.scan("GYM42:MEM7\n");

    // Nothing scripted: every exchange hangs until the guard fires.
    assert!(rig.run_until(20_000, |r| r.app.state() == StateId::Error));
    assert_eq!(rig.backend.starts(), 3);
    assert_eq!(rig.backend.abandons, 3);

    // Guard expiries are accounted like any other timeout.
    assert_eq!(rig.app.counters().timeouts, 3);
    for attempt in 1..=3 {
        assert!(rig.sink.events.contains(&AppEvent::ValidationResolved {
            outcome: ValidationOutcome::Timeout,
            attempt,
        }));
    }
}

#[test]
fn link_loss_in_idle_latches_network_error() {
    let mut rig = Rig::new();
    rig.run_for(100);
    rig.set_link(false);

    rig.run_for(29_000);
    assert_eq!(rig.app.state(), StateId::Idle);
    assert!(rig.run_until(2_000, |r| r.app.state() == StateId::Error));
    assert_eq!(
        rig.app.device_state(),
        DeviceState::Error(ErrorKind::NetworkUnavailable)
    );

    rig.set_link(true);
    assert!(rig.run_until(50, |r| r.app.state() == StateId::Idle));
}

// ── Malformed backend answers ─────────────────────────────────

#[test]
fn malformed_response_needs_operator_clear() {
    let mut rig = Rig::new();
    rig.backend
        .push(Reply::after(20, ValidationOutcome::MalformedResponse));

    rig.scan("GYM42:MEM7\n");
    assert!(rig.run_until(200, |r| r.app.state() == StateId::Error));
    assert_eq!(rig.backend.starts(), 1, "contract breaches are never retried");
    assert_eq!(
        rig.app.device_state(),
        DeviceState::Error(ErrorKind::ProtocolFault)
    );
    assert_eq!(rig.hw.lights(), (true, true));

    // A healthy link alone does not clear it.
    rig.run_for(10_000);
    assert_eq!(rig.app.state(), StateId::Error);

    rig.app
        .handle_command(AppCommand::ClearFault, rig.now_ms, &mut rig.hw, &mut rig.sink);
    assert!(rig.run_until(50, |r| r.app.state() == StateId::Idle));
}

// ── Malformed scans ───────────────────────────────────────────

#[test]
fn code_without_separator_is_dropped() {
    let mut rig = Rig::new();
    rig.scan("GYM42MEM7\n");
    rig.run_for(100);

    assert_eq!(rig.app.state(), StateId::Idle);
    assert_eq!(rig.backend.starts(), 0);
    assert!(rig.app.assembler().is_empty());
    assert_eq!(rig.app.counters().parse_failures, 1);
    assert!(rig.sink.events.contains(&AppEvent::ScanRejected(
        ScanRejection::Malformed(ParseError::MissingSeparator)
    )));
}

#[test]
fn slow_bytes_pass_through_scanning() {
    let mut rig = Rig::new();
    for b in "GYM42MEM7\n".bytes() {
        rig.app.push_scanner_byte(b, rig.now_ms, &mut rig.sink);
        rig.step();
    }
    rig.step();

    assert!(rig.sink.events.contains(&AppEvent::StateChanged {
        from: StateId::Idle,
        to: StateId::Scanning,
    }));
    assert_eq!(rig.app.state(), StateId::Idle);
    assert_eq!(rig.backend.starts(), 0);
}

#[test]
fn partial_code_goes_stale() {
    let mut rig = Rig::new();
    rig.scan("GYM42:ME");
    rig.step();
    assert_eq!(rig.app.state(), StateId::Scanning);

    assert!(rig.run_until(1_100, |r| r.app.state() == StateId::Idle));
    assert!(rig.app.assembler().is_empty());

    // The tail of the abandoned code must not glue onto the next one.
    rig.backend
        .push(Reply::after(20, ValidationOutcome::Granted));
    rig.scan("GYM42:MEM7\n");
    assert!(rig.run_until(200, |r| r.app.state() == StateId::Granted));
    assert_eq!(rig.backend.started[0].member_id, "MEM7");
}

// ── Manual test cycle ─────────────────────────────────────────

#[test]
fn manual_trigger_runs_test_cycle_without_network() {
    let mut rig = Rig::new();
    rig.app
        .handle_command(AppCommand::ManualTrigger, rig.now_ms, &mut rig.hw, &mut rig.sink);
    rig.step();

    assert_eq!(rig.app.state(), StateId::Testing);
    assert_eq!(rig.hw.lights(), (true, false));
    assert_eq!(rig.hw.tones(), vec![1_000]);
    assert!(rig.hw.relay_engaged());

    assert!(rig.run_until(3_000, |r| r.app.state() == StateId::Idle));
    let windows = rig.hw.relay_windows();
    assert_eq!(windows.len(), 1);
    assert_eq!(windows[0].1.map(|off| off - windows[0].0), Some(500));
    assert_eq!(rig.backend.starts(), 0);
    assert_eq!(rig.app.counters().test_cycles, 1);
}

#[test]
fn manual_trigger_ignored_mid_validation() {
    let mut rig = Rig::new();
    rig.backend
        .push(Reply::after(500, ValidationOutcome::Granted));
    rig.scan("GYM42:MEM7\n");
    rig.step();
    assert_eq!(rig.app.state(), StateId::Validating);

    rig.app
        .handle_command(AppCommand::ManualTrigger, rig.now_ms, &mut rig.hw, &mut rig.sink);
    assert!(rig.run_until(1_000, |r| r.app.state() == StateId::Granted));
    assert_eq!(rig.app.counters().test_cycles, 0);
}

// ── Relay guard ───────────────────────────────────────────────

#[test]
fn relay_never_exceeds_ceiling() {
    let config = SystemConfig {
        access_open_ms: 15_000,
        max_access_open_ms: 15_000,
        ..SystemConfig::default()
    };
    let mut rig = Rig::with_backend(config, ScriptedBackend::new());
    rig.backend
        .push(Reply::after(20, ValidationOutcome::Granted));
    rig.scan("GYM42:MEM7\n");
    rig.run_for(20_000);

    for (on, off) in rig.hw.relay_windows() {
        let off = off.expect("relay left engaged");
        assert!(off - on <= 15_000);
    }
    assert!(!rig.hw.relay_engaged());
}

// ── Status reports ────────────────────────────────────────────

#[test]
fn status_reports_carry_counters() {
    let mut rig = Rig::new();
    rig.backend.push(Reply::after(20, denied("no plan")));
    rig.scan("GYM42:MEM7\n");
    rig.run_for(30_000);

    let report = rig.backend.reports.last().expect("no status report sent");
    assert!(report.linked);
    assert_eq!(report.device_id.as_str(), "GG-TEST01");
    assert_eq!(report.counters.denied, 1);
    assert_eq!(report.state, "IDLE");
}
