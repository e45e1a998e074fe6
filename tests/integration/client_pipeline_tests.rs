//! Controller → ValidationClient → HTTP transport, with a scripted
//! transport standing in for the socket.

use std::collections::VecDeque;

use gymgate::backend::ValidationClient;
use gymgate::backend::transport::{
    ExchangePoll, HttpRequest, HttpResponse, HttpTransport, TransportError,
};
use gymgate::config::SystemConfig;
use gymgate::fsm::{DeviceState, ErrorKind, StateId};

use crate::mock_hw::Rig;

// ── Scripted transport ────────────────────────────────────────

#[derive(Default)]
struct ScriptedTransport {
    replies: VecDeque<ExchangePoll>,
    sent: Vec<HttpRequest>,
    busy: bool,
    /// Pending polls before the scripted reply is released.
    latency_polls: u32,
    polls_left: u32,
}

impl ScriptedTransport {
    fn replying(replies: impl IntoIterator<Item = ExchangePoll>) -> Self {
        Self {
            replies: replies.into_iter().collect(),
            latency_polls: 3,
            ..Self::default()
        }
    }
}

impl HttpTransport for ScriptedTransport {
    fn begin(&mut self, request: &HttpRequest) -> Result<(), TransportError> {
        if self.busy {
            return Err(TransportError::Busy);
        }
        self.sent.push(request.clone());
        self.busy = true;
        self.polls_left = self.latency_polls;
        Ok(())
    }

    fn poll(&mut self) -> ExchangePoll {
        if !self.busy {
            return ExchangePoll::Pending;
        }
        if self.polls_left > 0 {
            self.polls_left -= 1;
            return ExchangePoll::Pending;
        }
        match self.replies.pop_front() {
            Some(reply) => {
                self.busy = false;
                reply
            }
            None => ExchangePoll::Pending,
        }
    }

    fn abort(&mut self) {
        self.busy = false;
    }

    fn is_idle(&self) -> bool {
        !self.busy
    }
}

fn reply(status: u16, body: &str) -> ExchangePoll {
    ExchangePoll::Complete(HttpResponse {
        status,
        body: body.as_bytes().to_vec(),
    })
}

fn rig(replies: Vec<ExchangePoll>) -> Rig<ValidationClient<ScriptedTransport>> {
    let config = SystemConfig::default();
    let client = ValidationClient::new(
        &config,
        "GG-TEST01",
        ScriptedTransport::replying(replies),
        ScriptedTransport::replying([reply(200, "{}")]),
    );
    Rig::with_backend(config, client)
}

// ── Tests ─────────────────────────────────────────────────────

#[test]
fn validate_request_carries_scan_and_device() {
    let mut rig = rig(vec![reply(200, r#"{"decision":"granted"}"#)]);
    rig.scan("GYM42:MEM7\n");
    assert!(rig.run_until(200, |r| r.app.state() == StateId::Granted));

    let sent = &rig.backend.validate_transport().sent;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].path.as_str(), "/api/nodemcu/validate");
    assert_eq!(sent[0].port, 5000);

    let body: serde_json::Value = serde_json::from_slice(&sent[0].body).unwrap();
    assert_eq!(body["ownerId"], "GYM42");
    assert_eq!(body["gymOwnerId"], "GYM42");
    assert_eq!(body["memberId"], "MEM7");
    assert_eq!(body["deviceId"], "GG-TEST01");
    assert!(body["uptimeMs"].is_u64());
}

#[test]
fn legacy_inactive_verdict_denies() {
    let mut rig = rig(vec![reply(200, r#"{"nodeMcuResponse":"INACTIVE"}"#)]);
    rig.scan("GYM42:MEM7\n");
    assert!(rig.run_until(200, |r| r.app.state() == StateId::Denied));
    assert!(!rig.hw.relay_engaged());
}

#[test]
fn server_error_is_retried_then_granted() {
    let mut rig = rig(vec![
        reply(503, "busy"),
        reply(200, r#"{"decision":"granted"}"#),
    ]);
    rig.scan("GYM42:MEM7\n");
    assert!(rig.run_until(500, |r| r.app.state() == StateId::Granted));
    assert_eq!(rig.backend.validate_transport().sent.len(), 2);
    assert_eq!(rig.app.counters().network_errors, 1);
    assert_eq!(rig.backend.generation(), 2);
}

#[test]
fn connect_failures_exhaust_attempts() {
    let mut rig = rig(vec![
        ExchangePoll::Failed(TransportError::Connect),
        ExchangePoll::Failed(TransportError::Connect),
        ExchangePoll::Failed(TransportError::Connect),
    ]);
    rig.scan("GYM42:MEM7\n");
    assert!(rig.run_until(500, |r| r.app.state() == StateId::Error));
    assert_eq!(
        rig.app.device_state(),
        DeviceState::Error(ErrorKind::NetworkUnavailable)
    );
    assert_eq!(rig.backend.validate_transport().sent.len(), 3);
}

#[test]
fn html_error_page_is_a_protocol_fault() {
    let mut rig = rig(vec![reply(200, "<html>oops</html>")]);
    rig.scan("GYM42:MEM7\n");
    assert!(rig.run_until(200, |r| r.app.state() == StateId::Error));
    assert_eq!(
        rig.app.device_state(),
        DeviceState::Error(ErrorKind::ProtocolFault)
    );
    assert_eq!(rig.backend.validate_transport().sent.len(), 1);
}

#[test]
fn status_report_goes_out_on_its_own_transport() {
    let mut rig = rig(Vec::new());
    rig.run_for(30_000);

    let status = &rig.backend.status_transport().sent;
    assert_eq!(status.len(), 1);
    assert_eq!(status[0].path.as_str(), "/api/nodemcu/status");
    let body: serde_json::Value = serde_json::from_slice(&status[0].body).unwrap();
    assert_eq!(body["deviceId"], "GG-TEST01");
    assert_eq!(body["linked"], true);
    assert_eq!(body["state"], "IDLE");
    assert!(rig.backend.validate_transport().sent.is_empty());

    rig.run_for(100);
    assert!(!rig.backend.status_pending());
}
