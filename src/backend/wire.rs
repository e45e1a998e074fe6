//! JSON bodies exchanged with the backend.

use serde::{Deserialize, Serialize};

use crate::app::ports::ValidationOutcome;
use crate::diagnostics::{AccessCounters, StatusReport};
use crate::scanner::AccessRequest;

/// `POST <validate-path>` body.
///
/// `gymOwnerId` duplicates `ownerId` for backends that still read the
/// older field name.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateBody<'a> {
    pub owner_id: &'a str,
    pub gym_owner_id: &'a str,
    pub member_id: &'a str,
    pub device_id: &'a str,
    /// Device uptime when the code was scanned.  The device has no
    /// wall clock.
    pub uptime_ms: u64,
}

impl<'a> ValidateBody<'a> {
    pub fn new(request: &'a AccessRequest, device_id: &'a str) -> Self {
        Self {
            owner_id: &request.owner_id,
            gym_owner_id: &request.owner_id,
            member_id: &request.member_id,
            device_id,
            uptime_ms: request.received_at_ms,
        }
    }
}

/// `POST <status-path>` body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBody<'a> {
    pub device_id: &'a str,
    pub linked: bool,
    pub uptime_ms: u64,
    pub state: &'a str,
    pub counters: &'a AccessCounters,
}

impl<'a> From<&'a StatusReport> for StatusBody<'a> {
    fn from(r: &'a StatusReport) -> Self {
        Self {
            device_id: &r.device_id,
            linked: r.linked,
            uptime_ms: r.uptime_ms,
            state: r.state,
            counters: &r.counters,
        }
    }
}

/// Every verdict shape the backend has served.  Unknown fields ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerdictBody {
    #[serde(default)]
    decision: Option<String>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    node_mcu_response: Option<String>,
}

/// Map an HTTP status and body to a validation outcome.
///
/// | status | body                                  | outcome             |
/// |--------|---------------------------------------|---------------------|
/// | 2xx    | `{"decision":"granted"}`              | `Granted`           |
/// | 2xx    | `{"decision":"denied","reason":..}`   | `Denied`            |
/// | 2xx    | `{"nodeMcuResponse":"ACTIVE"}`        | `Granted`           |
/// | 2xx    | `{"nodeMcuResponse":"INACTIVE"}`      | `Denied(None)`      |
/// | 5xx    | any                                   | `NetworkError`      |
/// | other  | anything else                         | `MalformedResponse` |
pub fn decode_verdict(status: u16, body: &[u8]) -> ValidationOutcome {
    if (500..=599).contains(&status) {
        return ValidationOutcome::NetworkError;
    }
    if !(200..=299).contains(&status) {
        return ValidationOutcome::MalformedResponse;
    }

    let Ok(v) = serde_json::from_slice::<VerdictBody>(body) else {
        return ValidationOutcome::MalformedResponse;
    };

    if let Some(decision) = v.decision.as_deref() {
        return if decision.eq_ignore_ascii_case("granted") {
            ValidationOutcome::Granted
        } else if decision.eq_ignore_ascii_case("denied") {
            ValidationOutcome::Denied { reason: v.reason }
        } else {
            ValidationOutcome::MalformedResponse
        };
    }

    match v.node_mcu_response.as_deref() {
        Some("ACTIVE") => ValidationOutcome::Granted,
        Some("INACTIVE") => ValidationOutcome::Denied { reason: v.reason },
        _ => ValidationOutcome::MalformedResponse,
    }
}
