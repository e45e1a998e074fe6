//! Validation client: turns an [`AccessRequest`] into a typed verdict.
//!
//! Two transports: one carries validation exchanges, the other the
//! fire-and-forget status reports, so a slow status POST can never delay
//! a member at the gate.  The client never retries; the orchestrator owns
//! the retry policy.

use log::{debug, info, warn};

use crate::app::ports::{ValidationOutcome, ValidationPort};
use crate::config::SystemConfig;
use crate::diagnostics::StatusReport;
use crate::error::CommsError;
use crate::scanner::AccessRequest;

use super::transport::{ExchangePoll, HttpRequest, HttpTransport, TransportError};
use super::wire::{StatusBody, ValidateBody, decode_verdict};

#[derive(Debug, Clone, Copy)]
struct Exchange {
    generation: u32,
    deadline_ms: u64,
}

pub struct ValidationClient<T: HttpTransport> {
    validate_tx: T,
    status_tx: T,
    host: heapless::String<64>,
    port: u16,
    validate_path: heapless::String<64>,
    status_path: heapless::String<64>,
    timeout_ms: u32,
    device_id: heapless::String<16>,

    generation: u32,
    in_flight: Option<Exchange>,
    status_deadline_ms: Option<u64>,
}

impl<T: HttpTransport> ValidationClient<T> {
    pub fn new(config: &SystemConfig, device_id: &str, validate_tx: T, status_tx: T) -> Self {
        let id = crate::config::truncated(device_id);
        Self {
            validate_tx,
            status_tx,
            host: config.backend_host.clone(),
            port: config.backend_port,
            validate_path: config.validate_path.clone(),
            status_path: config.status_path.clone(),
            timeout_ms: config.http_timeout_ms,
            device_id: id,
            generation: 0,
            in_flight: None,
            status_deadline_ms: None,
        }
    }

    /// Number of validation exchanges started since boot.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn is_pending(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn status_pending(&self) -> bool {
        self.status_deadline_ms.is_some()
    }

    /// Borrow the validation transport (tests inspect scripted mocks).
    pub fn validate_transport(&self) -> &T {
        &self.validate_tx
    }

    pub fn status_transport(&self) -> &T {
        &self.status_tx
    }

    fn build(&self, path: &heapless::String<64>, body: Vec<u8>) -> HttpRequest {
        HttpRequest {
            host: self.host.clone(),
            port: self.port,
            path: path.clone(),
            body,
        }
    }
}

fn outcome_for_failure(e: TransportError) -> ValidationOutcome {
    match e {
        TransportError::Protocol | TransportError::TooLarge => ValidationOutcome::MalformedResponse,
        _ => ValidationOutcome::NetworkError,
    }
}

impl<T: HttpTransport> ValidationPort for ValidationClient<T> {
    fn start(&mut self, request: &AccessRequest, now_ms: u64) -> Result<(), CommsError> {
        if self.in_flight.is_some() {
            self.abandon();
        }

        let body = serde_json::to_vec(&ValidateBody::new(request, &self.device_id))
            .map_err(|_| CommsError::EncodeFailed)?;
        let http = self.build(&self.validate_path, body);

        self.validate_tx.begin(&http).map_err(|e| {
            warn!("BACKEND: validate request not started: {e}");
            CommsError::TransportStartFailed
        })?;

        self.generation = self.generation.wrapping_add(1);
        self.in_flight = Some(Exchange {
            generation: self.generation,
            deadline_ms: now_ms + u64::from(self.timeout_ms),
        });
        debug!(
            "BACKEND: validate #{} started for member {}",
            self.generation, request.member_id
        );
        Ok(())
    }

    fn poll(&mut self, now_ms: u64) -> Option<ValidationOutcome> {
        let ex = self.in_flight?;

        let outcome = match self.validate_tx.poll() {
            ExchangePoll::Complete(resp) => {
                let outcome = decode_verdict(resp.status, &resp.body);
                debug!(
                    "BACKEND: validate #{} -> HTTP {} ({})",
                    ex.generation,
                    resp.status,
                    outcome.label()
                );
                outcome
            }
            ExchangePoll::Failed(e) => {
                warn!("BACKEND: validate #{} failed: {e}", ex.generation);
                outcome_for_failure(e)
            }
            ExchangePoll::Pending if now_ms >= ex.deadline_ms => {
                warn!(
                    "BACKEND: validate #{} timed out after {} ms",
                    ex.generation, self.timeout_ms
                );
                self.validate_tx.abort();
                ValidationOutcome::Timeout
            }
            ExchangePoll::Pending => return None,
        };

        self.in_flight = None;
        Some(outcome)
    }

    fn abandon(&mut self) {
        if let Some(ex) = self.in_flight.take() {
            debug!("BACKEND: validate #{} abandoned", ex.generation);
        }
        self.validate_tx.abort();
    }

    fn report_status(&mut self, report: &StatusReport, now_ms: u64) {
        if !self.status_tx.is_idle() {
            debug!("BACKEND: previous status report still pending, dropping it");
            self.status_tx.abort();
        }

        let Ok(body) = serde_json::to_vec(&StatusBody::from(report)) else {
            debug!("BACKEND: status report encoding failed");
            return;
        };
        let http = self.build(&self.status_path, body);

        match self.status_tx.begin(&http) {
            Ok(()) => {
                self.status_deadline_ms = Some(now_ms + u64::from(self.timeout_ms));
            }
            Err(e) => {
                debug!("BACKEND: status report not sent: {e}");
                self.status_deadline_ms = None;
            }
        }
    }

    fn service(&mut self, now_ms: u64) {
        let Some(deadline) = self.status_deadline_ms else {
            return;
        };
        match self.status_tx.poll() {
            ExchangePoll::Complete(resp) => {
                if (200..=299).contains(&resp.status) {
                    debug!("BACKEND: status report accepted");
                } else {
                    info!("BACKEND: status report answered HTTP {}", resp.status);
                }
                self.status_deadline_ms = None;
            }
            ExchangePoll::Failed(e) => {
                debug!("BACKEND: status report failed: {e}");
                self.status_deadline_ms = None;
            }
            ExchangePoll::Pending if now_ms >= deadline => {
                debug!("BACKEND: status report timed out");
                self.status_tx.abort();
                self.status_deadline_ms = None;
            }
            ExchangePoll::Pending => {}
        }
    }
}
