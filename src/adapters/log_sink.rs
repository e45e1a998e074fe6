//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production), one
//! tagged line per event.

use log::{debug, info, warn};

use crate::app::events::{AppEvent, ScanRejection};
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink {
    emitted: u64,
}

impl LogEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events written since boot.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        self.emitted += 1;
        match event {
            AppEvent::Started(state) => {
                info!("START | initial_state={}", state.label());
            }
            AppEvent::StateChanged { from, to } => {
                info!("STATE | {} -> {}", from.label(), to.label());
            }
            AppEvent::ScanRejected(ScanRejection::Malformed(e)) => {
                warn!("SCAN | rejected: {}", e);
            }
            AppEvent::ScanRejected(ScanRejection::Busy(state)) => {
                info!("SCAN | ignored while {}", state.label());
            }
            AppEvent::ValidationStarted { member_id, attempt } => {
                info!("VALIDATE | member={} attempt={}", member_id, attempt);
            }
            AppEvent::ValidationResolved { outcome, attempt } => {
                info!("VALIDATE | {} (attempt {})", outcome.label(), attempt);
            }
            AppEvent::AccessGranted {
                owner_id,
                member_id,
            } => {
                info!("ACCESS | GRANTED owner={} member={}", owner_id, member_id);
            }
            AppEvent::AccessDenied { member_id, reason } => {
                info!(
                    "ACCESS | DENIED member={} reason={}",
                    member_id,
                    reason.as_deref().unwrap_or("-")
                );
            }
            AppEvent::LinkChanged(link) => {
                if link.connected {
                    info!("LINK | up at {} ms", link.last_change_ms);
                } else {
                    warn!("LINK | down at {} ms", link.last_change_ms);
                }
            }
            AppEvent::StatusReported { linked, state } => {
                debug!("STATUS | linked={} state={}", linked, state.label());
            }
        }
    }
}
