//! Connectivity supervisor.
//!
//! Watches the link layer's own up/down signal, timestamps every edge,
//! and schedules non-blocking reconnect attempts with exponential backoff.
//! It never waits: the orchestrator reads the resulting [`LinkStatus`] and
//! decides whether validation can proceed.

use core::fmt;

use log::{info, warn};

use crate::config::SystemConfig;

// ───────────────────────────────────────────────────────────────
// Link port (driven adapter: supervisor → Wi-Fi stack)
// ───────────────────────────────────────────────────────────────

/// Link-layer control.  Every method returns immediately; association
/// progress is observed through [`is_connected`](LinkPort::is_connected).
pub trait LinkPort {
    /// Kick off an association attempt in the background.
    fn begin_connect(&mut self) -> Result<(), ConnectivityError>;

    /// `true` once associated and holding an IP address.
    fn is_connected(&self) -> bool;

    /// Drop the association.
    fn disconnect(&mut self);

    /// Signal strength of the current association, if any.
    fn rssi(&self) -> Option<i8>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityError {
    /// SSID or passphrase rejected before reaching the radio.
    InvalidCredentials(&'static str),
    /// The Wi-Fi driver refused the request.
    DriverFailed,
    /// `begin_connect` called before the driver was started.
    NotInitialised,
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCredentials(why) => write!(f, "invalid credentials: {why}"),
            Self::DriverFailed => write!(f, "Wi-Fi driver error"),
            Self::NotInitialised => write!(f, "Wi-Fi not initialised"),
        }
    }
}

/// Link state as seen by the rest of the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkStatus {
    pub connected: bool,
    /// Clock reading of the most recent up/down edge (boot counts as one).
    pub last_change_ms: u64,
}

impl LinkStatus {
    /// How long the link has been down, zero while up.
    ///
    /// Boot counts as a down edge, so before the first association this is
    /// the time since boot and doubles as the establishment deadline.
    pub fn down_for(&self, now_ms: u64) -> u64 {
        if self.connected {
            0
        } else {
            now_ms.saturating_sub(self.last_change_ms)
        }
    }
}

pub struct ConnectivitySupervisor {
    status: LinkStatus,
    backoff_initial_ms: u32,
    backoff_max_ms: u32,
    backoff_ms: u32,
    next_attempt_at: Option<u64>,
    attempts: u32,
}

impl ConnectivitySupervisor {
    pub fn new(config: &SystemConfig, now_ms: u64) -> Self {
        Self {
            status: LinkStatus {
                connected: false,
                last_change_ms: now_ms,
            },
            backoff_initial_ms: config.reconnect_backoff_initial_ms,
            backoff_max_ms: config.reconnect_backoff_max_ms,
            backoff_ms: config.reconnect_backoff_initial_ms,
            next_attempt_at: Some(now_ms),
            attempts: 0,
        }
    }

    /// One supervision step.  Returns the status for this tick.
    pub fn poll(&mut self, now_ms: u64, link: &mut impl LinkPort) -> LinkStatus {
        let up = link.is_connected();

        if up != self.status.connected {
            self.status = LinkStatus {
                connected: up,
                last_change_ms: now_ms,
            };
            if up {
                self.backoff_ms = self.backoff_initial_ms;
                self.next_attempt_at = None;
                match link.rssi() {
                    Some(rssi) => info!("LINK: up (RSSI {rssi} dBm)"),
                    None => info!("LINK: up"),
                }
            } else {
                warn!("LINK: down");
                self.next_attempt_at = Some(now_ms);
            }
        }

        if !up && self.next_attempt_at.is_some_and(|t| now_ms >= t) {
            self.attempts = self.attempts.wrapping_add(1);
            if let Err(e) = link.begin_connect() {
                warn!("LINK: reconnect attempt {} failed to start: {e}", self.attempts);
            }
            self.next_attempt_at = Some(now_ms + u64::from(self.backoff_ms));
            self.backoff_ms = self.backoff_ms.saturating_mul(2).min(self.backoff_max_ms);
        }

        self.status
    }

    pub fn status(&self) -> LinkStatus {
        self.status
    }

    /// Reconnect attempts issued since boot.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Delay that will follow the next attempt.
    pub fn current_backoff_ms(&self) -> u32 {
        self.backoff_ms
    }
}
