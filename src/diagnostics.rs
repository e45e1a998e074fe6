//! Access counters and runtime diagnostics.
//!
//! [`AccessCounters`] are rolling totals carried in every status report.
//! No per-attempt history is kept on the device.  Runtime metrics (heap,
//! RSSI) are collected on demand for the periodic health log line.

use serde::{Deserialize, Serialize};

use crate::app::ports::ValidationOutcome;

/// Rolling diagnostic counters.  All fields wrap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessCounters {
    pub granted: u32,
    pub denied: u32,
    pub network_errors: u32,
    pub timeouts: u32,
    pub malformed_responses: u32,
    pub parse_failures: u32,
    pub test_cycles: u32,
    pub relay_clamps: u32,
}

impl AccessCounters {
    /// Count one resolved validation exchange.
    pub fn record_outcome(&mut self, outcome: &ValidationOutcome) {
        let slot = match outcome {
            ValidationOutcome::Granted => &mut self.granted,
            ValidationOutcome::Denied { .. } => &mut self.denied,
            ValidationOutcome::NetworkError => &mut self.network_errors,
            ValidationOutcome::Timeout => &mut self.timeouts,
            ValidationOutcome::MalformedResponse => &mut self.malformed_responses,
        };
        *slot = slot.wrapping_add(1);
    }

    pub fn record_parse_failure(&mut self) {
        self.parse_failures = self.parse_failures.wrapping_add(1);
    }

    pub fn record_test_cycle(&mut self) {
        self.test_cycles = self.test_cycles.wrapping_add(1);
    }

    pub fn record_relay_clamp(&mut self) {
        self.relay_clamps = self.relay_clamps.wrapping_add(1);
    }
}

/// Periodic health report sent to the backend status endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub device_id: heapless::String<16>,
    pub linked: bool,
    pub uptime_ms: u64,
    pub state: &'static str,
    pub counters: AccessCounters,
}

/// Runtime diagnostics snapshot collected on-demand.
#[derive(Debug, Clone)]
pub struct RuntimeMetrics {
    pub uptime_ms: u64,
    pub loop_cycles: u64,
    pub heap_free: u32,
    pub heap_min_free: u32,
    pub wifi_rssi: Option<i8>,
}

impl RuntimeMetrics {
    #[cfg(target_os = "espidf")]
    pub fn collect(uptime_ms: u64, loop_cycles: u64, wifi_rssi: Option<i8>) -> Self {
        use esp_idf_svc::sys::*;
        // SAFETY: plain reads of heap statistics, callable from any task.
        let heap_free = unsafe { esp_get_free_heap_size() };
        let heap_min_free = unsafe { esp_get_minimum_free_heap_size() };

        Self {
            uptime_ms,
            loop_cycles,
            heap_free,
            heap_min_free,
            wifi_rssi,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn collect(uptime_ms: u64, loop_cycles: u64, wifi_rssi: Option<i8>) -> Self {
        // Synthetic values; heap "decays" slightly to model fragmentation.
        let base_free: u32 = 307_200;
        let decay = (uptime_ms / 60_000) as u32 * 512;
        let heap_free = base_free.saturating_sub(decay);
        let heap_min_free = (heap_free as f32 * 0.85) as u32;

        Self {
            uptime_ms,
            loop_cycles,
            heap_free,
            heap_min_free,
            wifi_rssi,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Panic handler: log the reason before the reset
// ───────────────────────────────────────────────────────────────

/// Install a panic hook that logs the panic message.
///
/// Call once during init, after the logger is up.  The default ESP-IDF
/// panic path still runs afterwards and resets the chip.
pub fn install_panic_handler() {
    std::panic::set_hook(Box::new(|info| {
        let reason = if let Some(msg) = info.payload().downcast_ref::<&str>() {
            *msg
        } else if let Some(msg) = info.payload().downcast_ref::<String>() {
            msg.as_str()
        } else {
            "unknown panic"
        };

        match info.location() {
            Some(loc) => log::error!("PANIC: {} at {}:{}", reason, loc.file(), loc.line()),
            None => log::error!("PANIC: {}", reason),
        }

        // Fail safe: release the gate before the reset.
        #[cfg(target_os = "espidf")]
        crate::drivers::relay::emergency_release();
    }));
}
