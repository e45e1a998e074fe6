//! System configuration parameters
//!
//! Every tunable of the GymGate controller lives here.  The value is
//! built once at boot (compiled-in defaults, optionally overridden by a
//! blob in NVS) and then handed by reference to each component
//! constructor.  Nothing mutates it after startup.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::pins;

/// Hard upper bound on the scanner buffer.  `max_code_len` may be
/// configured lower, never higher.
pub const QR_BUFFER_CAPACITY: usize = 128;

/// GPIO role assignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinMap {
    pub led_green: i32,
    pub led_red: i32,
    pub buzzer: i32,
    pub relay: i32,
    pub button: i32,
    pub scanner_rx: i32,
}

impl Default for PinMap {
    fn default() -> Self {
        Self {
            led_green: pins::LED_GREEN_GPIO,
            led_red: pins::LED_RED_GPIO,
            buzzer: pins::BUZZER_GPIO,
            relay: pins::RELAY_GPIO,
            button: pins::BUTTON_GPIO,
            scanner_rx: pins::SCANNER_RX_GPIO,
        }
    }
}

impl PinMap {
    fn all(&self) -> [i32; 6] {
        [
            self.led_green,
            self.led_red,
            self.buzzer,
            self.relay,
            self.button,
            self.scanner_rx,
        ]
    }
}

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Network ---
    /// Wi-Fi SSID (1-32 printable ASCII bytes)
    pub wifi_ssid: heapless::String<32>,
    /// Wi-Fi WPA2 passphrase (empty for open networks)
    pub wifi_password: heapless::String<64>,

    // --- Backend ---
    /// Backend host name or IPv4 literal
    pub backend_host: heapless::String<64>,
    /// Backend TCP port
    pub backend_port: u16,
    /// Membership validation endpoint path
    pub validate_path: heapless::String<64>,
    /// Device status endpoint path
    pub status_path: heapless::String<64>,

    // --- Pins ---
    pub pins: PinMap,

    // --- Access timing ---
    /// How long the gate stays unlocked after a grant (ms)
    pub access_open_ms: u32,
    /// Absolute ceiling on any relay engagement (ms)
    pub max_access_open_ms: u32,
    /// How long the denial indication is shown (ms)
    pub denied_display_ms: u32,
    /// Length of the operator test sequence (ms)
    pub test_cycle_ms: u32,
    /// Relay pulse used by the test sequence (ms)
    pub test_relay_pulse_ms: u32,

    // --- Network timing ---
    /// Link establishment deadline, also the tolerated outage (ms)
    pub link_timeout_ms: u32,
    /// Per-call deadline for a validation exchange (ms)
    pub http_timeout_ms: u32,
    /// Validation attempts per access attempt before giving up
    pub max_validation_attempts: u8,
    /// First reconnect delay after the link drops (ms)
    pub reconnect_backoff_initial_ms: u32,
    /// Reconnect delay cap (ms)
    pub reconnect_backoff_max_ms: u32,
    /// Stable-link time after which a network error clears on its own (ms)
    pub network_error_hold_ms: u32,
    /// Device status report interval (ms)
    pub status_interval_ms: u32,

    // --- QR code ---
    /// Separator between owner id and member id
    pub qr_separator: u8,
    /// Byte that ends one scanned code
    pub qr_terminator: u8,
    /// Maximum bytes in one code, separator included
    pub qr_max_len: u16,
    /// A partial code with no new byte for this long is dropped (ms)
    pub scan_stale_timeout_ms: u32,

    // --- Indicators ---
    pub blink_fast_ms: u32,
    pub blink_slow_ms: u32,
    pub blink_processing_ms: u32,

    // --- Sound ---
    pub tone_success_hz: u32,
    pub tone_error_hz: u32,
    pub tone_duration_ms: u32,

    // --- Button ---
    pub button_debounce_ms: u32,
    /// Hold time that turns a press into a fault-clear request (ms)
    pub button_long_press_ms: u32,

    // --- Diagnostics ---
    /// Verbose (debug-level) logging
    pub debug_output: bool,
    /// Scanner / console UART baud rate
    pub serial_baud: u32,

    // --- Loop ---
    /// Control loop interval (ms)
    pub control_loop_interval_ms: u32,
}

/// Copy `s` into a fixed-capacity string, dropping whatever does not fit.
pub fn truncated<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Network
            wifi_ssid: truncated("YOUR_WIFI_NAME"),
            wifi_password: truncated("YOUR_WIFI_PASSWORD"),

            // Backend
            backend_host: truncated("your-backend-server.com"),
            backend_port: 5000,
            validate_path: truncated("/api/nodemcu/validate"),
            status_path: truncated("/api/nodemcu/status"),

            pins: PinMap::default(),

            // Access timing
            access_open_ms: 10_000,
            max_access_open_ms: 15_000,
            denied_display_ms: 3_000,
            test_cycle_ms: 2_000,
            test_relay_pulse_ms: 500,

            // Network timing
            link_timeout_ms: 30_000,
            http_timeout_ms: 5_000,
            max_validation_attempts: 3,
            reconnect_backoff_initial_ms: 2_000,
            reconnect_backoff_max_ms: 60_000,
            network_error_hold_ms: 5_000,
            status_interval_ms: 30_000,

            // QR code
            qr_separator: b':',
            qr_terminator: b'\n',
            qr_max_len: 100,
            scan_stale_timeout_ms: 1_000,

            // Indicators
            blink_fast_ms: 100,
            blink_slow_ms: 500,
            blink_processing_ms: 150,

            // Sound
            tone_success_hz: 1_000,
            tone_error_hz: 400,
            tone_duration_ms: 200,

            // Button
            button_debounce_ms: 50,
            button_long_press_ms: 5_000,

            // Diagnostics
            debug_output: true,
            serial_baud: 115_200,

            // Loop
            control_loop_interval_ms: 10, // 100 Hz
        }
    }
}

impl SystemConfig {
    /// Range-check every field.
    ///
    /// Invalid values are rejected, never clamped: a config that would let
    /// the gate stay open indefinitely must not load.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wifi_ssid.is_empty() {
            return Err(ConfigError::ValidationFailed("wifi_ssid must not be empty"));
        }
        if self.backend_host.is_empty() {
            return Err(ConfigError::ValidationFailed("backend_host must not be empty"));
        }
        if self.backend_port == 0 {
            return Err(ConfigError::ValidationFailed("backend_port must be non-zero"));
        }
        if !self.validate_path.starts_with('/') || !self.status_path.starts_with('/') {
            return Err(ConfigError::ValidationFailed(
                "endpoint paths must start with '/'",
            ));
        }

        let pins = self.pins.all();
        for (i, pin) in pins.iter().enumerate() {
            if !(0..=48).contains(pin) {
                return Err(ConfigError::ValidationFailed("GPIO number must be 0–48"));
            }
            if pins[i + 1..].contains(pin) {
                return Err(ConfigError::ValidationFailed("GPIO roles must not share a pin"));
            }
        }

        if !(1_000..=60_000).contains(&self.max_access_open_ms) {
            return Err(ConfigError::ValidationFailed(
                "max_access_open_ms must be 1000–60000",
            ));
        }
        if self.access_open_ms == 0 || self.access_open_ms > self.max_access_open_ms {
            return Err(ConfigError::ValidationFailed(
                "access_open_ms must be 1..=max_access_open_ms",
            ));
        }
        if self.test_relay_pulse_ms > self.max_access_open_ms
            || self.test_relay_pulse_ms > self.test_cycle_ms
        {
            return Err(ConfigError::ValidationFailed(
                "test_relay_pulse_ms must fit inside test_cycle_ms and the relay ceiling",
            ));
        }
        if self.denied_display_ms == 0 || self.test_cycle_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "display durations must be non-zero",
            ));
        }

        if !(100..=60_000).contains(&self.http_timeout_ms) {
            return Err(ConfigError::ValidationFailed("http_timeout_ms must be 100–60000"));
        }
        if self.link_timeout_ms < 1_000 {
            return Err(ConfigError::ValidationFailed("link_timeout_ms must be >= 1000"));
        }
        if !(1..=10).contains(&self.max_validation_attempts) {
            return Err(ConfigError::ValidationFailed(
                "max_validation_attempts must be 1–10",
            ));
        }
        if self.reconnect_backoff_initial_ms == 0
            || self.reconnect_backoff_initial_ms > self.reconnect_backoff_max_ms
        {
            return Err(ConfigError::ValidationFailed(
                "reconnect backoff must be 0 < initial <= max",
            ));
        }
        if self.status_interval_ms < 1_000 {
            return Err(ConfigError::ValidationFailed("status_interval_ms must be >= 1000"));
        }

        if self.qr_separator == self.qr_terminator {
            return Err(ConfigError::ValidationFailed(
                "qr_separator and qr_terminator must differ",
            ));
        }
        if !(3..=QR_BUFFER_CAPACITY as u16).contains(&self.qr_max_len) {
            return Err(ConfigError::ValidationFailed("qr_max_len must be 3–128"));
        }

        if self.blink_fast_ms == 0 || self.blink_slow_ms == 0 || self.blink_processing_ms == 0 {
            return Err(ConfigError::ValidationFailed("blink rates must be non-zero"));
        }
        if !(20..=20_000).contains(&self.tone_success_hz)
            || !(20..=20_000).contains(&self.tone_error_hz)
        {
            return Err(ConfigError::ValidationFailed("tone frequencies must be 20–20000 Hz"));
        }
        if self.button_long_press_ms <= self.button_debounce_ms {
            return Err(ConfigError::ValidationFailed(
                "button_long_press_ms must exceed button_debounce_ms",
            ));
        }
        if !(1..=1_000).contains(&self.control_loop_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "control_loop_interval_ms must be 1–1000",
            ));
        }
        if self.serial_baud == 0 {
            return Err(ConfigError::ValidationFailed("serial_baud must be non-zero"));
        }
        Ok(())
    }

    /// Relay duration after applying the safety ceiling.
    pub fn clamp_relay_ms(&self, requested_ms: u32) -> u32 {
        requested_ms.min(self.max_access_open_ms)
    }
}
