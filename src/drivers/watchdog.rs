//! Task watchdog (TWDT) for the control loop.
//!
//! The loop task subscribes once at boot and feeds on every iteration.  A
//! stalled loop means the relay could be left in whatever state it was
//! in, so the watchdog is configured to panic; the panic hook releases
//! the relay before the reset.
//!
//! If subscription fails the firmware keeps running unguarded and says so
//! in the log.

use log::{info, warn};

/// Stall timeout.  Comfortably above the longest bounded wait in one tick
/// (the HTTP connect bound).
pub const DEFAULT_TIMEOUT_MS: u32 = 5_000;

pub struct Watchdog {
    timeout_ms: u32,
    armed: bool,
    feeds: u64,
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}

impl Watchdog {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT_MS)
    }

    /// Subscribe the calling task with an explicit timeout.
    pub fn with_timeout(timeout_ms: u32) -> Self {
        let armed = match platform_subscribe(timeout_ms) {
            Ok(()) => {
                info!("Watchdog: loop task guarded ({} ms, panic on stall)", timeout_ms);
                true
            }
            Err(code) => {
                warn!("Watchdog: subscribe failed ({}), loop runs unguarded", code);
                false
            }
        };
        Self {
            timeout_ms,
            armed,
            feeds: 0,
        }
    }

    /// Call once per loop iteration.
    pub fn feed(&mut self) {
        if self.armed {
            platform_reset();
        }
        self.feeds = self.feeds.wrapping_add(1);
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }

    pub fn feeds(&self) -> u64 {
        self.feeds
    }
}

#[cfg(target_os = "espidf")]
fn platform_subscribe(timeout_ms: u32) -> Result<(), i32> {
    use esp_idf_svc::sys::*;

    let cfg = esp_task_wdt_config_t {
        timeout_ms,
        idle_core_mask: 0,
        trigger_panic: true,
    };
    // SAFETY: plain FFI calls from the loop task during boot.
    unsafe {
        // The bootloader may already have initialised the TWDT; reconfigure
        // failing is only worth a note.
        let ret = esp_task_wdt_reconfigure(&cfg);
        if ret != ESP_OK {
            warn!("Watchdog: reconfigure returned {}", ret);
        }
        let ret = esp_task_wdt_add(core::ptr::null_mut());
        if ret == ESP_OK { Ok(()) } else { Err(ret) }
    }
}

#[cfg(not(target_os = "espidf"))]
fn platform_subscribe(_timeout_ms: u32) -> Result<(), i32> {
    Ok(())
}

#[cfg(target_os = "espidf")]
fn platform_reset() {
    // SAFETY: resets the TWDT for the subscribed calling task.
    unsafe {
        esp_idf_svc::sys::esp_task_wdt_reset();
    }
}

#[cfg(not(target_os = "espidf"))]
fn platform_reset() {}
