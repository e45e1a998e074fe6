//! Gate latch relay driver.
//!
//! HIGH releases the latch (gate open).  The relay is a dumb actuator:
//! open duration and its ceiling are enforced by the feedback controller.
//!
//! The configured pin is also published to a static so the panic hook
//! can drop the relay without access to the driver instance.

use core::sync::atomic::{AtomicI32, Ordering};

use crate::drivers::hw_init;

/// Relay GPIO, or `-1` before a driver exists.
static RELAY_PIN: AtomicI32 = AtomicI32::new(-1);

pub struct RelayDriver {
    pin: i32,
    engaged: bool,
}

impl RelayDriver {
    pub fn new(pin: i32) -> Self {
        RELAY_PIN.store(pin, Ordering::Release);
        hw_init::gpio_write(pin, false);
        Self {
            pin,
            engaged: false,
        }
    }

    pub fn set(&mut self, engaged: bool) {
        hw_init::gpio_write(self.pin, engaged);
        self.engaged = engaged;
    }

    pub fn release(&mut self) {
        self.set(false);
    }

    pub fn is_engaged(&self) -> bool {
        self.engaged
    }
}

/// Force the latch closed from any context (panic hook).
pub fn emergency_release() {
    let pin = RELAY_PIN.load(Ordering::Acquire);
    if pin >= 0 {
        hw_init::gpio_write(pin, false);
    }
}
