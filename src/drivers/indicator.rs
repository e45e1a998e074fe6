//! Green / red indicator LED driver.
//!
//! Two discrete active-HIGH LEDs on plain GPIO outputs.  Amber is both
//! lit at once.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: drives the output pins via hw_init.
//! On host/test: tracks state in-memory only.

use crate::drivers::hw_init;

pub struct IndicatorLeds {
    green_pin: i32,
    red_pin: i32,
    current: (bool, bool),
}

impl IndicatorLeds {
    pub fn new(green_pin: i32, red_pin: i32) -> Self {
        Self {
            green_pin,
            red_pin,
            current: (false, false),
        }
    }

    pub fn set(&mut self, green: bool, red: bool) {
        hw_init::gpio_write(self.green_pin, green);
        hw_init::gpio_write(self.red_pin, red);
        self.current = (green, red);
    }

    pub fn off(&mut self) {
        self.set(false, false);
    }

    /// Last written `(green, red)` levels.
    pub fn current(&self) -> (bool, bool) {
        self.current
    }
}
