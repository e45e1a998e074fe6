//! Hardware adapter; bridges real peripherals to the actuator port.
//!
//! Owns the indicator, buzzer and relay drivers and exposes them through
//! [`ActuatorPort`].  This is the only module in the system that drives
//! outputs.  On non-espidf targets the underlying drivers use cfg-gated
//! simulation stubs.

use log::warn;

use crate::app::ports::ActuatorPort;
use crate::config::PinMap;
use crate::drivers::buzzer::Buzzer;
use crate::drivers::indicator::IndicatorLeds;
use crate::drivers::relay::RelayDriver;

/// Concrete adapter that combines all outputs behind the port trait.
pub struct HardwareAdapter {
    leds: IndicatorLeds,
    buzzer: Buzzer,
    relay: RelayDriver,
    faults: u32,
}

impl HardwareAdapter {
    pub fn new(pins: &PinMap) -> Self {
        Self {
            leds: IndicatorLeds::new(pins.led_green, pins.led_red),
            buzzer: Buzzer::new(),
            relay: RelayDriver::new(pins.relay),
            faults: 0,
        }
    }

    /// Driver write failures since boot.
    pub fn fault_count(&self) -> u32 {
        self.faults
    }

    pub fn relay_engaged(&self) -> bool {
        self.relay.is_engaged()
    }
}

impl ActuatorPort for HardwareAdapter {
    fn set_lights(&mut self, green: bool, red: bool) {
        self.leds.set(green, red);
    }

    fn start_tone(&mut self, freq_hz: u32) {
        if let Err(e) = self.buzzer.tone(freq_hz) {
            self.faults += 1;
            warn!("Actuator: {}", e);
        }
    }

    fn stop_tone(&mut self) {
        self.buzzer.stop();
    }

    fn set_relay(&mut self, engaged: bool) {
        self.relay.set(engaged);
    }

    fn all_off(&mut self) {
        self.relay.release();
        self.buzzer.stop();
        self.leds.off();
    }
}
