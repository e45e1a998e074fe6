//! Piezo buzzer driver (LEDC PWM).
//!
//! A tone is a 50 % square wave at the requested frequency; the LEDC
//! timer is retuned for every tone.  Durations are not tracked here:
//! the feedback controller owns every deadline and calls [`Buzzer::stop`].
//!
//! ## Dual-target design
//!
//! On ESP-IDF: retunes LEDC timer 0 and writes the channel duty.
//! On host/test: tracks state in-memory only.

use log::warn;

use crate::drivers::hw_init;
use crate::error::ActuatorFault;
use crate::pins;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuzzerState {
    Silent,
    Sounding { freq_hz: u32 },
}

pub struct Buzzer {
    state: BuzzerState,
}

impl Default for Buzzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Buzzer {
    pub fn new() -> Self {
        Self {
            state: BuzzerState::Silent,
        }
    }

    /// Start a continuous tone.
    pub fn tone(&mut self, freq_hz: u32) -> Result<(), ActuatorFault> {
        if !hw_init::ledc_set_freq(hw_init::LEDC_TIMER_BUZZER, freq_hz) {
            warn!("Buzzer: {} Hz not reachable", freq_hz);
            self.stop();
            return Err(ActuatorFault::PwmWriteFailed);
        }
        if !hw_init::ledc_set(hw_init::LEDC_CH_BUZZER, pins::BUZZER_TONE_DUTY) {
            return Err(ActuatorFault::PwmWriteFailed);
        }
        self.state = BuzzerState::Sounding { freq_hz };
        Ok(())
    }

    pub fn stop(&mut self) {
        let _ = hw_init::ledc_set(hw_init::LEDC_CH_BUZZER, 0);
        self.state = BuzzerState::Silent;
    }

    pub fn state(&self) -> BuzzerState {
        self.state
    }

    pub fn is_sounding(&self) -> bool {
        matches!(self.state, BuzzerState::Sounding { .. })
    }
}
