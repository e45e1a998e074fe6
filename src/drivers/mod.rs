//! Actuator drivers, hardware initialisation, and peripheral helpers.

pub mod button;
pub mod buzzer;
pub mod hw_init;
pub mod indicator;
pub mod relay;
pub mod uart;
pub mod watchdog;
