//! GymGate access controller firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod backend;
pub mod config;
pub mod connectivity;
pub mod diagnostics;
pub mod error;
pub mod feedback;
pub mod fsm;
pub mod pins;
pub mod scanner;

// Platform modules; simulation stubs on the host.
pub mod adapters;
pub mod drivers;
