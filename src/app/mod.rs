//! Application core: access-control logic, zero I/O.
//!
//! This module contains the orchestration rules for the gate: the FSM
//! driving each access attempt, retry policy, and periodic status
//! reporting.  All interaction with hardware and the network happens
//! through **port traits** defined in [`ports`], keeping this layer fully
//! testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
