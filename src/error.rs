//! Unified error types for the GymGate firmware.
//!
//! A single `Error` enum that every subsystem can convert into, so the boot
//! path and the control loop handle failures uniformly.  All variants are
//! `Copy` and carry no heap data; they pass through the FSM context and the
//! event sink without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A scanned code could not be turned into an access request.
    Scan(ParseError),
    /// The backend exchange could not be started or completed.
    Comms(CommsError),
    /// The backend answered with something we could not understand.
    Protocol(ProtocolError),
    /// An actuator command was refused or modified.
    Actuator(ActuatorFault),
    /// Peripheral initialisation failed.
    Init(&'static str),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scan(e) => write!(f, "scan: {e}"),
            Self::Comms(e) => write!(f, "comms: {e}"),
            Self::Protocol(e) => write!(f, "protocol: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Scan (QR framing) errors
// ---------------------------------------------------------------------------

/// Why a terminated scanner frame was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// No separator between owner and member id.
    MissingSeparator,
    /// More than one separator in the code.
    MultipleSeparators,
    /// Owner or member id is empty.
    EmptyField,
    /// The code exceeded the configured maximum length.
    Overflow,
    /// The code is not valid UTF-8.
    InvalidUtf8,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSeparator => write!(f, "missing separator"),
            Self::MultipleSeparators => write!(f, "more than one separator"),
            Self::EmptyField => write!(f, "empty id field"),
            Self::Overflow => write!(f, "code too long"),
            Self::InvalidUtf8 => write!(f, "invalid UTF-8"),
        }
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Self::Scan(e)
    }
}

// ---------------------------------------------------------------------------
// Communications errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommsError {
    /// The network link is down; nothing was sent.
    LinkDown,
    /// The request body could not be serialised.
    EncodeFailed,
    /// The encoded request does not fit the transport buffer.
    RequestTooLarge,
    /// The transport refused to start the exchange.
    TransportStartFailed,
}

impl fmt::Display for CommsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LinkDown => write!(f, "network link down"),
            Self::EncodeFailed => write!(f, "request encoding failed"),
            Self::RequestTooLarge => write!(f, "request too large"),
            Self::TransportStartFailed => write!(f, "transport failed to start"),
        }
    }
}

impl From<CommsError> for Error {
    fn from(e: CommsError) -> Self {
        Self::Comms(e)
    }
}

// ---------------------------------------------------------------------------
// Backend protocol errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// The status line is not `HTTP/1.x <code> ...`.
    BadStatusLine,
    /// A header line has no `:` or a bad `Content-Length`.
    BadHeader,
    /// The header block never terminated.
    IncompleteHeaders,
    /// Fewer body bytes than `Content-Length` announced.
    TruncatedBody,
    /// A status code the device does not act on.
    UnexpectedStatus(u16),
    /// The body is not one of the known verdict shapes.
    UndecodableBody,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadStatusLine => write!(f, "bad status line"),
            Self::BadHeader => write!(f, "bad header"),
            Self::IncompleteHeaders => write!(f, "incomplete headers"),
            Self::TruncatedBody => write!(f, "truncated body"),
            Self::UnexpectedStatus(code) => write!(f, "unexpected status {code}"),
            Self::UndecodableBody => write!(f, "undecodable body"),
        }
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator faults
// ---------------------------------------------------------------------------

/// Actuator guard conditions.  None of these stop the device; they are
/// logged and counted so a misbehaving caller shows up in the field logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorFault {
    /// A relay engagement asked for longer than the configured ceiling.
    RelayDurationClamped { requested_ms: u32, applied_ms: u32 },
    /// LEDC duty or frequency write failed.
    PwmWriteFailed,
    /// GPIO level write failed.
    GpioWriteFailed,
}

impl fmt::Display for ActuatorFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RelayDurationClamped {
                requested_ms,
                applied_ms,
            } => write!(
                f,
                "relay duration clamped from {requested_ms} ms to {applied_ms} ms"
            ),
            Self::PwmWriteFailed => write!(f, "PWM write failed"),
            Self::GpioWriteFailed => write!(f, "GPIO write failed"),
        }
    }
}

impl From<ActuatorFault> for Error {
    fn from(e: ActuatorFault) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
