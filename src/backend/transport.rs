//! HTTP exchange abstraction.
//!
//! A transport carries exactly one request/response exchange at a time and
//! never blocks: `begin` starts it, `poll` advances it, `abort` drops it.
//!
//! Concrete implementations:
//! - [`TcpHttpTransport`](crate::adapters::http_transport::TcpHttpTransport)
//!   (std `TcpStream`, on the device through ESP-IDF's lwIP sockets)
//! - scripted mocks in the integration tests

use core::fmt;

/// Upper bound on a buffered response (headers + body).
pub const MAX_RESPONSE_BYTES: usize = 4096;

/// One outgoing request.  Always `POST` with a JSON body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub host: heapless::String<64>,
    pub port: u16,
    pub path: heapless::String<64>,
    pub body: Vec<u8>,
}

/// A fully received response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Result of one non-blocking step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangePoll {
    /// Still connecting, sending or receiving.
    Pending,
    Complete(HttpResponse),
    Failed(TransportError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// `begin` while an exchange is in flight.
    Busy,
    /// Host name did not resolve.
    Resolve,
    /// TCP connect refused or timed out.
    Connect,
    /// Socket read/write failed.
    Io,
    /// Peer closed before a complete response arrived.
    Closed,
    /// Response larger than [`MAX_RESPONSE_BYTES`].
    TooLarge,
    /// Response bytes are not HTTP.
    Protocol,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => write!(f, "exchange already in flight"),
            Self::Resolve => write!(f, "host name did not resolve"),
            Self::Connect => write!(f, "connect failed"),
            Self::Io => write!(f, "socket I/O error"),
            Self::Closed => write!(f, "connection closed early"),
            Self::TooLarge => write!(f, "response too large"),
            Self::Protocol => write!(f, "not an HTTP response"),
        }
    }
}

/// Non-blocking single-exchange HTTP client.
pub trait HttpTransport {
    /// Start sending `request`.  Fails with [`TransportError::Busy`] if an
    /// exchange is already in flight.
    fn begin(&mut self, request: &HttpRequest) -> Result<(), TransportError>;

    /// Advance the exchange.  Returns `Pending` when idle, too.
    fn poll(&mut self) -> ExchangePoll;

    /// Drop the in-flight exchange, if any.
    fn abort(&mut self);

    /// `true` when no exchange is in flight.
    fn is_idle(&self) -> bool;
}
