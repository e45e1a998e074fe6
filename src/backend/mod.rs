//! Backend validation service client.
//!
//! ```text
//!   AccessController ──▶ ValidationPort ──▶ ValidationClient ──▶ HttpTransport
//!                                              │  wire (JSON)
//!                                              └─ http (HTTP/1.1 codec)
//! ```

pub mod client;
pub mod http;
pub mod transport;
pub mod wire;

pub use client::ValidationClient;
pub use transport::{ExchangePoll, HttpRequest, HttpResponse, HttpTransport, TransportError};
