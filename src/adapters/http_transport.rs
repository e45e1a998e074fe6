//! Plain-TCP HTTP/1.1 transport.
//!
//! Implements [`HttpTransport`] over a `std::net::TcpStream`.  ESP-IDF
//! ships a std networking layer on top of lwIP, so the same code runs on
//! the device and on the host.
//!
//! ## Exchange model
//!
//! 1. `begin()` encodes the request and returns immediately.
//! 2. Polls in the resolving phase wait on a background DNS lookup.  The
//!    lookup runs on its own thread, so `getaddrinfo` never blocks the
//!    control loop.  IP literals skip it, and a resolved address is cached
//!    until a connect to it fails.
//! 3. The next poll connects, bounded by [`CONNECT_BOUND`]; this is the
//!    only wait inside a tick.  The socket is switched to non-blocking
//!    mode straight after.
//! 4. Later polls write the request, then read until the response parses
//!    or the peer closes.  `WouldBlock` means "come back next tick".
//! 5. `abort()` drops the socket; the next exchange starts clean.  A
//!    lookup still in flight is kept and picked up by the next exchange
//!    to the same host.

use core::time::Duration;
use std::io::{ErrorKind, Read, Write};
use std::net::{IpAddr, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use log::{debug, info, warn};

use crate::backend::http::{self, ParseStatus};
use crate::error::ProtocolError;
use crate::backend::transport::{
    ExchangePoll, HttpRequest, HttpTransport, MAX_RESPONSE_BYTES, TransportError,
};

/// Upper bound on the blocking connect inside one tick.
pub const CONNECT_BOUND: Duration = Duration::from_millis(100);

/// Bytes pulled from the socket per read call.
const READ_CHUNK: usize = 512;

/// Stack for the lookup thread; lwIP's resolver needs a few KiB.
const RESOLVER_STACK_BYTES: usize = 6 * 1024;

type ResolveFn = fn(&str, u16) -> Option<SocketAddr>;

fn system_resolve(host: &str, port: u16) -> Option<SocketAddr> {
    (host, port).to_socket_addrs().ok()?.next()
}

/// A DNS lookup running on its own thread.
struct Lookup {
    host: heapless::String<64>,
    port: u16,
    rx: Receiver<Option<SocketAddr>>,
}

impl Lookup {
    fn spawn(
        host: &heapless::String<64>,
        port: u16,
        resolve: ResolveFn,
    ) -> Result<Self, TransportError> {
        let (tx, rx) = mpsc::channel();
        let name = host.clone();
        thread::Builder::new()
            .name("dns".into())
            .stack_size(RESOLVER_STACK_BYTES)
            .spawn(move || {
                // The receiver is gone if the host changed meanwhile.
                let _ = tx.send(resolve(name.as_str(), port));
            })
            .map_err(|_| TransportError::Resolve)?;
        Ok(Self {
            host: host.clone(),
            port,
            rx,
        })
    }

    fn is_for(&self, host: &str, port: u16) -> bool {
        self.host == host && self.port == port
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Resolving,
    Connecting,
    Sending,
    Receiving,
}

pub struct TcpHttpTransport {
    phase: Phase,
    connect_bound: Duration,
    host: heapless::String<64>,
    port: u16,
    outbound: Vec<u8>,
    written: usize,
    inbound: Vec<u8>,
    stream: Option<TcpStream>,
    resolver: ResolveFn,
    lookup: Option<Lookup>,
    /// Last successful lookup: host, port, address.
    resolved: Option<(heapless::String<64>, u16, SocketAddr)>,
    addr: Option<SocketAddr>,
}

impl Default for TcpHttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl TcpHttpTransport {
    pub fn new() -> Self {
        Self::with_connect_bound(CONNECT_BOUND)
    }

    pub fn with_connect_bound(connect_bound: Duration) -> Self {
        Self {
            phase: Phase::Idle,
            connect_bound,
            host: heapless::String::new(),
            port: 0,
            outbound: Vec::new(),
            written: 0,
            inbound: Vec::new(),
            stream: None,
            resolver: system_resolve,
            lookup: None,
            resolved: None,
            addr: None,
        }
    }

    fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.stream = None;
        self.addr = None;
        self.outbound.clear();
        self.inbound.clear();
        self.written = 0;
    }

    fn fail(&mut self, e: TransportError) -> ExchangePoll {
        debug!("http: {}:{} failed: {}", self.host, self.port, e);
        self.reset();
        ExchangePoll::Failed(e)
    }

    /// Address for the current host.  `Ok(None)` while the lookup runs.
    fn resolve(&mut self) -> Result<Option<SocketAddr>, TransportError> {
        if let Ok(ip) = self.host.parse::<IpAddr>() {
            return Ok(Some(SocketAddr::new(ip, self.port)));
        }
        if let Some((host, port, addr)) = &self.resolved {
            if *host == self.host && *port == self.port {
                return Ok(Some(*addr));
            }
        }

        let lookup = match self.lookup.take() {
            Some(l) if l.is_for(&self.host, self.port) => l,
            _ => Lookup::spawn(&self.host, self.port, self.resolver)?,
        };
        match lookup.rx.try_recv() {
            Ok(Some(addr)) => {
                info!("http: {} resolved to {}", self.host, addr.ip());
                self.resolved = Some((self.host.clone(), self.port, addr));
                Ok(Some(addr))
            }
            Ok(None) | Err(TryRecvError::Disconnected) => Err(TransportError::Resolve),
            Err(TryRecvError::Empty) => {
                self.lookup = Some(lookup);
                Ok(None)
            }
        }
    }

    fn connect(&mut self, addr: SocketAddr) -> Result<(), TransportError> {
        let stream = match TcpStream::connect_timeout(&addr, self.connect_bound) {
            Ok(stream) => stream,
            Err(_) => {
                // The host may have moved; look it up again next time.
                self.resolved = None;
                return Err(TransportError::Connect);
            }
        };
        stream.set_nonblocking(true).map_err(|_| TransportError::Io)?;
        // Best effort; the request is a single write anyway.
        let _ = stream.set_nodelay(true);
        self.stream = Some(stream);
        Ok(())
    }

    /// Push pending request bytes.  `Ok(true)` once everything is out.
    fn send(&mut self) -> Result<bool, TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::Closed)?;
        while self.written < self.outbound.len() {
            match stream.write(&self.outbound[self.written..]) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => self.written += n,
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => return Ok(false),
                Err(ref e) if e.kind() == ErrorKind::Interrupted => {}
                Err(_) => return Err(TransportError::Io),
            }
        }
        Ok(true)
    }

    /// Drain the socket.  `Ok(true)` when the peer has closed.
    fn receive(&mut self) -> Result<bool, TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::Closed)?;
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match stream.read(&mut chunk) {
                Ok(0) => return Ok(true),
                Ok(n) => {
                    if self.inbound.len() + n > MAX_RESPONSE_BYTES {
                        return Err(TransportError::TooLarge);
                    }
                    self.inbound.extend_from_slice(&chunk[..n]);
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => return Ok(false),
                Err(ref e) if e.kind() == ErrorKind::Interrupted => {}
                Err(_) => return Err(TransportError::Io),
            }
        }
    }
}

impl HttpTransport for TcpHttpTransport {
    fn begin(&mut self, request: &HttpRequest) -> Result<(), TransportError> {
        if self.phase != Phase::Idle {
            return Err(TransportError::Busy);
        }
        self.reset();
        self.host = request.host.clone();
        self.port = request.port;
        self.outbound = http::encode_request(request);
        self.phase = Phase::Resolving;
        debug!(
            "http: POST {}:{}{} ({} bytes)",
            self.host,
            self.port,
            request.path,
            request.body.len()
        );
        Ok(())
    }

    fn poll(&mut self) -> ExchangePoll {
        if self.phase == Phase::Idle {
            return ExchangePoll::Pending;
        }

        if self.phase == Phase::Resolving {
            match self.resolve() {
                Ok(Some(addr)) => {
                    self.addr = Some(addr);
                    self.phase = Phase::Connecting;
                }
                Ok(None) => return ExchangePoll::Pending,
                Err(e) => return self.fail(e),
            }
        }

        if self.phase == Phase::Connecting {
            let Some(addr) = self.addr else {
                return self.fail(TransportError::Resolve);
            };
            if let Err(e) = self.connect(addr) {
                return self.fail(e);
            }
            self.phase = Phase::Sending;
        }

        if self.phase == Phase::Sending {
            match self.send() {
                Ok(true) => self.phase = Phase::Receiving,
                Ok(false) => return ExchangePoll::Pending,
                Err(e) => return self.fail(e),
            }
        }

        let eof = match self.receive() {
            Ok(eof) => eof,
            Err(e) => return self.fail(e),
        };

        match http::parse_response(&self.inbound, eof) {
            Ok(ParseStatus::Done(response)) => {
                self.reset();
                ExchangePoll::Complete(response)
            }
            Ok(ParseStatus::Incomplete) if eof => self.fail(TransportError::Closed),
            Ok(ParseStatus::Incomplete) => ExchangePoll::Pending,
            // Cut off mid-response: a link problem, not a contract breach.
            Err(ProtocolError::IncompleteHeaders | ProtocolError::TruncatedBody) if eof => {
                self.fail(TransportError::Closed)
            }
            Err(e) => {
                warn!("http: unparseable response from {}: {}", self.host, e);
                self.fail(TransportError::Protocol)
            }
        }
    }

    fn abort(&mut self) {
        if self.phase != Phase::Idle {
            debug!("http: exchange with {}:{} aborted", self.host, self.port);
        }
        self.reset();
    }

    fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }
}
