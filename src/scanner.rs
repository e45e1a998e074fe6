//! QR input assembler.
//!
//! Accumulates raw scanner bytes into a bounded buffer and turns each
//! terminated frame of the form `<owner><SEP><member>` into an
//! [`AccessRequest`].  Malformed frames are dropped and counted; the
//! buffer is always empty after a terminator.

use log::{debug, warn};

use crate::config::{QR_BUFFER_CAPACITY, SystemConfig};
use crate::error::ParseError;

/// One decoded scan.  Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRequest {
    pub owner_id: String,
    pub member_id: String,
    /// Tick clock reading when the terminator arrived.
    pub received_at_ms: u64,
}

pub struct QrAssembler {
    buf: heapless::Vec<u8, QR_BUFFER_CAPACITY>,
    max_len: usize,
    separator: u8,
    terminator: u8,
    stale_timeout_ms: u32,
    last_byte_ms: u64,
    /// A `\r` seen but not yet committed; dropped if the terminator follows.
    pending_cr: bool,
    /// Swallowing the tail of an oversize code until the next terminator.
    discarding: bool,
    last_error: Option<ParseError>,
    failures: u32,
}

impl QrAssembler {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            buf: heapless::Vec::new(),
            max_len: (config.qr_max_len as usize).min(QR_BUFFER_CAPACITY),
            separator: config.qr_separator,
            terminator: config.qr_terminator,
            stale_timeout_ms: config.scan_stale_timeout_ms,
            last_byte_ms: 0,
            pending_cr: false,
            discarding: false,
            last_error: None,
            failures: 0,
        }
    }

    /// Feed one byte.  Returns a request when `byte` completes a valid code.
    pub fn push(&mut self, byte: u8, now_ms: u64) -> Option<AccessRequest> {
        if byte == self.terminator {
            return self.terminate(now_ms);
        }

        self.last_byte_ms = now_ms;
        if self.discarding {
            return None;
        }

        if byte == b'\r' && self.separator != b'\r' {
            if self.pending_cr {
                self.append(b'\r')?;
            }
            self.pending_cr = true;
            return None;
        }

        if self.pending_cr {
            self.pending_cr = false;
            self.append(b'\r')?;
        }
        self.append(byte)?;
        None
    }

    /// Drop a partial code that has been idle for the stale timeout.
    /// Returns `true` if something was discarded.
    pub fn expire_stale(&mut self, now_ms: u64) -> bool {
        if !self.has_partial() {
            return false;
        }
        if now_ms.saturating_sub(self.last_byte_ms) < u64::from(self.stale_timeout_ms) {
            return false;
        }
        debug!("QR: discarding stale partial code ({} bytes)", self.buf.len());
        self.reset();
        true
    }

    /// `true` while bytes of an unfinished code are buffered (or an
    /// oversize code is being swallowed).
    pub fn has_partial(&self) -> bool {
        !self.buf.is_empty() || self.pending_cr || self.discarding
    }

    pub fn len(&self) -> usize {
        self.buf.len() + usize::from(self.pending_cr)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn reset(&mut self) {
        self.buf.clear();
        self.pending_cr = false;
        self.discarding = false;
    }

    /// Most recent framing failure, if any.
    pub fn last_error(&self) -> Option<ParseError> {
        self.last_error
    }

    /// Total frames rejected since boot (wrapping).
    pub fn failure_count(&self) -> u32 {
        self.failures
    }

    // -- internals ----------------------------------------------------------

    /// Append a byte, entering overflow mode if the buffer is already full.
    /// `None` means the code was discarded.
    fn append(&mut self, byte: u8) -> Option<()> {
        if self.buf.len() >= self.max_len || self.buf.push(byte).is_err() {
            self.buf.clear();
            self.pending_cr = false;
            self.discarding = true;
            self.record(ParseError::Overflow);
            return None;
        }
        Some(())
    }

    fn terminate(&mut self, now_ms: u64) -> Option<AccessRequest> {
        self.pending_cr = false;
        if self.discarding {
            self.discarding = false;
            return None;
        }
        if self.buf.is_empty() {
            return None;
        }

        let result = parse_frame(&self.buf, self.separator, now_ms);
        self.buf.clear();
        match result {
            Ok(req) => Some(req),
            Err(e) => {
                self.record(e);
                None
            }
        }
    }

    fn record(&mut self, e: ParseError) {
        warn!("QR: rejected scan: {e}");
        self.last_error = Some(e);
        self.failures = self.failures.wrapping_add(1);
    }
}

/// Split one terminated frame into owner and member id.
pub fn parse_frame(raw: &[u8], separator: u8, now_ms: u64) -> Result<AccessRequest, ParseError> {
    let text = core::str::from_utf8(raw).map_err(|_| ParseError::InvalidUtf8)?;

    let mut seps = raw.iter().enumerate().filter(|&(_, &b)| b == separator);
    let Some((at, _)) = seps.next() else {
        return Err(ParseError::MissingSeparator);
    };
    if seps.next().is_some() {
        return Err(ParseError::MultipleSeparators);
    }

    // `at` is a byte index of an ASCII separator, so both halves are
    // char-boundary aligned whenever the separator is ASCII.
    let (owner, member) = match (text.get(..at), text.get(at + 1..)) {
        (Some(o), Some(m)) => (o, m),
        _ => return Err(ParseError::InvalidUtf8),
    };
    if owner.is_empty() || member.is_empty() {
        return Err(ParseError::EmptyField);
    }

    Ok(AccessRequest {
        owner_id: owner.to_owned(),
        member_id: member.to_owned(),
        received_at_ms: now_ms,
    })
}
