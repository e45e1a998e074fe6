//! Scanner serial feed.
//!
//! The scanner emits plain ASCII frames.  [`ScannerUart::drain`] copies
//! whatever the driver has buffered since the last tick into a fixed
//! chunk and hands it to the caller byte by byte; it never waits.

use crate::drivers::hw_init;

/// Bytes pulled from the driver per call.
const CHUNK: usize = 64;

pub struct ScannerUart {
    chunk: [u8; CHUNK],
    total_bytes: u64,
}

impl Default for ScannerUart {
    fn default() -> Self {
        Self::new()
    }
}

impl ScannerUart {
    pub fn new() -> Self {
        Self {
            chunk: [0; CHUNK],
            total_bytes: 0,
        }
    }

    /// Feed every buffered byte to `sink`.  Returns the byte count.
    pub fn drain(&mut self, mut sink: impl FnMut(u8)) -> usize {
        let mut drained = 0;
        loop {
            let n = hw_init::uart_read(&mut self.chunk);
            if n == 0 {
                break;
            }
            self.chunk[..n].iter().copied().for_each(&mut sink);
            drained += n;
            if n < CHUNK {
                break;
            }
        }
        self.total_bytes += drained as u64;
        drained
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }
}
