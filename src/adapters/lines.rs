//! Line reassembly for byte-stream command transports.
//!
//! The switch box writes `\n`- or `\r`-terminated tokens over a UART
//! that delivers them in arbitrary chunks.  [`LineAssembler`] buffers a
//! bounded partial line; [`pump_lines`] drives any [`Read`] through it.

use std::io::{ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use log::{error, warn};

/// Longest accepted line (bytes, without terminator).
pub const MAX_LINE_LEN: usize = 128;
/// Pause after a hard read error before trying again.
pub const READ_ERROR_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Default)]
pub struct LineAssembler {
    buf: heapless::Vec<u8, MAX_LINE_LEN>,
    overflowed: bool,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte.  Returns a completed, trimmed, non-empty line.
    pub fn push(&mut self, byte: u8) -> Option<String> {
        if byte == b'\n' || byte == b'\r' {
            let line = if self.overflowed {
                warn!("LINES | dropped over-long line");
                None
            } else {
                let text = String::from_utf8_lossy(&self.buf);
                let trimmed = text.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_owned())
            };
            self.buf.clear();
            self.overflowed = false;
            return line;
        }

        if !self.overflowed && self.buf.push(byte).is_err() {
            self.overflowed = true;
            self.buf.clear();
        }
        None
    }

    /// Feed a chunk, calling `on_line` for every completed line.
    pub fn feed(&mut self, bytes: &[u8], mut on_line: impl FnMut(&str)) {
        for &b in bytes {
            if let Some(line) = self.push(b) {
                on_line(&line);
            }
        }
    }
}

/// Read `reader` until EOF or `stop`, calling `on_line` per line.
///
/// Timeouts are treated as "no data yet".  Other read errors are logged
/// and retried after [`READ_ERROR_BACKOFF`].
pub fn pump_lines<R: Read>(reader: &mut R, stop: &AtomicBool, mut on_line: impl FnMut(&str)) {
    let mut assembler = LineAssembler::new();
    let mut chunk = [0u8; 64];
    while !stop.load(Ordering::Relaxed) {
        match reader.read(&mut chunk) {
            Ok(0) => return,
            Ok(n) => assembler.feed(&chunk[..n], &mut on_line),
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) => {}
            Err(e) => {
                error!("LINES | read error: {e}");
                thread::sleep(READ_ERROR_BACKOFF);
            }
        }
    }
}
