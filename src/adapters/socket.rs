//! Loopback command socket for the companion app bridge.
//!
//! The BLE bridge connects, writes one or more newline-separated tokens
//! and expects `OK\n` back for each accepted line.  One client at a time;
//! each connection carries a single read of up to 4 KiB.

use std::io::{self, ErrorKind, Read, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use log::{error, info};

const MAX_REQUEST_LEN: usize = 4096;
const CLIENT_READ_TIMEOUT: Duration = Duration::from_secs(5);
const ACCEPT_POLL: Duration = Duration::from_millis(50);
const ERROR_BACKOFF: Duration = Duration::from_secs(1);
const ACK: &[u8] = b"OK\n";

pub struct LoopbackListener {
    listener: TcpListener,
}

impl LoopbackListener {
    /// Bind `127.0.0.1:port` (0 picks a free port).
    pub fn bind(port: u16) -> io::Result<Self> {
        let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, port)))?;
        listener.set_nonblocking(true)?;
        info!("SOCKET | listening on {}", listener.local_addr()?);
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept clients until `stop` is set.
    pub fn serve(&self, stop: &AtomicBool, mut on_line: impl FnMut(&str)) {
        while !stop.load(Ordering::Relaxed) {
            match self.listener.accept() {
                Ok((stream, _)) => {
                    if let Err(e) = handle_client(stream, &mut on_line) {
                        error!("SOCKET | client error: {e}");
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
                Err(e) => {
                    error!("SOCKET | accept failed: {e}");
                    thread::sleep(ERROR_BACKOFF);
                }
            }
        }
    }
}

/// Read one request, route every non-empty line and acknowledge each.
/// Returns the number of lines handled.
pub fn handle_client(mut stream: TcpStream, on_line: &mut impl FnMut(&str)) -> io::Result<usize> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(CLIENT_READ_TIMEOUT))?;

    let mut buf = [0u8; MAX_REQUEST_LEN];
    let n = match stream.read(&mut buf) {
        Ok(n) => n,
        Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => return Ok(0),
        Err(e) => return Err(e),
    };

    let text = String::from_utf8_lossy(&buf[..n]);
    let mut handled = 0;
    for line in text.split(['\n', '\r']).map(str::trim).filter(|l| !l.is_empty()) {
        on_line(line);
        stream.write_all(ACK)?;
        handled += 1;
    }
    Ok(handled)
}
