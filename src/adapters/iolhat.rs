//! IOL-HAT adapter: IO-Link master daemon on the loopback interface.
//!
//! Implements [`SensorTransport`] (process-data read) and [`PowerLine`]
//! (port power) over the daemon's one-request-per-connection TCP
//! protocol:
//!
//! | Request        | Bytes                         | Response                       |
//! |----------------|-------------------------------|--------------------------------|
//! | process data   | `[3, port', len_out=0, len]`  | 4-byte header then payload     |
//! | port power     | `[1, port', on]`              | 2 bytes = error `[_, code]`    |
//!
//! `port'` is the port on its master: logical ports 0–1 and 2–3 share
//! the same daemon and map to 0–1.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::thread;
use std::time::Duration;

use log::debug;

use crate::app::ports::{PowerLine, SensorTransport};
use crate::error::TransportError;
use crate::sensors::frame::{Frame, MAX_FRAME_LEN};

const CMD_POWER: u8 = 1;
const CMD_PROCESS_DATA: u8 = 3;
const PD_HEADER_LEN: usize = 4;
const RECV_BUF_LEN: usize = 1024;
/// Pause after each process-data request so the daemon is not flooded.
const INTER_REQUEST_GAP: Duration = Duration::from_millis(4);

#[derive(Debug, Clone)]
pub struct IolHatClient {
    addr: SocketAddr,
    timeout: Duration,
}

impl IolHatClient {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            timeout: Duration::from_secs(1),
        }
    }

    /// Connect/read/write timeout per request.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send one request on a fresh connection and read one response.
    fn request(&self, msg: &[u8], buf: &mut [u8]) -> Result<usize, TransportError> {
        let mut stream = TcpStream::connect_timeout(&self.addr, self.timeout)?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;
        stream.write_all(msg)?;
        let n = stream.read(buf)?;
        debug!("IOL | sent {msg:02x?}, received {n} bytes");
        Ok(n)
    }
}

/// Logical port → port on its master.
fn master_port(port: u8) -> Result<u8, TransportError> {
    match port {
        0 | 1 => Ok(port),
        2 | 3 => Ok(port - 2),
        _ => Err(TransportError::PortOutOfRange(port)),
    }
}

impl SensorTransport for IolHatClient {
    fn exchange(&mut self, port: u8, len: usize) -> Result<Frame, TransportError> {
        let len_in = len.min(MAX_FRAME_LEN) as u8;
        let msg = [CMD_PROCESS_DATA, master_port(port)?, 0, len_in];
        let mut buf = [0u8; RECV_BUF_LEN];
        let n = self.request(&msg, &mut buf)?;
        thread::sleep(INTER_REQUEST_GAP);

        if n == 2 {
            return Err(TransportError::DeviceRejected(buf[1]));
        }
        if n < PD_HEADER_LEN {
            return Err(TransportError::ShortResponse(n));
        }
        Ok(buf[PD_HEADER_LEN..n]
            .iter()
            .take(MAX_FRAME_LEN)
            .copied()
            .collect())
    }
}

impl PowerLine for IolHatClient {
    fn set_power(&mut self, port: u8, on: bool) -> Result<(), TransportError> {
        let msg = [CMD_POWER, master_port(port)?, u8::from(on)];
        let mut buf = [0u8; RECV_BUF_LEN];
        let n = self.request(&msg, &mut buf)?;
        if n == 2 {
            return Err(TransportError::DeviceRejected(buf[1]));
        }
        Ok(())
    }
}
