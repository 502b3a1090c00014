//! Unified error types for the fill controller.
//!
//! A single `Error` enum that every fallible subsystem converts into,
//! keeping the binary's startup and wiring code uniform.  Sensor-side
//! faults are deliberately absent: they travel as
//! [`FaultKind`](crate::sensors::FaultKind) values inside a degraded
//! reading, never as errors.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The sensor or power transport failed at the I/O layer.
    Transport(TransportError),
    /// A relay output could not be driven.
    Actuator(ActuatorError),
    /// Presets or totals could not be loaded or persisted.
    Store(StoreError),
    /// Configuration is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Store(e) => write!(f, "store: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// Socket-level failure (connect, read, write, timeout).
    Io(std::io::ErrorKind),
    /// The IO-Link master answered with an error code.
    DeviceRejected(u8),
    /// The response was shorter than its fixed header.
    ShortResponse(usize),
    /// Logical port outside 0–3.
    PortOutOfRange(u8),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(kind) => write!(f, "I/O error ({kind})"),
            Self::DeviceRejected(code) => write!(f, "device rejected request (code {code})"),
            Self::ShortResponse(n) => write!(f, "short response ({n} bytes)"),
            Self::PortOutOfRange(p) => write!(f, "port {p} out of range (0-3)"),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.kind())
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// Driving the output active failed.
    ActivateFailed,
    /// Driving the output inactive failed; the relay may be stuck on.
    ReleaseFailed,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ActivateFailed => write!(f, "GPIO write (active) failed"),
            Self::ReleaseFailed => write!(f, "GPIO write (inactive) failed"),
        }
    }
}

impl std::error::Error for ActuatorError {}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// Filesystem failure.
    Io(std::io::ErrorKind),
    /// The stored document could not be parsed.
    Corrupted,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(kind) => write!(f, "I/O error ({kind})"),
            Self::Corrupted => write!(f, "document corrupted"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.kind())
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
