//! Supervised flow-meter link.
//!
//! One [`SensorLink::poll`] per tick: fetch a frame, decode it, watch for
//! frozen (byte-identical) frames and hand back a [`FlowReading`].  Any
//! fault produces a degraded reading and asks for a sensor power-cycle.
//!
//! ## Recovery
//!
//! Power-cycles run on their own short-lived thread so the poller never
//! waits on them.  [`RecoveryGuard`] rate-limits them: a new cycle starts
//! only when none is in flight and the previous attempt is older than
//! the minimum interval.  The in-flight flag is owned by a
//! [`RecoveryTicket`] whose `Drop` clears it, so a worker that errors or
//! panics half-way still releases the guard.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{error, info, warn};

use super::frame::{self, Frame};
use super::{FaultKind, FlowReading};
use crate::app::ports::{PowerLine, SensorTransport};
use crate::config::ControllerConfig;
use crate::session::lock;

/// Link timing and framing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkSettings {
    pub port: u8,
    pub frame_len: usize,
    pub poll_interval: Duration,
    pub stale_limit: u32,
    pub disconnect_timeout: Duration,
    pub recovery_interval: Duration,
    pub settle: Duration,
    pub handshake: Duration,
}

impl LinkSettings {
    pub fn from_config(cfg: &ControllerConfig) -> Self {
        Self {
            port: cfg.sensor_port,
            frame_len: cfg.frame_len,
            poll_interval: cfg.poll_interval(),
            stale_limit: cfg.stale_frame_limit,
            disconnect_timeout: cfg.disconnect_timeout(),
            recovery_interval: cfg.recovery_interval(),
            settle: cfg.recovery_settle(),
            handshake: cfg.recovery_handshake(),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Recovery rate limiter
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryState {
    pub in_progress: bool,
    pub last_attempt_at: Option<Instant>,
}

/// Shared reentrancy guard for the power-cycle path.
#[derive(Debug, Clone, Default)]
pub struct RecoveryGuard {
    state: Arc<Mutex<RecoveryState>>,
}

impl RecoveryGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the recovery slot.  `None` if a recovery is running or the
    /// last attempt is not yet older than `min_interval`.
    pub fn try_begin(&self, now: Instant, min_interval: Duration) -> Option<RecoveryTicket> {
        let mut st = lock(&self.state);
        if st.in_progress {
            return None;
        }
        if let Some(last) = st.last_attempt_at {
            if now.saturating_duration_since(last) <= min_interval {
                return None;
            }
        }
        st.in_progress = true;
        st.last_attempt_at = Some(now);
        Some(RecoveryTicket {
            state: Arc::clone(&self.state),
        })
    }

    pub fn state(&self) -> RecoveryState {
        *lock(&self.state)
    }
}

/// Proof that the holder owns the recovery slot.  Dropping it releases
/// the slot.
#[derive(Debug)]
pub struct RecoveryTicket {
    state: Arc<Mutex<RecoveryState>>,
}

impl Drop for RecoveryTicket {
    fn drop(&mut self) {
        lock(&self.state).in_progress = false;
    }
}

// ───────────────────────────────────────────────────────────────
// Diagnostics
// ───────────────────────────────────────────────────────────────

/// Connection and fault summary for the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkStatus {
    pub connected: bool,
    pub fault: Option<FaultKind>,
    pub consecutive_failures: u32,
    /// How long the frame has been frozen (zero unless stale).
    pub stale_for: Duration,
    pub last_success_at: Instant,
    pub recovery_in_progress: bool,
    pub recoveries_started: u32,
}

// ───────────────────────────────────────────────────────────────
// SensorLink
// ───────────────────────────────────────────────────────────────

pub struct SensorLink<T, P> {
    transport: T,
    power: Arc<Mutex<P>>,
    settings: LinkSettings,
    recovery: RecoveryGuard,
    worker: Option<JoinHandle<()>>,
    /// Last frame that decoded cleanly.
    last_frame: Option<Frame>,
    /// Length of the current run of identical frames, counting the first.
    identical_run: u32,
    last_good: (f64, f64),
    last_success_at: Instant,
    consecutive_failures: u32,
    fault: Option<FaultKind>,
    stale_for: Duration,
    recoveries_started: u32,
}

impl<T, P> SensorLink<T, P>
where
    T: SensorTransport,
    P: PowerLine + Send + 'static,
{
    pub fn new(transport: T, power: P, settings: LinkSettings) -> Self {
        Self {
            transport,
            power: Arc::new(Mutex::new(power)),
            settings,
            recovery: RecoveryGuard::new(),
            worker: None,
            last_frame: None,
            identical_run: 0,
            last_good: (0.0, 0.0),
            last_success_at: Instant::now(),
            consecutive_failures: 0,
            fault: None,
            stale_for: Duration::ZERO,
            recoveries_started: 0,
        }
    }

    pub fn poll(&mut self) -> FlowReading {
        self.poll_at(Instant::now())
    }

    /// One acquisition cycle, timestamped `now`.
    pub fn poll_at(&mut self, now: Instant) -> FlowReading {
        let raw = match self.transport.exchange(self.settings.port, self.settings.frame_len) {
            Ok(raw) => raw,
            Err(e) => {
                if self.fault != Some(FaultKind::TransportError) {
                    warn!("LINK | transport error on port {}: {e}", self.settings.port);
                }
                return self.fail(FaultKind::TransportError, now);
            }
        };

        let (totalizer, flow_rate) = match frame::decode(&raw, self.settings.frame_len) {
            Ok(values) => values,
            Err(kind) => return self.fail(kind, now),
        };

        if self.last_frame.as_ref() == Some(&raw) {
            self.identical_run = self.identical_run.saturating_add(1);
        } else {
            self.identical_run = 1;
            self.last_frame = Some(raw);
        }

        if self.identical_run >= self.settings.stale_limit {
            self.stale_for = self.settings.poll_interval * self.identical_run;
            return self.fail(FaultKind::Stale, now);
        }

        if let Some(prev) = self.fault.take() {
            info!(
                "LINK | recovered from {prev} after {} failed polls",
                self.consecutive_failures
            );
        }
        self.consecutive_failures = 0;
        self.stale_for = Duration::ZERO;
        self.last_success_at = now;
        self.last_good = (totalizer, flow_rate);
        FlowReading::live(totalizer, flow_rate, now)
    }

    fn fail(&mut self, kind: FaultKind, now: Instant) -> FlowReading {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.fault != Some(kind) {
            match kind {
                FaultKind::Stale => warn!(
                    "LINK | frame frozen for {} polls ({:.1}s)",
                    self.identical_run,
                    self.stale_for.as_secs_f64()
                ),
                FaultKind::TransportError => {}
                other => warn!("LINK | {other}"),
            }
        }
        self.fault = Some(kind);
        self.request_recovery(now);
        FlowReading::degraded(self.last_good, kind, now)
    }

    /// Start a power-cycle if the rate limiter allows it.  Never blocks.
    /// Returns true if a recovery worker was started.
    pub fn request_recovery(&mut self, now: Instant) -> bool {
        let Some(ticket) = self.recovery.try_begin(now, self.settings.recovery_interval) else {
            return false;
        };

        let power = Arc::clone(&self.power);
        let LinkSettings {
            port,
            settle,
            handshake,
            ..
        } = self.settings;

        let spawned = thread::Builder::new()
            .name("sensor-recovery".into())
            .spawn(move || {
                let _ticket = ticket;
                power_cycle(&power, port, settle, handshake);
            });

        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                self.recoveries_started += 1;
                true
            }
            Err(e) => {
                error!("LINK | failed to spawn recovery worker: {e}");
                false
            }
        }
    }

    /// Wait for the most recent recovery worker to finish.
    pub fn join_recovery(&mut self) {
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                error!("LINK | recovery worker panicked");
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn last_success_at(&self) -> Instant {
        self.last_success_at
    }

    /// Connected unless the last clean read is older than the timeout.
    pub fn is_connected(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_success_at) <= self.settings.disconnect_timeout
    }

    pub fn fault(&self) -> Option<FaultKind> {
        self.fault
    }

    pub fn recovery_state(&self) -> RecoveryState {
        self.recovery.state()
    }

    pub fn settings(&self) -> &LinkSettings {
        &self.settings
    }

    pub fn status(&self, now: Instant) -> LinkStatus {
        LinkStatus {
            connected: self.is_connected(now),
            fault: self.fault,
            consecutive_failures: self.consecutive_failures,
            stale_for: self.stale_for,
            last_success_at: self.last_success_at,
            recovery_in_progress: self.recovery.state().in_progress,
            recoveries_started: self.recoveries_started,
        }
    }
}

fn power_cycle<P: PowerLine>(power: &Mutex<P>, port: u8, settle: Duration, handshake: Duration) {
    warn!("LINK | power-cycling sensor on port {port}");
    if let Err(e) = lock(power).set_power(port, false) {
        error!("LINK | recovery: power off failed: {e}");
        return;
    }
    thread::sleep(settle);
    if let Err(e) = lock(power).set_power(port, true) {
        error!("LINK | recovery: power on failed: {e}");
        return;
    }
    thread::sleep(handshake);
    info!("LINK | power cycle on port {port} complete");
}
