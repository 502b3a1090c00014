//! Timed relay driver.
//!
//! [`RelayActuator`] wraps any `embedded_hal` output pin (active HIGH)
//! and runs blocking pulses.  [`PulseWorker`] runs those pulses on their
//! own thread so neither the poller nor the command listeners wait on
//! them, and keeps at most one pulse in flight per relay.  Call sites that
//! drive the same relay share one guard through [`PulseWorker::sharing`].
//!
//! ## Safety contract
//!
//! A pulse always ends with an attempt to drive the output inactive,
//! even when driving it active failed.  There is no mid-pulse
//! cancellation.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use embedded_hal::digital::OutputPin;
use log::{error, info, warn};

use crate::error::ActuatorError;
use crate::session::lock;

/// Anything that can run a blocking relay pulse.
pub trait Relay: Send + Sync {
    /// Drive active, hold for `duration`, drive inactive.
    fn pulse(&self, duration: Duration) -> Result<(), ActuatorError>;

    /// Short name used in log lines.
    fn label(&self) -> &'static str;
}

pub struct RelayActuator<P> {
    pin: Mutex<P>,
    label: &'static str,
}

impl<P: OutputPin + Send> RelayActuator<P> {
    /// Take ownership of `pin` and drive it inactive.
    pub fn new(mut pin: P, label: &'static str) -> Self {
        if pin.set_low().is_err() {
            warn!("RELAY | {label}: initial set_low failed");
        }
        Self {
            pin: Mutex::new(pin),
            label,
        }
    }
}

impl<P: OutputPin + Send> Relay for RelayActuator<P> {
    fn pulse(&self, duration: Duration) -> Result<(), ActuatorError> {
        let activated = lock(&self.pin).set_high().map_err(|_| ActuatorError::ActivateFailed);
        match activated {
            Ok(()) => {
                info!("RELAY | {} on for {:.1}s", self.label, duration.as_secs_f64());
                thread::sleep(duration);
            }
            Err(e) => error!("RELAY | {}: {e}", self.label),
        }

        let released = lock(&self.pin).set_low().map_err(|_| ActuatorError::ReleaseFailed);
        match released {
            Ok(()) => info!("RELAY | {} off", self.label),
            Err(e) => error!("RELAY | {}: {e}", self.label),
        }

        activated.and(released)
    }

    fn label(&self) -> &'static str {
        self.label
    }
}

// ───────────────────────────────────────────────────────────────
// PulseWorker
// ───────────────────────────────────────────────────────────────

/// Fire-and-forget pulses with an in-flight guard.
#[derive(Clone)]
pub struct PulseWorker {
    relay: Arc<dyn Relay>,
    in_flight: Arc<AtomicBool>,
    name: &'static str,
}

impl PulseWorker {
    /// `name` identifies the call site (and the worker thread).
    pub fn new(relay: Arc<dyn Relay>, name: &'static str) -> Self {
        Self {
            relay,
            in_flight: Arc::new(AtomicBool::new(false)),
            name,
        }
    }

    /// Pulse now.  Returns false if a pulse on this relay is still
    /// running.
    pub fn fire(&self, duration: Duration) -> bool {
        self.fire_after(Duration::ZERO, duration)
    }

    /// Wait `delay`, then pulse.  Returns false if this worker already
    /// has a pulse scheduled or running.
    pub fn fire_after(&self, delay: Duration, duration: Duration) -> bool {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!("RELAY | {}: pulse already in flight, dropped", self.name);
            return false;
        }

        let relay = Arc::clone(&self.relay);
        let in_flight = Arc::clone(&self.in_flight);
        let spawned = thread::Builder::new().name(self.name.into()).spawn(move || {
            let _clear = ClearOnDrop(in_flight);
            if !delay.is_zero() {
                thread::sleep(delay);
            }
            // Errors are already logged by the relay.
            let _ = relay.pulse(duration);
        });

        if let Err(e) = spawned {
            // The closure (and its guard) was dropped with the failed spawn.
            error!("RELAY | {}: failed to spawn pulse worker: {e}", self.name);
            return false;
        }
        true
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Block until no pulse is in flight or `timeout` elapses.  Returns
    /// true if idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.is_in_flight() {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(2));
        }
        true
    }

    /// A second call site on the same relay.  Both share one in-flight
    /// guard, so neither can cut the other's pulse short.
    pub fn sharing(&self, name: &'static str) -> Self {
        Self {
            relay: Arc::clone(&self.relay),
            in_flight: Arc::clone(&self.in_flight),
            name,
        }
    }
}

struct ClearOnDrop(Arc<AtomicBool>);

impl Drop for ClearOnDrop {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
