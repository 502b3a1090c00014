//! Tank fill controller core.
//!
//! Reads a totalizing flow meter, predicts how far the fill will coast
//! after shutoff and pulses the stop relay early enough to land on
//! target, while routing switch-box and app commands by active screen.
//! Everything hardware-specific sits behind the traits in
//! [`app::ports`]; the Raspberry Pi wiring is behind feature `rpi`.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod control;
pub mod drivers;
pub mod error;
pub mod pins;
pub mod router;
pub mod safety;
pub mod sensors;
pub mod session;
