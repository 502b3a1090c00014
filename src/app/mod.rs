//! Application core: domain orchestration behind port traits.
//!
//! The poller ([`service::FillService`]) and the command router talk to
//! hardware, screen and storage only through the traits in [`ports`],
//! which keeps this layer testable without a Raspberry Pi.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
