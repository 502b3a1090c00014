//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements                  | Connects to                  |
//! |------------|-----------------------------|------------------------------|
//! | `iolhat`   | SensorTransport, PowerLine  | IOL-HAT daemon (TCP loopback)|
//! | `headless` | ScreenPort                  | nothing (logs only)          |
//! | `store`    | FillStore                   | JSON file / memory           |
//! | `log_sink` | EventSink                   | `log` facade                 |
//! | `lines`    | -                           | UART byte stream → lines     |
//! | `socket`   | -                           | app bridge loopback socket   |
//! | `rpi`      | -                           | GPIO relays, UART (`rpi`)    |

pub mod headless;
pub mod iolhat;
pub mod lines;
pub mod log_sink;
#[cfg(feature = "rpi")]
pub mod rpi;
pub mod socket;
pub mod store;
