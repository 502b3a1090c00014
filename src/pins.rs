//! GPIO / peripheral assignments for the fill controller box.
//!
//! Single source of truth: the config defaults and the Raspberry Pi
//! adapters reference this module rather than hard-coding numbers.
//! All GPIO numbers are BCM numbering.

// ---------------------------------------------------------------------------
// Relays
// ---------------------------------------------------------------------------

/// Digital output: pump-stop / auto-alert relay (active HIGH).
pub const PUMP_STOP_RELAY_GPIO: u8 = 27;
/// Digital output: flow-meter totalizer reset relay K3 (active HIGH).
pub const FLOW_RESET_RELAY_GPIO: u8 = 0;

// ---------------------------------------------------------------------------
// IO-Link master (IOL-HAT)
// ---------------------------------------------------------------------------

/// IO-Link port the Picomag flow meter is attached to (0–3).
pub const FLOW_METER_IOL_PORT: u8 = 2;
/// Address of the IOL-HAT daemon on the loopback interface.
pub const IOL_HAT_ADDR: &str = "127.0.0.1:12011";

// ---------------------------------------------------------------------------
// Switch box / companion app
// ---------------------------------------------------------------------------

/// RS485 UART on GPIO 14/15 (physical pins 8/10).
pub const SWITCH_BOX_UART: &str = "/dev/ttyAMA0";
/// Baud rate; must match the switch box firmware.
pub const SWITCH_BOX_BAUD: u32 = 115_200;
/// Loopback TCP port the BLE bridge forwards app commands to.
pub const APP_SOCKET_PORT: u16 = 9999;
