//! Raspberry Pi peripherals (feature `rpi`).
//!
//! Relay outputs come from `rppal` (its `hal` feature implements
//! `embedded_hal::digital::OutputPin`, which is all
//! [`RelayActuator`](crate::drivers::relay::RelayActuator) needs); the
//! switch box UART comes from `serialport`.

use std::time::Duration;

use log::info;
use rppal::gpio::{Gpio, OutputPin};
use serialport::{DataBits, Parity, SerialPort, StopBits};

/// Read timeout on the switch-box UART; the listener treats a timeout
/// as "no data yet".
const UART_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Claim BCM pin `bcm` as an output, driven low.
pub fn relay_pin(gpio: &Gpio, bcm: u8) -> Result<OutputPin, rppal::gpio::Error> {
    let pin = gpio.get(bcm)?.into_output_low();
    info!("RPI | GPIO {bcm} claimed as relay output");
    Ok(pin)
}

/// Open the RS485 switch-box UART (8N1).
pub fn open_switch_box(path: &str, baud: u32) -> serialport::Result<Box<dyn SerialPort>> {
    let port = serialport::new(path, baud)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .timeout(UART_READ_TIMEOUT)
        .open()?;
    info!("RPI | serial {path} @ {baud}");
    Ok(port)
}
