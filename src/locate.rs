//! Finding the payload's serial port.

use log::debug;
use serialport::{SerialPortInfo, SerialPortType};

use self::error::LocateError;

/// Name fragments of ports a Pico shows up as (macOS and Linux CDC-ACM).
pub const PORT_PATTERNS: &[&str] = &["usbmodem", "ttyACM"];

/// USB vendor id of Raspberry Pi boards.
pub const PICO_VID: u16 = 0x2E8A;

/// Scans the serial ports of the system and returns the first candidate.
pub fn find_device() -> Result<String, LocateError> {
    let ports = serialport::available_ports()?;
    debug!(
        "Available ports: {:?}",
        ports.iter().map(|p| &p.port_name).collect::<Vec<_>>()
    );
    pick(ports.iter().map(describe)).ok_or(LocateError::DeviceNotFound)
}

fn describe(info: &SerialPortInfo) -> (String, Option<u16>) {
    let vid = match info.port_type {
        SerialPortType::UsbPort(ref usb) => Some(usb.vid),
        _ => None,
    };
    (info.port_name.clone(), vid)
}

fn is_candidate(name: &str, vid: Option<u16>) -> bool {
    vid == Some(PICO_VID) || PORT_PATTERNS.iter().any(|pattern| name.contains(pattern))
}

/// Picks the alphabetically first candidate so repeated scans agree.
fn pick(ports: impl IntoIterator<Item = (String, Option<u16>)>) -> Option<String> {
    ports
        .into_iter()
        .filter(|(name, vid)| is_candidate(name, *vid))
        .map(|(name, _)| name)
        .min()
}

pub mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum LocateError {
        #[error("No USB device found! Please check your connection.")]
        DeviceNotFound,
        #[error("Could not list serial ports: {0}")]
        Enumerate(#[from] serialport::Error),
    }
}
