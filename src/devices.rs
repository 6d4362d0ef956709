//! Read from IO devices.

use async_trait::async_trait;

pub use pico::{Pico, SerialConnector, TelemetryFrame};

use crate::error::{ConnectionError, ReadError};

pub mod pico;

/// A live handle that yields telemetry frames.
#[async_trait]
pub trait Device: Send {
    /// Waits a bounded time for the next frame.
    ///
    /// `Ok(None)` means no data arrived in time. That is not an error.
    async fn read_frame(&mut self) -> Result<Option<TelemetryFrame>, ReadError>;
}

/// Opens new device handles.
pub trait Connector {
    type Device: Device;

    /// Human readable location of the device, used in messages.
    fn path(&self) -> &str;

    fn open(&mut self) -> Result<Self::Device, ConnectionError>;
}
