//! Ownership of the single serial handle.

use log::info;

use crate::devices::Connector;
use crate::error::ConnectionError;

/// The one open handle to the payload, if any.
///
/// The handle is released when the connection is dropped, so every exit path of the owning
/// loop closes the port.
pub struct Connection<C: Connector> {
    connector: C,
    handle: Option<C::Device>,
}

impl<C: Connector> Connection<C> {
    pub fn new(connector: C) -> Self {
        Connection {
            connector,
            handle: None,
        }
    }

    pub fn path(&self) -> &str {
        self.connector.path()
    }

    /// Closes any existing handle and opens a new one.
    pub fn connect(&mut self) -> Result<(), ConnectionError> {
        self.close();
        let device = self.connector.open()?;
        info!("Opened serial port {}", self.connector.path());
        self.handle = Some(device);
        Ok(())
    }

    pub fn close(&mut self) {
        if self.handle.take().is_some() {
            info!("Closed serial port {}", self.connector.path());
        }
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    pub fn handle(&mut self) -> Option<&mut C::Device> {
        self.handle.as_mut()
    }
}

impl<C: Connector> Drop for Connection<C> {
    fn drop(&mut self) {
        self.close();
    }
}

pub mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum ConnectionError {
        #[error("Failed to connect to {path}: {source}")]
        Open {
            path: String,
            source: tokio_serial::Error,
        },
    }
}
