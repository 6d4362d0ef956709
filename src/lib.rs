//! Ground-station monitor for balloon payload telemetry.
//!
//! The payload prints one JSON object per line over USB serial. [`monitor::Monitor`] reads
//! those lines through a [`device::FramedListener`], validates them into
//! [`devices::TelemetryFrame`]s and hands them to a [`presenter::Presenter`]: either the
//! console or the state behind the browser dashboard served by [`web`].

// Rexport main API
pub use device::FramedListener;
pub use monitor::{Monitor, Step};
pub use protocol::Frame;

pub mod connection;
pub mod device;
pub mod devices;
pub mod link;
pub mod locate;
pub mod monitor;
pub mod output;
pub mod presenter;
pub mod protocol;
pub mod web;

/// Rexports all error types
pub mod error {
    pub use crate::connection::error::*;
    pub use crate::device::error::*;
    pub use crate::locate::error::*;
    pub use crate::protocol::error::*;
}
