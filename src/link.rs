//! Link state of the serial connection and the timing around it.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub enum LinkState {
    #[default]
    Disconnected,
    Connected,
}

/// Outcome of one loop iteration as far as the link is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    Opened,
    OpenFailed,
    /// A read finished without an I/O error, with or without a frame.
    Read,
    ReadFailed,
}

/// Moves the link to its next state. There is no terminal state.
pub fn transition(state: LinkState, event: LinkEvent) -> LinkState {
    use LinkEvent::*;
    use LinkState::*;

    match (state, event) {
        (Disconnected, Opened) => Connected,
        (Disconnected, _) => Disconnected,
        (Connected, ReadFailed) => Disconnected,
        // reconnecting replaces a live handle
        (Connected, OpenFailed) => Disconnected,
        (Connected, Opened | Read) => Connected,
    }
}

/// Pauses applied between loop iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait before the next connect attempt after one failed.
    pub reconnect_delay: Duration,
    /// Wait after a live handle failed, before reconnecting.
    pub io_error_delay: Duration,
    /// Pause after every iteration to bound the redraw rate.
    pub redraw_interval: Duration,
}

impl RetryPolicy {
    pub const DASHBOARD: RetryPolicy = RetryPolicy {
        reconnect_delay: Duration::from_secs(5),
        io_error_delay: Duration::from_secs(1),
        redraw_interval: Duration::from_millis(500),
    };

    /// How long to wait after an iteration that ended with `event`.
    pub fn pause_after(&self, event: LinkEvent) -> Duration {
        match event {
            LinkEvent::OpenFailed => self.reconnect_delay,
            LinkEvent::ReadFailed => self.io_error_delay + self.redraw_interval,
            LinkEvent::Opened | LinkEvent::Read => self.redraw_interval,
        }
    }
}
