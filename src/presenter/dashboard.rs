//! In-memory state behind the browser dashboard.

use std::io;

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use serde::Serialize;

use super::{Notice, Presenter};
use crate::devices::pico::Accel;
use crate::devices::TelemetryFrame;
use crate::link::{LinkState, RetryPolicy};

pub const SHAKE_WARNING: &str = "High X acceleration detected!";

/// Accel history per axis, appended once per frame for the whole session.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct DisplayBuffer {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
}

impl DisplayBuffer {
    pub fn push(&mut self, accel: &Accel) {
        self.x.push(accel.x);
        self.y.push(accel.y);
        self.z.push(accel.z);
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn axes(&self) -> [(&'static str, &[f64]); 3] {
        [
            ("X", self.x.as_slice()),
            ("Y", self.y.as_slice()),
            ("Z", self.z.as_slice()),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Warning,
    Error,
}

/// Status message shown above the readings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Banner {
    pub level: Level,
    pub message: String,
}

impl Banner {
    fn new(level: Level, message: impl Into<String>) -> Self {
        Banner {
            level,
            message: message.into(),
        }
    }
}

#[derive(Debug, Default, Serialize)]
pub struct Dashboard {
    temperature: Option<f64>,
    buffer: DisplayBuffer,
    /// Most recent event. Later events overwrite it, nothing clears it.
    event: Option<String>,
    banner: Option<Banner>,
    /// Mirrors the loop's state, only set through `link_changed`.
    link: LinkState,
    last_update: Option<DateTime<Utc>>,
    /// Set when the dashboard cannot run at all.
    halted: bool,
}

impl Dashboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// A dashboard that only shows why it stopped.
    pub fn halted(message: impl Into<String>) -> Self {
        Dashboard {
            banner: Some(Banner::new(Level::Error, message)),
            halted: true,
            ..Self::default()
        }
    }

    /// Latest temperature with two decimals, `0.0` before the first frame.
    pub fn temperature_readout(&self) -> String {
        match self.temperature {
            Some(t) => format!("{t:.2}"),
            None => "0.0".to_string(),
        }
    }

    pub fn buffer(&self) -> &DisplayBuffer {
        &self.buffer
    }

    pub fn event(&self) -> Option<&str> {
        self.event.as_deref()
    }

    pub fn banner(&self) -> Option<&Banner> {
        self.banner.as_ref()
    }

    pub fn link(&self) -> LinkState {
        self.link
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }
}

impl Presenter for Dashboard {
    fn present(&mut self, frame: &TelemetryFrame) -> io::Result<()> {
        self.temperature = Some(frame.temperature);
        self.buffer.push(&frame.accel);
        if frame.is_shaking() {
            warn!("{SHAKE_WARNING} x = {:.2}", frame.accel.x);
            self.event = Some(SHAKE_WARNING.to_string());
        }
        self.last_update = Some(Utc::now());
        Ok(())
    }

    fn notice(&mut self, notice: Notice<'_>) {
        let banner = match notice {
            Notice::Connected { path } => {
                info!("Connected to {path}");
                Banner::new(Level::Success, "Connected to serial port!")
            }
            Notice::ConnectFailed(e) => {
                error!("{e}");
                Banner::new(
                    Level::Error,
                    format!(
                        "{e}. Attempting to reconnect every {} seconds...",
                        RetryPolicy::DASHBOARD.reconnect_delay.as_secs()
                    ),
                )
            }
            Notice::Disconnected(e) => {
                error!("{e}");
                Banner::new(Level::Error, e.to_string())
            }
            Notice::Dropped(e) => {
                warn!("{e}");
                Banner::new(Level::Warning, e.to_string())
            }
            Notice::Failed(e) => {
                error!("Unexpected error: {e}");
                Banner::new(Level::Error, format!("Unexpected error: {e}"))
            }
        };
        self.banner = Some(banner);
    }

    fn link_changed(&mut self, state: LinkState) {
        self.link = state;
    }
}
