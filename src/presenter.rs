//! Where frames end up: the console or the dashboard state.

use std::io::{self, Write};

use log::{debug, error, info, warn};

use crate::devices::TelemetryFrame;
use crate::error::{ConnectionError, FrameError, ReadError};
use crate::link::LinkState;
use crate::output::OutputFormat;

pub use dashboard::{Banner, Dashboard, DisplayBuffer, Level};

pub mod dashboard;

/// Things the loop tells a presenter besides frames.
#[derive(Debug)]
pub enum Notice<'a> {
    Connected { path: &'a str },
    ConnectFailed(&'a ConnectionError),
    /// The handle failed and was discarded.
    Disconnected(&'a ReadError),
    /// A line was dropped, the link is fine.
    Dropped(&'a ReadError),
    /// Presenting a frame failed.
    Failed(&'a io::Error),
}

pub trait Presenter {
    /// Shows one validated frame.
    fn present(&mut self, frame: &TelemetryFrame) -> io::Result<()>;

    fn notice(&mut self, notice: Notice<'_>);

    /// Called with the loop's new link state whenever it changes.
    fn link_changed(&mut self, _state: LinkState) {}
}

/// Undecodable bytes are expected while the payload boots and are skipped without a warning.
pub fn is_line_noise(e: &ReadError) -> bool {
    matches!(e, ReadError::Frame(FrameError::Decode(_)))
}

/// Writes one line per frame.
pub struct Console<W> {
    out: W,
    format: OutputFormat,
}

impl<W: Write> Console<W> {
    pub fn new(out: W, format: OutputFormat) -> Self {
        Console { out, format }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Presenter for Console<W> {
    fn present(&mut self, frame: &TelemetryFrame) -> io::Result<()> {
        writeln!(self.out, "{}", self.format.render(frame))?;
        self.out.flush()
    }

    fn notice(&mut self, notice: Notice<'_>) {
        match notice {
            Notice::Connected { path } => info!("Connected to {path}"),
            Notice::ConnectFailed(e) => error!("{e}"),
            Notice::Disconnected(e) => error!("{e}"),
            Notice::Dropped(e) if is_line_noise(e) => debug!("Skipping line: {e}"),
            Notice::Dropped(e) => warn!("Bad data: {e}"),
            Notice::Failed(e) => error!("Unexpected error: {e}"),
        }
    }
}
