//! The read, parse, present loop.

use std::io;

use crate::connection::Connection;
use crate::devices::{Connector, Device, TelemetryFrame};
use crate::error::{ConnectionError, DeviceError, ReadError};
use crate::link::{transition, LinkEvent, LinkState};
use crate::presenter::{Notice, Presenter};

/// What one iteration of the loop did.
#[derive(Debug)]
pub enum Step {
    Connected,
    ConnectFailed(ConnectionError),
    Frame(TelemetryFrame),
    /// No data within the read timeout.
    Idle,
    /// A line was malformed and skipped.
    Dropped(ReadError),
    /// The handle failed and was discarded.
    Disconnected(ReadError),
    /// The presenter could not show a frame.
    Failed(io::Error),
}

impl Step {
    pub fn event(&self) -> LinkEvent {
        match self {
            Step::Connected => LinkEvent::Opened,
            Step::ConnectFailed(_) => LinkEvent::OpenFailed,
            Step::Disconnected(_) => LinkEvent::ReadFailed,
            Step::Frame(_) | Step::Idle | Step::Dropped(_) | Step::Failed(_) => LinkEvent::Read,
        }
    }
}

/// Owns the connection and the presenter and drives both.
pub struct Monitor<C: Connector, P> {
    connection: Connection<C>,
    presenter: P,
    state: LinkState,
}

impl<C: Connector, P: Presenter> Monitor<C, P> {
    pub fn new(connector: C, presenter: P) -> Self {
        Monitor {
            connection: Connection::new(connector),
            presenter,
            state: LinkState::Disconnected,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_open()
    }

    /// Runs one iteration: connect while disconnected, otherwise read and present one frame.
    ///
    /// Never fails. Every outcome is reported to the presenter and returned.
    pub async fn step(&mut self) -> Step {
        let step = match self.state {
            LinkState::Disconnected => self.connect(),
            LinkState::Connected => self.read().await,
        };
        let state = transition(self.state, step.event());
        if state != self.state {
            self.state = state;
            self.presenter.link_changed(state);
        }
        step
    }

    fn connect(&mut self) -> Step {
        match self.connection.connect() {
            Ok(()) => {
                self.presenter.notice(Notice::Connected {
                    path: self.connection.path(),
                });
                Step::Connected
            }
            Err(e) => {
                self.presenter.notice(Notice::ConnectFailed(&e));
                Step::ConnectFailed(e)
            }
        }
    }

    async fn read(&mut self) -> Step {
        let result = match self.connection.handle() {
            Some(device) => device.read_frame().await,
            None => Err(DeviceError::ConnectionLost.into()),
        };

        match result {
            Ok(Some(frame)) => match self.presenter.present(&frame) {
                Ok(()) => Step::Frame(frame),
                Err(e) => {
                    self.presenter.notice(Notice::Failed(&e));
                    Step::Failed(e)
                }
            },
            Ok(None) => Step::Idle,
            Err(e) if e.is_link_failure() => {
                self.connection.close();
                self.presenter.notice(Notice::Disconnected(&e));
                Step::Disconnected(e)
            }
            Err(e) => {
                self.presenter.notice(Notice::Dropped(&e));
                Step::Dropped(e)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::io;
    use std::sync::atomic::Ordering;

    use bytes::BytesMut;

    use super::{Monitor, Step};
    use crate::connection::test::ScriptedConnector;
    use crate::devices::TelemetryFrame;
    use crate::error::{FrameError, ReadError};
    use crate::link::LinkState;
    use crate::presenter::{Dashboard, Level, Notice, Presenter};
    use crate::Frame;

    fn parsed(line: &[u8]) -> Result<Option<TelemetryFrame>, ReadError> {
        TelemetryFrame::parse(BytesMut::from(line))
            .map(Some)
            .map_err(ReadError::from)
    }

    const SHAKE: &[u8] = br#"{"temperature": 23.5, "accel": {"x": 2.5, "y": 0.0, "z": 9.8}}"#;

    fn io_error() -> Result<Option<TelemetryFrame>, ReadError> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "device reports an error").into())
    }

    #[tokio::test]
    async fn connects_then_presents_frames() {
        let connector = ScriptedConnector::new([Some(vec![parsed(SHAKE)])]);
        let mut monitor = Monitor::new(connector, Dashboard::new());

        assert!(matches!(monitor.step().await, Step::Connected));
        assert_eq!(monitor.state(), LinkState::Connected);
        assert_eq!(monitor.presenter().link(), LinkState::Connected);
        assert!(matches!(monitor.step().await, Step::Frame(_)));
        assert!(matches!(monitor.step().await, Step::Idle));

        assert_eq!(monitor.presenter().temperature_readout(), "23.50");
        assert!(monitor.presenter().event().is_some());
    }

    #[tokio::test]
    async fn failed_connect_stays_disconnected() {
        let connector = ScriptedConnector::new([None, Some(vec![])]);
        let mut monitor = Monitor::new(connector, Dashboard::new());

        assert!(matches!(monitor.step().await, Step::ConnectFailed(_)));
        assert_eq!(monitor.state(), LinkState::Disconnected);
        assert!(!monitor.is_connected());

        assert!(matches!(monitor.step().await, Step::Connected));
        assert_eq!(monitor.state(), LinkState::Connected);
    }

    #[tokio::test]
    async fn malformed_lines_do_not_touch_the_display() {
        let connector = ScriptedConnector::new([Some(vec![
            parsed(b"not json"),
            parsed(br#"{"temperature": 20.0}"#),
            Err(FrameError::from(std::str::from_utf8(&[0xc3, 0x28]).unwrap_err()).into()),
        ])]);
        let mut monitor = Monitor::new(connector, Dashboard::new());
        monitor.step().await;

        for _ in 0..3 {
            assert!(matches!(monitor.step().await, Step::Dropped(_)));
            assert_eq!(monitor.state(), LinkState::Connected);
        }
        // the dashboard still warns about a line the console skips silently
        let banner = monitor.presenter().banner().unwrap();
        assert_eq!(banner.level, Level::Warning);
        assert!(banner.message.contains("UTF-8"));
        assert!(monitor.presenter().buffer().is_empty());
        assert_eq!(monitor.presenter().temperature_readout(), "0.0");
    }

    #[tokio::test]
    async fn io_error_forces_reconnect_before_next_read() {
        let connector = ScriptedConnector::new([
            Some(vec![io_error(), parsed(SHAKE)]),
            Some(vec![parsed(SHAKE)]),
        ]);
        let opened = connector.opened.clone();
        let live = connector.live.clone();
        let mut monitor = Monitor::new(connector, Dashboard::new());
        monitor.step().await;

        assert!(matches!(monitor.step().await, Step::Disconnected(_)));
        assert_eq!(monitor.state(), LinkState::Disconnected);
        assert_eq!(monitor.presenter().link(), LinkState::Disconnected);
        assert_eq!(live.load(Ordering::SeqCst), 0);

        // the first session's second read is never attempted
        assert!(matches!(monitor.step().await, Step::Connected));
        assert_eq!(opened.load(Ordering::SeqCst), 2);
        assert!(matches!(monitor.step().await, Step::Frame(_)));
        assert!(matches!(monitor.step().await, Step::Idle));
        assert_eq!(monitor.presenter().buffer().len(), 1);
    }

    #[tokio::test]
    async fn same_line_is_presented_every_time() {
        let connector =
            ScriptedConnector::new([Some(vec![parsed(SHAKE), parsed(SHAKE), parsed(SHAKE)])]);
        let mut monitor = Monitor::new(connector, Dashboard::new());
        monitor.step().await;
        for _ in 0..3 {
            monitor.step().await;
        }

        let buffer = monitor.presenter().buffer();
        assert_eq!(buffer.x, vec![2.5; 3]);
        assert_eq!(buffer.y, vec![0.0; 3]);
        assert_eq!(buffer.z, vec![9.8; 3]);
    }

    #[tokio::test]
    async fn dropping_the_monitor_closes_the_handle() {
        let connector = ScriptedConnector::new([Some(vec![])]);
        let live = connector.live.clone();
        let mut monitor = Monitor::new(connector, Dashboard::new());
        monitor.step().await;
        assert_eq!(live.load(Ordering::SeqCst), 1);

        drop(monitor);
        assert_eq!(live.load(Ordering::SeqCst), 0);
    }

    struct BrokenPipe;

    impl Presenter for BrokenPipe {
        fn present(&mut self, _frame: &TelemetryFrame) -> io::Result<()> {
            Err(io::ErrorKind::BrokenPipe.into())
        }

        fn notice(&mut self, _notice: Notice<'_>) {}
    }

    #[tokio::test]
    async fn presenter_failure_keeps_the_link() {
        let connector = ScriptedConnector::new([Some(vec![parsed(SHAKE)])]);
        let mut monitor = Monitor::new(connector, BrokenPipe);
        monitor.step().await;

        assert!(matches!(monitor.step().await, Step::Failed(_)));
        assert_eq!(monitor.state(), LinkState::Connected);
    }
}
