//! IO devices to read data from.
use crate::error::FrameCheckError;
use crate::Frame;
use bytes::BytesMut;
use std::marker::PhantomData;
use tokio::io::{AsyncRead, AsyncReadExt};

use self::error::{DeviceError, ReadError};

/// Listener on IO device
///
/// Allows to read frames from device stream.
pub struct FramedListener<P, F> {
    port: P,
    buffer: BytesMut,
    frame_type: PhantomData<F>,
}

impl<P, F: Frame> FramedListener<P, F> {
    pub fn new(port: P) -> FramedListener<P, F> {
        FramedListener {
            port,
            // Allocate buffer with 256 bytes
            buffer: BytesMut::with_capacity(256),
            frame_type: PhantomData,
        }
    }

    fn parse(&mut self) -> Result<Option<F>, ReadError> {
        match F::check(&mut self.buffer) {
            Ok(frame_data) => Ok(Some(F::parse(frame_data)?)),
            Err(FrameCheckError::Incomplete) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

impl<P, F> FramedListener<P, F>
where
    P: AsyncRead + Unpin,
    F: Frame,
{
    /// Reads until one complete frame is available.
    ///
    /// Returns `Ok(None)` if the stream closed cleanly between frames. A frame that fails to
    /// parse is already removed from the buffer when its error is returned, so the next call
    /// continues with the following line. Cancelling the returned future loses no data.
    pub async fn read_frame(&mut self) -> Result<Option<F>, ReadError> {
        loop {
            if let Some(frame) = self.parse()? {
                return Ok(Some(frame));
            }

            if 0 == self.port.read_buf(&mut self.buffer).await? {
                // stream closed. If buffer empty, normal close.
                if self.buffer.is_empty() {
                    return Ok(None);
                } else {
                    return Err(DeviceError::ConnectionLost.into());
                }
            }
        }
    }
}

pub mod error {
    use crate::error::{FrameCheckError, FrameError};
    use thiserror::Error;

    #[derive(Error, Debug, PartialEq)]
    pub enum DeviceError {
        #[error("Connection lost to device")]
        ConnectionLost,
    }

    /// Everything that can go wrong while waiting for the next frame.
    #[derive(Error, Debug)]
    pub enum ReadError {
        #[error("Serial connection error: {0}")]
        Io(#[from] std::io::Error),
        #[error(transparent)]
        Device(#[from] DeviceError),
        #[error(transparent)]
        Check(#[from] FrameCheckError),
        #[error(transparent)]
        Frame(#[from] FrameError),
    }

    impl ReadError {
        /// True if the handle is unusable and has to be reopened.
        pub fn is_link_failure(&self) -> bool {
            matches!(self, ReadError::Io(_) | ReadError::Device(_))
        }
    }
}

#[cfg(test)]
mod test {
    use super::error::{DeviceError, ReadError};
    use super::FramedListener;
    use crate::devices::pico::TelemetryFrame;
    use crate::error::FrameError;

    const GOOD: &[u8] = b"{\"temperature\": 21.0, \"accel\": {\"x\": 0.1, \"y\": 0.2, \"z\": 9.8}}\n";

    #[tokio::test]
    async fn reads_consecutive_frames() {
        let data = [GOOD, GOOD].concat();
        let mut listener: FramedListener<_, TelemetryFrame> = FramedListener::new(&data[..]);

        assert!(listener.read_frame().await.unwrap().is_some());
        assert!(listener.read_frame().await.unwrap().is_some());
        assert!(listener.read_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn bad_line_does_not_swallow_next_frame() {
        let data = [&b"not json\n"[..], GOOD].concat();
        let mut listener: FramedListener<_, TelemetryFrame> = FramedListener::new(&data[..]);

        assert!(matches!(
            listener.read_frame().await,
            Err(ReadError::Frame(FrameError::Json { .. }))
        ));
        let frame = listener.read_frame().await.unwrap().unwrap();
        assert_eq!(frame.temperature, 21.0);
    }

    #[tokio::test]
    async fn partial_frame_at_end_of_stream_is_lost_connection() {
        let data = b"{\"temperature\": 2";
        let mut listener: FramedListener<_, TelemetryFrame> = FramedListener::new(&data[..]);

        let err = listener.read_frame().await.unwrap_err();
        assert!(matches!(err, ReadError::Device(DeviceError::ConnectionLost)));
        assert!(err.is_link_failure());
    }

    #[test]
    fn frame_errors_are_not_link_failures() {
        let err: ReadError = std::str::from_utf8(&[0xff, 0xfe])
            .map_err(FrameError::from)
            .unwrap_err()
            .into();
        assert!(!err.is_link_failure());
    }
}
