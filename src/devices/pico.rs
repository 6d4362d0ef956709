use crate::{
    error::*,
    output::influx::{LineProtocol, ToLineProtocol},
    output::ToOutput,
    Frame, FramedListener,
};
use async_trait::async_trait;
use bytes::BytesMut;
use serde_json::Value;
use std::fmt::{self, Display};
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio_serial::{SerialPortBuilderExt, SerialStream};

use super::{Connector, Device};

/// Baud rate of the payload's USB serial link.
pub const BAUD_RATE: u32 = 115_200;

/// How long a single read waits for a complete line.
pub const READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Absolute X acceleration above which the payload counts as shaking.
pub const SHAKE_THRESHOLD: f64 = 2.0;

/// Lines longer than this without a terminator are thrown away.
const MAX_LINE_LENGTH: usize = 4096;

/// Characters of a rejected line echoed in its error message.
const EXCERPT_CHARS: usize = 120;

/// Start of `line` for error messages, marked with `...` when cut.
fn excerpt(line: &str) -> String {
    match line.char_indices().nth(EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", &line[..cut]),
        None => line.to_string(),
    }
}

/// Telemetry source on the balloon payload, speaking newline delimited JSON.
pub struct Pico<P = SerialStream> {
    reader: FramedListener<P, TelemetryFrame>,
    timeout: Duration,
}

impl<P> Pico<P> {
    /// Wraps `port`, giving up on each read after `timeout` without a complete line.
    pub fn new(port: P, timeout: Duration) -> Self {
        Pico {
            reader: FramedListener::new(port),
            timeout,
        }
    }
}

#[async_trait]
impl<P> Device for Pico<P>
where
    P: AsyncRead + Unpin + Send,
{
    async fn read_frame(&mut self) -> Result<Option<TelemetryFrame>, ReadError> {
        match tokio::time::timeout(self.timeout, self.reader.read_frame()).await {
            Ok(Ok(Some(frame))) => Ok(Some(frame)),
            // a serial device never closes on its own, it was unplugged
            Ok(Ok(None)) => Err(DeviceError::ConnectionLost.into()),
            Ok(Err(e)) => Err(e),
            Err(_elapsed) => Ok(None),
        }
    }
}

/// Opens the payload's serial port.
pub struct SerialConnector {
    path: String,
}

impl SerialConnector {
    pub fn new(path: impl Into<String>) -> Self {
        SerialConnector { path: path.into() }
    }
}

impl Connector for SerialConnector {
    type Device = Pico<SerialStream>;

    fn path(&self) -> &str {
        &self.path
    }

    fn open(&mut self) -> Result<Self::Device, ConnectionError> {
        let open_error = |source| ConnectionError::Open {
            path: self.path.clone(),
            source,
        };

        let mut port = tokio_serial::new(self.path.as_str(), BAUD_RATE)
            .timeout(READ_TIMEOUT)
            .open_native_async()
            .map_err(open_error)?;

        #[cfg(unix)]
        port.set_exclusive(true).map_err(open_error)?;

        Ok(Pico::new(port, READ_TIMEOUT))
    }
}

/// Acceleration sample as emitted by the firmware.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct Accel {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// One telemetry line received from the payload.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct TelemetryFrame {
    pub temperature: f64,
    pub accel: Accel,
}

impl TelemetryFrame {
    pub fn is_shaking(&self) -> bool {
        self.accel.x.abs() > SHAKE_THRESHOLD
    }

    /// Reads the required numeric field at `pointer`.
    fn field(
        value: &Value,
        line: &str,
        field: &'static str,
        pointer: &str,
    ) -> Result<f64, FrameError> {
        match value.pointer(pointer) {
            Some(v) => v.as_f64().ok_or_else(|| FrameError::NotANumber {
                field,
                line: excerpt(line),
            }),
            None => Err(FrameError::MissingField {
                field,
                line: excerpt(line),
            }),
        }
    }
}

impl Frame for TelemetryFrame {
    fn check(buffer: &mut BytesMut) -> Result<BytesMut, FrameCheckError> {
        loop {
            let Some(end) = buffer.iter().position(|&b| b == b'\n') else {
                if buffer.len() > MAX_LINE_LENGTH {
                    let dropped = buffer.len();
                    buffer.clear();
                    return Err(FrameCheckError::Overflow(dropped));
                }
                return Err(FrameCheckError::Incomplete);
            };

            let mut line = buffer.split_to(end + 1);
            line.truncate(end);
            if line.last() == Some(&b'\r') {
                line.truncate(end - 1);
            }
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            return Ok(line);
        }
    }

    fn parse(buffer: BytesMut) -> Result<Self, FrameError> {
        let line = std::str::from_utf8(&buffer)?.trim();
        let value: Value = serde_json::from_str(line).map_err(|source| FrameError::Json {
            line: excerpt(line),
            source,
        })?;

        Ok(TelemetryFrame {
            temperature: Self::field(&value, line, "temperature", "/temperature")?,
            accel: Accel {
                x: Self::field(&value, line, "accel.x", "/accel/x")?,
                y: Self::field(&value, line, "accel.y", "/accel/y")?,
                z: Self::field(&value, line, "accel.z", "/accel/z")?,
            },
        })
    }
}

impl ToOutput for TelemetryFrame {}

impl Display for TelemetryFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Temperature: {:.2} °C | Accel X:{:.2}, Y:{:.2}, Z:{:.2}",
            self.temperature, self.accel.x, self.accel.y, self.accel.z
        )
    }
}

impl ToLineProtocol for TelemetryFrame {
    fn to_lineprotocol(&self) -> LineProtocol {
        LineProtocol::new("telemetry")
            .add_value("temperature", self.temperature)
            .add_value("accel_x", self.accel.x)
            .add_value("accel_y", self.accel.y)
            .add_value("accel_z", self.accel.z)
            .add_value("shake", self.is_shaking())
    }
}
