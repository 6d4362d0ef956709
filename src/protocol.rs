//! Module for cutting data frames out of the byte stream read from a device.

use bytes::BytesMut;

/// Trait for protocol frame objects.
pub trait Frame: Sized {
    /// Check if a full frame is available in the buffer and returns it if possible.
    ///
    /// If a complete frame is in the buffer, the frame payload is split off and returned
    /// without its terminator. If no complete frame is found, the error
    /// `FrameCheckError::Incomplete` is returned and the buffer is left for the next read.
    fn check(buffer: &mut BytesMut) -> Result<BytesMut, error::FrameCheckError>;

    /// Consumes a frame payload and returns the corresponding Frame object.
    fn parse(buffer: BytesMut) -> Result<Self, error::FrameError>;
}

pub mod error {
    use thiserror::Error;

    #[derive(Error, Debug, PartialEq)]
    pub enum FrameCheckError {
        #[error("No complete frame in buffer")]
        Incomplete,
        #[error("Discarded {0} bytes without a line terminator")]
        Overflow(usize),
    }

    #[derive(Error, Debug)]
    pub enum FrameError {
        #[error("Frame data is not valid UTF-8: {0}")]
        Decode(#[from] std::str::Utf8Error),
        #[error("Invalid data received: {source}. Input: {line}")]
        Json {
            line: String,
            source: serde_json::Error,
        },
        #[error("Missing field `{field}`. Input: {line}")]
        MissingField { field: &'static str, line: String },
        #[error("Field `{field}` is not a number. Input: {line}")]
        NotANumber { field: &'static str, line: String },
    }
}
