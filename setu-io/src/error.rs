//! Error types for SetuIO

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// SetuIO error types
///
/// Streaming faults (checksum, wrong id, backlog, lost sync) are not errors:
/// they travel inside [`crate::stream::StreamSnapshot`] as a
/// [`crate::stream::StreamStatus`] and heal on the next frame.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Packet id is not a sensor packet in the Open Interface table
    #[error("Unknown sensor packet id: {0}")]
    UnknownPacket(u8),

    /// Group packet id has no group definition
    #[error("Unknown group packet id: {0}")]
    UnknownGroup(u8),

    /// Call outside the operation's contract
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Bounded wait for serial input expired
    #[error("Serial timeout: needed {needed} bytes, {available} available after {waited_ms}ms")]
    SerialTimeout {
        /// Bytes the caller was waiting for
        needed: usize,
        /// Bytes buffered when the deadline passed
        available: usize,
        /// Length of the wait
        waited_ms: u64,
    },

    /// Operation the gateway deliberately does not encode
    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),

    /// TCP peer went away
    #[error("Connection closed by peer")]
    ConnectionClosed,

    /// Single-shot query refused because telemetry streaming owns the input
    #[error("Sensor query refused while a telemetry stream is active")]
    StreamActive,

    /// The thread owning one half of the serial link has exited
    #[error("Serial link worker is not running")]
    LinkClosed,

    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file could not be parsed
    #[error("Configuration parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map socket-level I/O errors that mean "peer went away" to [`Error::ConnectionClosed`]
    pub fn from_socket(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe => Error::ConnectionClosed,
            _ => Error::Io(err),
        }
    }

    /// True when the error only means the TCP client disconnected
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Error::ConnectionClosed)
    }
}
