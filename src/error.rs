//! Error types for the audio server and its clients

use std::io;
use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Wire error: {0}")]
    Wire(#[from] WireError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("No server reachable on port {port} after {attempts} attempts")]
    ServerUnreachable { port: u16, attempts: u32 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Whether this error is the peer hanging up on us
    pub fn is_stream_closed(&self) -> bool {
        matches!(self, Error::Wire(WireError::StreamClosed))
    }

    /// Whether this error is a wire operation running into its deadline
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Wire(WireError::Timeout))
    }
}

/// Audio output device errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to open stream: {0}")]
    StreamError(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Device is not open")]
    NotOpen,
}

/// Errors of the byte-level protocol between client and server
#[derive(Error, Debug)]
pub enum WireError {
    /// No data moved within the per-socket deadline
    #[error("Timeout")]
    Timeout,

    /// The peer closed the connection
    #[error("Stream closed")]
    StreamClosed,

    #[error("Invalid command byte: {0}")]
    InvalidCommand(u8),

    #[error("Invalid payload length: {0}")]
    InvalidLength(i32),

    #[error("Unexpected reply: {0}")]
    UnexpectedReply(i32),

    /// Nobody is listening on the target port
    #[error("Connection failed: {0}")]
    Connect(#[source] io::Error),

    #[error("IO error: {0}")]
    Io(#[source] io::Error),
}

impl From<io::Error> for WireError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted => WireError::StreamClosed,
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => WireError::Timeout,
            _ => WireError::Io(err),
        }
    }
}

/// Listener setup errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Socket bind failed on port {port}: {reason}")]
    BindFailed { port: u16, reason: String },

    #[error("Invalid port: {0}")]
    InvalidPort(u16),
}

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_classification() {
        let eof = io::Error::new(io::ErrorKind::UnexpectedEof, "eof");
        assert!(matches!(WireError::from(eof), WireError::StreamClosed));

        let reset = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        assert!(matches!(WireError::from(reset), WireError::StreamClosed));

        let timed_out = io::Error::new(io::ErrorKind::TimedOut, "slow");
        assert!(matches!(WireError::from(timed_out), WireError::Timeout));

        let other = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        assert!(matches!(WireError::from(other), WireError::Io(_)));
    }

    #[test]
    fn test_error_predicates() {
        assert!(Error::from(WireError::StreamClosed).is_stream_closed());
        assert!(Error::from(WireError::Timeout).is_timeout());
        assert!(!Error::Config("x".into()).is_stream_closed());
    }
}
