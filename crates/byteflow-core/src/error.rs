//! Error types shared across the workspace.

use std::{fmt, io};

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, ErrorKind>;

/// The error taxonomy of the buffer and streaming layers.
///
/// Buffer-internal failures are reported immediately and never retried.
/// Transport failures from an underlying byte stream are carried unchanged
/// in [`ErrorKind::Io`] so callers can distinguish them from end-of-data.
#[derive(Debug)]
pub enum ErrorKind {
    /// A read could not be satisfied because the upstream is exhausted or
    /// the buffer underflowed.
    Eof,
    /// An argument violated a size, offset, or count precondition.
    OutOfRange(String),
    /// The operation was attempted on an adapter that is already closed.
    Closed,
    /// Malformed data for the declared codec (bad UTF-32 length, invalid
    /// hex, truncated DEFLATE stream, bad GZIP framing, CRC mismatch).
    Encoding(String),
    /// Unknown charset or an unsupported framing flag.
    Unsupported(String),
    /// The deadline attached to the stream expired during a blocking call.
    TimedOut,
    /// An error from an underlying byte stream, propagated unchanged.
    Io(io::Error),
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Eof => write!(f, "end of data"),
            ErrorKind::OutOfRange(message) => write!(f, "out of range: {}", message),
            ErrorKind::Closed => write!(f, "closed"),
            ErrorKind::Encoding(message) => write!(f, "{}", message),
            ErrorKind::Unsupported(message) => write!(f, "{}", message),
            ErrorKind::TimedOut => write!(f, "timed out"),
            ErrorKind::Io(error) => write!(f, "{}", error),
        }
    }
}

impl std::error::Error for ErrorKind {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ErrorKind::Io(error) => Some(error),
            _ => None,
        }
    }
}

impl From<io::Error> for ErrorKind {
    fn from(error: io::Error) -> Self {
        ErrorKind::Io(error)
    }
}

/// Mapping used by the `std::io` bridge types, which must surface failures
/// in their native error mode.
impl From<ErrorKind> for io::Error {
    fn from(error: ErrorKind) -> Self {
        match error {
            ErrorKind::Io(error) => error,
            ErrorKind::Eof => io::Error::new(io::ErrorKind::UnexpectedEof, error.to_string()),
            ErrorKind::TimedOut => io::Error::new(io::ErrorKind::TimedOut, error.to_string()),
            ErrorKind::OutOfRange(_) => {
                io::Error::new(io::ErrorKind::InvalidInput, error.to_string())
            }
            ErrorKind::Encoding(_) | ErrorKind::Unsupported(_) => {
                io::Error::new(io::ErrorKind::InvalidData, error.to_string())
            }
            ErrorKind::Closed => io::Error::new(io::ErrorKind::Other, error.to_string()),
        }
    }
}
