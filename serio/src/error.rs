//! Error types for the serial transport.

use std::io;

/// Boxed error returned by protocol callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No usable readiness strategy for this platform/device combination.
    #[error("platform not supported for async serial: {0}")]
    PlatformUnsupported(String),

    /// Invalid transport configuration, e.g. inverted write buffer limits.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The device could not be opened or configured.
    #[error("failed to connect to serial device: {0}")]
    Connection(String),

    /// A read or write on the device failed.
    #[error("serial device I/O failure: {0}")]
    DeviceIo(#[from] io::Error),

    /// Serial ports have no half-close.
    #[error("serial transports do not support EOF")]
    EofUnsupported,
}

impl Error {
    pub(crate) fn limits(high: usize, low: usize) -> Self {
        Error::Configuration(format!("high ({high}) must be >= low ({low}) must be >= 0"))
    }

    /// Returns the underlying I/O error kind for device failures.
    pub fn io_kind(&self) -> Option<io::ErrorKind> {
        match self {
            Error::DeviceIo(e) => Some(e.kind()),
            _ => None,
        }
    }
}

/// Returns true for error kinds that mean "try again on the next readiness
/// signal" rather than a broken device.
pub fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut
    )
}

pub type Result<T> = core::result::Result<T, Error>;
