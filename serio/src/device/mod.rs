//! Device abstraction.
//!
//! The transport never opens devices itself. It is handed something that
//! already talks to the hardware and implements [`SerialDevice`].
//!
//! # Implementations
//!
//! - `StreamDevice`: wraps a non-blocking unix stream (pty, socket pair)
//! - `MockDevice`: scripted in-memory device for tests

pub mod mock;

use std::io;

pub use mock::{MockDevice, MockHandle};

#[cfg(unix)]
use std::os::unix::io::{AsRawFd, RawFd};

/// Non-blocking access to an open serial device.
///
/// `read` and `write` must never block. Running out of data or buffer space
/// is reported as `Ok(0)` or a transient error (`WouldBlock`, `Interrupted`,
/// `TimedOut`); any other error is treated as a dead device.
pub trait SerialDevice {
    /// Human-readable device name, e.g. `/dev/ttyUSB0`.
    fn name(&self) -> &str;

    /// Switches the device to zero timeouts. Called once before the
    /// transport starts using it.
    fn set_nonblocking(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Reads whatever is available, up to `buf.len()` bytes.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Writes as much of `buf` as the device accepts right now.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Bytes waiting in the input buffer.
    fn bytes_to_read(&self) -> io::Result<u32>;

    /// Bytes still queued in the output buffer.
    fn bytes_to_write(&self) -> io::Result<u32>;

    /// Descriptor the reactor can wait on, if the device has one.
    #[cfg(unix)]
    fn raw_fd(&self) -> Option<RawFd> {
        None
    }

    /// Releases the device.
    fn close(&mut self) -> io::Result<()>;
}

/// Snapshot of the device returned through transport extra info.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    /// Waitable descriptor, when the platform has one.
    pub descriptor: Option<i32>,
}

impl DeviceInfo {
    pub(crate) fn of(device: &dyn SerialDevice) -> Self {
        #[cfg(unix)]
        let descriptor = device.raw_fd();
        #[cfg(not(unix))]
        let descriptor = None;

        Self {
            name: device.name().to_owned(),
            descriptor,
        }
    }
}

/// Wrapper for non-blocking unix streams.
///
/// The stream must already be in non-blocking mode. Buffer counters are not
/// available for generic streams and always read as zero, so this device is
/// only useful with edge readiness.
#[cfg(unix)]
#[derive(Debug)]
pub struct StreamDevice<T> {
    name: String,
    inner: Option<T>,
}

#[cfg(unix)]
impl<T> StreamDevice<T> {
    /// Creates a new StreamDevice wrapping the given stream.
    pub fn new(name: impl Into<String>, inner: T) -> Self {
        Self {
            name: name.into(),
            inner: Some(inner),
        }
    }

    /// Returns a reference to the inner stream, or `None` once closed.
    pub fn inner(&self) -> Option<&T> {
        self.inner.as_ref()
    }

    fn stream(&mut self) -> io::Result<&mut T> {
        self.inner
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "device closed"))
    }
}

#[cfg(unix)]
impl<T: io::Read + io::Write + AsRawFd> SerialDevice for StreamDevice<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::Read::read(self.stream()?, buf)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::Write::write(self.stream()?, buf)
    }

    fn bytes_to_read(&self) -> io::Result<u32> {
        Ok(0)
    }

    fn bytes_to_write(&self) -> io::Result<u32> {
        Ok(0)
    }

    fn raw_fd(&self) -> Option<RawFd> {
        self.inner.as_ref().map(AsRawFd::as_raw_fd)
    }

    fn close(&mut self) -> io::Result<()> {
        self.inner.take();
        Ok(())
    }
}
