//! Readiness sources.
//!
//! The transport only ever asks two questions: "can I read?" and "can I
//! write?". Two implementations answer them:
//!
//! - `EdgeReadiness`: registers the device descriptor with the tokio reactor
//! - `PollReadiness`: wakes on a fixed interval and inspects the device
//!   buffer counters
//!
//! One of them is picked when the transport is built; nothing else in the
//! crate knows which.

#[cfg(unix)]
mod edge;
mod poll;

use std::io;
use std::task::{Context, Poll};

use crate::config::{ReadinessMode, TransportConfig};
use crate::device::SerialDevice;
use crate::error::{Error, Result};

#[cfg(unix)]
pub(crate) use edge::EdgeReadiness;
pub(crate) use poll::PollReadiness;

/// Callbacks a readiness source runs when the device is ready.
///
/// `on_readable` and `on_writable` return `Err(WouldBlock)` once the device
/// has nothing more to give or take, so edge sources can re-arm. Device
/// failures are dealt with inside the handler and never surface here.
pub(crate) trait IoHandler {
    fn on_readable(&mut self) -> io::Result<()>;

    fn on_writable(&mut self) -> io::Result<()>;

    fn bytes_to_read(&self) -> io::Result<u32>;

    fn bytes_to_write(&self) -> io::Result<u32>;
}

pub(crate) trait Readiness {
    fn mode(&self) -> ReadinessMode;

    fn arm_read(&mut self);

    fn disarm_read(&mut self);

    fn arm_write(&mut self);

    fn disarm_write(&mut self);

    fn is_read_armed(&self) -> bool;

    fn is_write_armed(&self) -> bool;

    /// Waits for the next armed readiness event and dispatches it to `io`.
    ///
    /// Resolves after a single event so the caller can re-sync interest.
    /// An error means the readiness source itself broke.
    fn poll_ready(&mut self, cx: &mut Context<'_>, io: &mut dyn IoHandler) -> Poll<io::Result<()>>;

    /// Arms or disarms both directions to match the wanted interest.
    fn sync(&mut self, read: bool, write: bool) {
        match (read, self.is_read_armed()) {
            (true, false) => self.arm_read(),
            (false, true) => self.disarm_read(),
            _ => {}
        }
        match (write, self.is_write_armed()) {
            (true, false) => self.arm_write(),
            (false, true) => self.disarm_write(),
            _ => {}
        }
    }
}

/// Picks and registers the readiness source for `device`.
///
/// Must be called from inside a tokio runtime with I/O and time enabled.
pub(crate) fn select(
    config: &TransportConfig,
    device: &dyn SerialDevice,
) -> Result<Box<dyn Readiness>> {
    if tokio::runtime::Handle::try_current().is_err() {
        return Err(Error::PlatformUnsupported(
            "no tokio runtime is running".into(),
        ));
    }

    match config.readiness.resolve() {
        ReadinessMode::Edge => edge(device),
        _ => Ok(Box::new(PollReadiness::new(
            config.poll_interval,
            config.poll_write_threshold,
        ))),
    }
}

#[cfg(unix)]
fn edge(device: &dyn SerialDevice) -> Result<Box<dyn Readiness>> {
    let fd = device.raw_fd().ok_or_else(|| {
        Error::PlatformUnsupported(format!(
            "{} does not expose a waitable descriptor",
            device.name()
        ))
    })?;

    let readiness = EdgeReadiness::register(fd).map_err(|e| {
        Error::PlatformUnsupported(format!("descriptor registration failed: {e}"))
    })?;
    Ok(Box::new(readiness))
}

#[cfg(not(unix))]
fn edge(_device: &dyn SerialDevice) -> Result<Box<dyn Readiness>> {
    Err(Error::PlatformUnsupported(
        "descriptor readiness is only available on unix".into(),
    ))
}

/// Folds "nothing more to do" into success.
fn settle(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(()),
        other => other,
    }
}
