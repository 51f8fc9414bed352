//! Consumer-side callbacks.
//!
//! A [`Protocol`] is what the application plugs into a transport. Every
//! callback runs on the event loop thread, one at a time; a callback is never
//! entered while another one is still running, even if it calls back into the
//! transport.

use bytes::Bytes;

use crate::error::{BoxError, Error};
use crate::transport::SerialTransport;

/// Result of a protocol callback. Errors are reported to the process-wide
/// sink (see [`crate::sink`]) and otherwise ignored.
pub type CallbackResult = core::result::Result<(), BoxError>;

/// Event observer for a serial transport.
///
/// # Example
///
/// ```rust,ignore
/// use serio::{Protocol, SerialTransport, CallbackResult};
///
/// struct Echo(Option<SerialTransport>);
///
/// impl Protocol for Echo {
///     fn connection_made(&mut self, transport: SerialTransport) -> CallbackResult {
///         self.0 = Some(transport);
///         Ok(())
///     }
///
///     fn data_received(&mut self, data: Bytes) -> CallbackResult {
///         if let Some(t) = &self.0 {
///             t.write(data);
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Protocol {
    /// The transport is ready. Always the first callback.
    fn connection_made(&mut self, transport: SerialTransport) -> CallbackResult {
        let _ = transport;
        Ok(())
    }

    /// A chunk arrived from the device.
    fn data_received(&mut self, data: Bytes) -> CallbackResult;

    /// The transport is gone. `None` after `close()`/`abort()`, the device
    /// failure otherwise. Always the last callback.
    fn connection_lost(&mut self, error: Option<Error>) -> CallbackResult {
        let _ = error;
        Ok(())
    }

    /// The write buffer reached the high water mark.
    fn pause_writing(&mut self) -> CallbackResult {
        Ok(())
    }

    /// The write buffer drained to the low water mark.
    fn resume_writing(&mut self) -> CallbackResult {
        Ok(())
    }
}

/// Queued callback, delivered by the transport driver in order.
#[derive(Debug)]
pub(crate) enum Notification {
    DataReceived(Bytes),
    PauseWriting,
    ResumeWriting,
    ConnectionLost(Option<Error>),
}

impl Notification {
    /// Runs the callback. Returns the failure message for the sink alongside
    /// the callback result.
    pub(crate) fn deliver(self, protocol: &mut dyn Protocol) -> (&'static str, CallbackResult) {
        match self {
            Notification::DataReceived(data) => {
                ("protocol.data_received() failed", protocol.data_received(data))
            }
            Notification::PauseWriting => {
                ("protocol.pause_writing() failed", protocol.pause_writing())
            }
            Notification::ResumeWriting => {
                ("protocol.resume_writing() failed", protocol.resume_writing())
            }
            Notification::ConnectionLost(error) => {
                ("protocol.connection_lost() failed", protocol.connection_lost(error))
            }
        }
    }

    pub(crate) fn is_connection_lost(&self) -> bool {
        matches!(self, Notification::ConnectionLost(_))
    }
}
