//! Process-wide sink for protocol callback failures.
//!
//! A failing callback never reaches the transport state machine. Its error is
//! handed to the installed handler instead, which by default logs it.

use std::sync::{Arc, RwLock};

use crate::error::BoxError;

/// A callback failure as reported to the sink.
#[derive(Debug)]
pub struct CallbackError<'a> {
    /// Which callback failed, e.g. `protocol.pause_writing() failed`.
    pub message: &'static str,
    /// Name of the device the transport was serving.
    pub device: &'a str,
    pub error: BoxError,
}

type Handler = Arc<dyn Fn(&CallbackError<'_>) + Send + Sync + 'static>;

static HANDLER: RwLock<Option<Handler>> = RwLock::new(None);

/// Installs `handler` for every transport in the process.
pub fn set_error_handler<F>(handler: F)
where
    F: Fn(&CallbackError<'_>) + Send + Sync + 'static,
{
    *HANDLER.write().unwrap_or_else(|e| e.into_inner()) = Some(Arc::new(handler));
}

/// Restores the default logging handler.
pub fn reset_error_handler() {
    *HANDLER.write().unwrap_or_else(|e| e.into_inner()) = None;
}

pub(crate) fn report(failure: CallbackError<'_>) {
    // Not held while the handler runs: it may install a new one.
    let handler = HANDLER.read().unwrap_or_else(|e| e.into_inner()).clone();
    match handler {
        Some(handler) => handler(&failure),
        None => log::error!(
            "[{}] {}: {}",
            failure.device,
            failure.message,
            failure.error
        ),
    }
}
