//! The task that owns the protocol and the readiness source.

use std::io;
use std::rc::Rc;
use std::task::{Context, Poll};

use futures::future::poll_fn;

use super::{CoreIo, SerialTransport, Shared};
use crate::protocol::{CallbackResult, Notification, Protocol};
use crate::readiness::Readiness;
use crate::sink::{self, CallbackError};

/// Drives a [`SerialTransport`]: waits for readiness, moves bytes, and
/// invokes the protocol.
///
/// Created by [`SerialTransport::new`]. Resolves after `connection_lost` has
/// been delivered.
pub struct Driver {
    shared: Rc<Shared>,
    /// Dropped as soon as the transport closes.
    readiness: Option<Box<dyn Readiness>>,
    protocol: Box<dyn Protocol>,
    name: String,
}

impl Driver {
    pub(crate) fn new(
        shared: Rc<Shared>,
        readiness: Box<dyn Readiness>,
        protocol: Box<dyn Protocol>,
    ) -> Self {
        let name = shared.core.borrow().info.name.clone();
        Self {
            shared,
            readiness: Some(readiness),
            protocol,
            name,
        }
    }

    pub async fn run(mut self) {
        let transport = SerialTransport {
            shared: self.shared.clone(),
        };
        let result = self.protocol.connection_made(transport);
        self.check("protocol.connection_made() failed", result);

        loop {
            if self.dispatch() {
                break;
            }

            self.sync_interest();
            let polled = poll_fn(|cx| self.poll_io(cx)).await;
            if let Err(e) = polled {
                log::error!("[{}] device failed: {}", self.name, e);
                self.shared.core.borrow_mut().fatal(e);
            }
        }

        log::debug!("[{}] driver finished", self.name);
    }

    /// Delivers queued callbacks. Returns true once `connection_lost` went
    /// out. The device is released before `connection_lost` runs.
    fn dispatch(&mut self) -> bool {
        loop {
            let Some(note) = self.shared.core.borrow_mut().next_notification() else {
                return false;
            };

            let lost = note.is_connection_lost();
            if lost {
                self.release();
            }
            let (message, result) = note.deliver(self.protocol.as_mut());
            self.check(message, result);
            if lost {
                return true;
            }
        }
    }

    fn check(&self, message: &'static str, result: CallbackResult) {
        if let Err(error) = result {
            sink::report(CallbackError {
                message,
                device: &self.name,
                error,
            });
        }
    }

    fn sync_interest(&mut self) {
        let (read, write) = {
            let core = self.shared.core.borrow();
            (core.wants_read(), core.wants_write())
        };
        if let Some(readiness) = self.readiness.as_mut() {
            readiness.sync(read, write);
        }
    }

    fn poll_io(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.shared.waker.register(cx.waker());
        if self.shared.dirty.replace(false) {
            return Poll::Ready(Ok(()));
        }

        match self.readiness.as_mut() {
            Some(readiness) => readiness.poll_ready(cx, &mut CoreIo(&self.shared)),
            None => Poll::Pending,
        }
    }

    fn release(&mut self) {
        if let Some(readiness) = self.readiness.take() {
            log::debug!("[{}] releasing {:?} readiness", self.name, readiness.mode());
        }
        self.shared.core.borrow_mut().release_device();
    }
}

impl Drop for Driver {
    fn drop(&mut self) {
        self.readiness.take();
        if let Ok(mut core) = self.shared.core.try_borrow_mut() {
            core.detach();
        }
    }
}
