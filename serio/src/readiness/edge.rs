//! Descriptor readiness through the tokio reactor.

use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::task::{Context, Poll, ready};

use tokio::io::Interest;
use tokio::io::unix::AsyncFd;

use super::{IoHandler, Readiness};
use crate::config::ReadinessMode;

/// Borrowed descriptor. The device keeps ownership and closes it after the
/// registration has been dropped.
#[derive(Debug)]
struct DeviceFd(RawFd);

impl AsRawFd for DeviceFd {
    fn as_raw_fd(&self) -> RawFd {
        self.0
    }
}

#[derive(Debug)]
pub(crate) struct EdgeReadiness {
    fd: AsyncFd<DeviceFd>,
    read_armed: bool,
    write_armed: bool,
    /// Alternates which direction is served first so a chatty device cannot
    /// starve the writer.
    write_first: bool,
}

impl EdgeReadiness {
    /// Registers `fd` with the reactor. Fails for descriptors epoll cannot
    /// wait on, such as regular files.
    pub(crate) fn register(fd: RawFd) -> io::Result<Self> {
        let fd = AsyncFd::with_interest(DeviceFd(fd), Interest::READABLE | Interest::WRITABLE)?;
        log::debug!("Registered descriptor {} for readiness", fd.get_ref().0);
        Ok(Self {
            fd,
            read_armed: true,
            write_armed: false,
            write_first: false,
        })
    }

    fn poll_read(&self, cx: &mut Context<'_>, io: &mut dyn IoHandler) -> Poll<io::Result<()>> {
        loop {
            let mut guard = ready!(self.fd.poll_read_ready(cx))?;
            let hung_up = guard.ready().is_read_closed();
            match guard.try_io(|_| io.on_readable()) {
                Ok(result) => return Poll::Ready(result),
                // Read-closed is never cleared, so a drained hung-up device
                // would report ready forever.
                Err(_would_block) if hung_up => {
                    return Poll::Ready(Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "device hung up",
                    )));
                }
                // Drained: readiness was cleared, poll again to re-register.
                Err(_would_block) => continue,
            }
        }
    }

    fn poll_write(&self, cx: &mut Context<'_>, io: &mut dyn IoHandler) -> Poll<io::Result<()>> {
        loop {
            let mut guard = ready!(self.fd.poll_write_ready(cx))?;
            match guard.try_io(|_| io.on_writable()) {
                Ok(result) => return Poll::Ready(result),
                Err(_would_block) => continue,
            }
        }
    }
}

impl Readiness for EdgeReadiness {
    fn mode(&self) -> ReadinessMode {
        ReadinessMode::Edge
    }

    fn arm_read(&mut self) {
        self.read_armed = true;
    }

    fn disarm_read(&mut self) {
        self.read_armed = false;
    }

    fn arm_write(&mut self) {
        self.write_armed = true;
    }

    fn disarm_write(&mut self) {
        self.write_armed = false;
    }

    fn is_read_armed(&self) -> bool {
        self.read_armed
    }

    fn is_write_armed(&self) -> bool {
        self.write_armed
    }

    fn poll_ready(&mut self, cx: &mut Context<'_>, io: &mut dyn IoHandler) -> Poll<io::Result<()>> {
        let write_first = self.write_first;
        self.write_first = !self.write_first;

        for write in [write_first, !write_first] {
            let polled = match write {
                true if self.write_armed => self.poll_write(cx, io),
                false if self.read_armed => self.poll_read(cx, io),
                _ => continue,
            };
            if polled.is_ready() {
                return polled;
            }
        }
        Poll::Pending
    }
}

impl Drop for EdgeReadiness {
    fn drop(&mut self) {
        log::debug!("Released readiness for descriptor {}", self.fd.get_ref().0);
    }
}
