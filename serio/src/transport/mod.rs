//! The serial transport.
//!
//! [`SerialTransport`] is a cheap, clonable handle used by the application
//! (usually from inside its [`Protocol`]). The matching [`Driver`] is a task
//! that waits on device readiness, moves bytes, and delivers protocol
//! callbacks. Both share one `Core` holding the write queue, flow control and
//! lifecycle state.
//!
//! Everything runs on a single thread: the handle is `!Send` and the driver
//! must be spawned on a tokio `LocalSet`.
//!
//! # Example
//!
//! ```rust,ignore
//! use serio::{SerialTransport, TransportConfig};
//!
//! let local = tokio::task::LocalSet::new();
//! local.run_until(async {
//!     let transport = SerialTransport::spawn_local(device, MyProtocol::default(), TransportConfig::default())?;
//!     transport.write(&b"AT\r\n"[..]);
//!     Ok::<_, serio::Error>(())
//! }).await?;
//! ```

mod driver;

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;

use bytes::{Bytes, BytesMut};
use futures::task::AtomicWaker;

use crate::buffer::WriteQueue;
use crate::config::{ReadinessMode, TransportConfig};
use crate::device::{DeviceInfo, SerialDevice};
use crate::error::{Error, Result, is_transient};
use crate::flow::{FlowControl, FlowSignal, WaterMarks};
use crate::protocol::{Notification, Protocol};
use crate::readiness::{self, IoHandler};

pub use driver::Driver;

/// Transport lifecycle. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Reading and writing.
    Active,
    /// `close()` was called; draining the write queue.
    Closing,
    /// Resources released; `connection_lost` scheduled.
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadState {
    Reading,
    Paused,
}

/// Values returned by [`SerialTransport::get_extra_info`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtraInfo {
    /// Key `"serial"`.
    Serial(DeviceInfo),
    /// Key `"write_buffer_size"`.
    WriteBufferSize(usize),
    /// Key `"closing"`.
    Closing(bool),
}

/// Transport state shared by the handle and the driver.
pub(crate) struct Core {
    /// `None` once released.
    device: Option<Box<dyn SerialDevice>>,
    info: DeviceInfo,
    mode: ReadinessMode,
    read_buffer_size: usize,
    queue: WriteQueue,
    flow: FlowControl,
    lifecycle: Lifecycle,
    reading: ReadState,
    /// Callbacks waiting for the driver.
    outbox: VecDeque<Notification>,
}

impl Core {
    pub(crate) fn new(
        device: Box<dyn SerialDevice>,
        config: &TransportConfig,
        mode: ReadinessMode,
    ) -> Result<Self> {
        Ok(Self {
            info: DeviceInfo::of(device.as_ref()),
            device: Some(device),
            mode,
            read_buffer_size: config.read_buffer_size,
            queue: WriteQueue::new(),
            flow: FlowControl::new(config.water_marks()?),
            lifecycle: Lifecycle::Active,
            reading: ReadState::Reading,
            outbox: VecDeque::new(),
        })
    }

    fn name(&self) -> &str {
        &self.info.name
    }

    fn is_closed(&self) -> bool {
        self.lifecycle == Lifecycle::Closed
    }

    pub(crate) fn wants_read(&self) -> bool {
        self.lifecycle == Lifecycle::Active && self.reading == ReadState::Reading
    }

    pub(crate) fn wants_write(&self) -> bool {
        self.lifecycle != Lifecycle::Closed && !self.queue.is_empty()
    }

    pub(crate) fn next_notification(&mut self) -> Option<Notification> {
        self.outbox.pop_front()
    }

    fn write(&mut self, data: Bytes) {
        if self.lifecycle != Lifecycle::Active {
            log::trace!("[{}] write of {} bytes ignored while {:?}", self.name(), data.len(), self.lifecycle);
            return;
        }
        if data.is_empty() {
            return;
        }

        self.queue.push(data);
        self.check_flow();
    }

    fn check_flow(&mut self) {
        let pending = self.queue.pending();
        match self.flow.evaluate(pending) {
            Some(FlowSignal::Pause) => {
                log::debug!("[{}] write buffer at {} bytes, pausing protocol", self.name(), pending);
                self.outbox.push_back(Notification::PauseWriting);
            }
            Some(FlowSignal::Resume) => {
                log::debug!("[{}] write buffer at {} bytes, resuming protocol", self.name(), pending);
                self.outbox.push_back(Notification::ResumeWriting);
            }
            None => {}
        }
    }

    fn set_limits(&mut self, high: Option<usize>, low: Option<usize>) -> Result<()> {
        let marks = WaterMarks::from_limits(high, low)?;
        self.flow.set_marks(marks);
        self.check_flow();
        Ok(())
    }

    fn close(&mut self) {
        if self.lifecycle != Lifecycle::Active {
            return;
        }

        self.lifecycle = Lifecycle::Closing;
        log::debug!("[{}] closing with {} bytes pending", self.name(), self.queue.pending());
        if self.queue.is_empty() {
            self.finish(None);
        }
    }

    fn abort(&mut self) {
        if self.is_closed() {
            return;
        }

        let dropped = self.queue.clear();
        log::debug!("[{}] aborted, discarding {} bytes", self.name(), dropped);
        self.finish(None);
    }

    /// Terminates the transport after an unrecoverable device failure.
    pub(crate) fn fatal(&mut self, err: io::Error) {
        if self.is_closed() {
            return;
        }

        log::warn!("[{}] fatal error: {}", self.name(), err);
        self.queue.clear();
        self.finish(Some(Error::DeviceIo(err)));
    }

    fn finish(&mut self, error: Option<Error>) {
        self.lifecycle = Lifecycle::Closed;
        self.queue.clear();
        self.flow.reset();
        self.outbox.push_back(Notification::ConnectionLost(error));
    }

    /// Closes the device. Safe to call more than once.
    pub(crate) fn release_device(&mut self) {
        if let Some(mut device) = self.device.take() {
            if let Err(e) = device.close() {
                log::warn!("[{}] error closing device: {}", self.name(), e);
            }
            log::debug!("[{}] device closed", self.name());
        }
    }

    /// Shuts down without notifying anyone. Used when the driver goes away
    /// before the transport closed.
    pub(crate) fn detach(&mut self) {
        if self.lifecycle != Lifecycle::Closed {
            log::debug!("[{}] driver dropped while {:?}", self.name(), self.lifecycle);
            self.lifecycle = Lifecycle::Closed;
            self.queue.clear();
            self.outbox.clear();
        }
        self.release_device();
    }

    pub(crate) fn read_ready(&mut self) -> io::Result<()> {
        if !self.wants_read() {
            return Ok(());
        }
        let Some(device) = self.device.as_mut() else {
            return Ok(());
        };

        let mut buf = BytesMut::zeroed(self.read_buffer_size);
        match device.read(&mut buf) {
            Ok(0) => Err(io::ErrorKind::WouldBlock.into()),
            Ok(n) => {
                buf.truncate(n);
                log::trace!("[{}] read {} bytes", self.info.name, n);
                self.outbox.push_back(Notification::DataReceived(buf.freeze()));
                Ok(())
            }
            Err(e) if is_transient(&e) => Err(io::ErrorKind::WouldBlock.into()),
            Err(e) => {
                self.fatal(e);
                Ok(())
            }
        }
    }

    pub(crate) fn write_ready(&mut self) -> io::Result<()> {
        if self.lifecycle == Lifecycle::Closed {
            return Ok(());
        }
        let (Some(head), Some(device)) = (self.queue.front(), self.device.as_mut()) else {
            return Ok(());
        };

        let outcome = match device.write(head) {
            Ok(0) => Err(io::ErrorKind::WouldBlock.into()),
            Ok(n) => {
                log::trace!("[{}] wrote {} of {} bytes", self.info.name, n, head.len());
                self.queue.consume(n);
                Ok(())
            }
            Err(e) if is_transient(&e) => Err(io::ErrorKind::WouldBlock.into()),
            Err(e) => {
                self.fatal(e);
                return Ok(());
            }
        };

        self.check_flow();
        if self.lifecycle == Lifecycle::Closing && self.queue.is_empty() {
            log::debug!("[{}] write buffer drained", self.name());
            self.finish(None);
        }
        outcome
    }

    fn bytes_to_read(&self) -> io::Result<u32> {
        self.device.as_ref().map_or(Ok(0), |d| d.bytes_to_read())
    }

    fn bytes_to_write(&self) -> io::Result<u32> {
        self.device.as_ref().map_or(Ok(0), |d| d.bytes_to_write())
    }
}

/// Everything the handle and the driver share.
pub(crate) struct Shared {
    pub(crate) core: RefCell<Core>,
    /// Set by the handle whenever the driver has something new to look at.
    dirty: Cell<bool>,
    waker: AtomicWaker,
}

impl Shared {
    fn update<R>(&self, f: impl FnOnce(&mut Core) -> R) -> R {
        let result = f(&mut self.core.borrow_mut());
        self.dirty.set(true);
        self.waker.wake();
        result
    }
}

/// Adapter the readiness source drives.
struct CoreIo<'a>(&'a Shared);

impl IoHandler for CoreIo<'_> {
    fn on_readable(&mut self) -> io::Result<()> {
        self.0.core.borrow_mut().read_ready()
    }

    fn on_writable(&mut self) -> io::Result<()> {
        self.0.core.borrow_mut().write_ready()
    }

    fn bytes_to_read(&self) -> io::Result<u32> {
        self.0.core.borrow().bytes_to_read()
    }

    fn bytes_to_write(&self) -> io::Result<u32> {
        self.0.core.borrow().bytes_to_write()
    }
}

/// Handle to a running serial transport.
///
/// Every method returns immediately. Writes are queued and flushed by the
/// driver as the device accepts them.
#[derive(Clone)]
pub struct SerialTransport {
    shared: Rc<Shared>,
}

impl SerialTransport {
    /// Builds a transport around an open device.
    ///
    /// Returns the handle and the driver task; the driver must be polled on
    /// the same thread (e.g. with `tokio::task::spawn_local`) for anything to
    /// happen. `connection_made` is the first thing the driver does.
    ///
    /// Must be called from within a tokio runtime. Fails with
    /// `PlatformUnsupported` when no readiness strategy fits the device.
    pub fn new<D, P>(device: D, protocol: P, config: TransportConfig) -> Result<(Self, Driver)>
    where
        D: SerialDevice + 'static,
        P: Protocol + 'static,
    {
        config.validate()?;

        let mut device: Box<dyn SerialDevice> = Box::new(device);
        device.set_nonblocking()?;

        let readiness = readiness::select(&config, device.as_ref())?;
        let core = Core::new(device, &config, readiness.mode())?;
        log::debug!("[{}] transport created in {:?} mode", core.name(), core.mode);

        let shared = Rc::new(Shared {
            core: RefCell::new(core),
            dirty: Cell::new(false),
            waker: AtomicWaker::new(),
        });
        let driver = Driver::new(shared.clone(), readiness, Box::new(protocol));
        Ok((Self { shared }, driver))
    }

    /// Builds a transport and spawns its driver on the current `LocalSet`.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a `LocalSet`.
    pub fn spawn_local<D, P>(device: D, protocol: P, config: TransportConfig) -> Result<Self>
    where
        D: SerialDevice + 'static,
        P: Protocol + 'static,
    {
        let (transport, driver) = Self::new(device, protocol, config)?;
        tokio::task::spawn_local(driver.run());
        Ok(transport)
    }

    /// Queues `data` for sending. Ignored once closing.
    pub fn write(&self, data: impl Into<Bytes>) {
        let data = data.into();
        self.shared.update(|core| core.write(data));
    }

    /// Closes after the write buffer has drained. Stops reading immediately.
    pub fn close(&self) {
        self.shared.update(Core::close);
    }

    /// Closes immediately, discarding buffered data.
    pub fn abort(&self) {
        self.shared.update(Core::abort);
    }

    pub fn is_closing(&self) -> bool {
        self.lifecycle() != Lifecycle::Active
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.shared.core.borrow().lifecycle
    }

    /// Stops delivering `data_received` until `resume_reading`.
    pub fn pause_reading(&self) {
        self.shared.update(|core| {
            if core.lifecycle == Lifecycle::Active {
                core.reading = ReadState::Paused;
            }
        });
    }

    pub fn resume_reading(&self) {
        self.shared.update(|core| {
            if core.lifecycle == Lifecycle::Active {
                core.reading = ReadState::Reading;
            }
        });
    }

    pub fn is_reading(&self) -> bool {
        self.shared.core.borrow().wants_read()
    }

    /// Looks up optional transport information by name.
    ///
    /// Known names are `"serial"`, `"write_buffer_size"` and `"closing"`.
    pub fn get_extra_info(&self, name: &str) -> Option<ExtraInfo> {
        let core = self.shared.core.borrow();
        match name {
            "serial" => Some(ExtraInfo::Serial(core.info.clone())),
            "write_buffer_size" => Some(ExtraInfo::WriteBufferSize(core.queue.pending())),
            "closing" => Some(ExtraInfo::Closing(core.lifecycle != Lifecycle::Active)),
            _ => None,
        }
    }

    pub fn get_extra_info_or(&self, name: &str, default: ExtraInfo) -> ExtraInfo {
        self.get_extra_info(name).unwrap_or(default)
    }

    /// Serial lines have no half-close.
    pub fn can_write_eof(&self) -> bool {
        false
    }

    pub fn write_eof(&self) -> Result<()> {
        Err(Error::EofUnsupported)
    }

    /// Bytes queued but not yet accepted by the device.
    pub fn get_write_buffer_size(&self) -> usize {
        self.shared.core.borrow().queue.pending()
    }

    pub fn is_flushed(&self) -> bool {
        self.get_write_buffer_size() == 0
    }

    pub fn get_write_buffer_limits(&self) -> WaterMarks {
        self.shared.core.borrow().flow.marks()
    }

    /// Sets the flow-control water marks.
    ///
    /// A missing `high` defaults to `4 * low` (or 64 KiB if both are
    /// missing); a missing `low` to `high / 4`. Rejects `high < low` and
    /// leaves the current limits untouched in that case.
    pub fn set_write_buffer_limits(&self, high: Option<usize>, low: Option<usize>) -> Result<()> {
        self.shared.update(|core| core.set_limits(high, low))
    }

    pub fn readiness_mode(&self) -> ReadinessMode {
        self.shared.core.borrow().mode
    }
}

impl core::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let core = self.shared.core.borrow();
        f.debug_struct("SerialTransport")
            .field("device", &core.info.name)
            .field("mode", &core.mode)
            .field("lifecycle", &core.lifecycle)
            .field("pending", &core.queue.pending())
            .finish()
    }
}
