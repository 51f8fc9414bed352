//! Scripted in-memory device.
//!
//! `MockDevice` is handed to the transport; the matching [`MockHandle`] stays
//! with the test and drives the device from the outside: feeding input,
//! limiting how much each write accepts, injecting failures and inspecting
//! what was sent.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;

use super::SerialDevice;

#[derive(Debug, Default)]
struct MockState {
    input: VecDeque<u8>,
    output: Vec<u8>,
    write_calls: Vec<usize>,
    write_limit: Option<usize>,
    write_blocked: bool,
    out_waiting: u32,
    read_error: Option<io::ErrorKind>,
    write_error: Option<io::ErrorKind>,
    counter_error: Option<io::ErrorKind>,
    nonblocking: bool,
    closed: bool,
}

/// In-memory device without a waitable descriptor.
#[derive(Debug)]
pub struct MockDevice {
    name: String,
    state: Rc<RefCell<MockState>>,
}

/// Test-side view of a [`MockDevice`].
#[derive(Debug, Clone)]
pub struct MockHandle {
    state: Rc<RefCell<MockState>>,
}

impl MockDevice {
    /// Creates a device and the handle that controls it.
    pub fn new(name: impl Into<String>) -> (Self, MockHandle) {
        let state = Rc::new(RefCell::new(MockState::default()));
        let device = Self {
            name: name.into(),
            state: state.clone(),
        };
        (device, MockHandle { state })
    }
}

impl MockHandle {
    /// Makes bytes available to the next reads.
    pub fn push_input(&self, data: &[u8]) {
        self.state.borrow_mut().input.extend(data);
    }

    /// Everything the transport has written so far.
    pub fn output(&self) -> Vec<u8> {
        self.state.borrow().output.clone()
    }

    /// Size of every successful write call, in order.
    pub fn write_calls(&self) -> Vec<usize> {
        self.state.borrow().write_calls.clone()
    }

    /// Caps how many bytes a single write accepts.
    pub fn set_write_limit(&self, limit: Option<usize>) {
        self.state.borrow_mut().write_limit = limit;
    }

    /// While set, every write fails with `WouldBlock`.
    pub fn set_write_blocked(&self, blocked: bool) {
        self.state.borrow_mut().write_blocked = blocked;
    }

    /// Value reported by `bytes_to_write`.
    pub fn set_out_waiting(&self, n: u32) {
        self.state.borrow_mut().out_waiting = n;
    }

    /// Makes the next read fail with `kind`.
    pub fn fail_next_read(&self, kind: io::ErrorKind) {
        self.state.borrow_mut().read_error = Some(kind);
    }

    /// Makes the next write fail with `kind`.
    pub fn fail_next_write(&self, kind: io::ErrorKind) {
        self.state.borrow_mut().write_error = Some(kind);
    }

    /// Makes every buffer counter query fail with `kind`.
    pub fn fail_counters(&self, kind: io::ErrorKind) {
        self.state.borrow_mut().counter_error = Some(kind);
    }

    pub fn is_nonblocking(&self) -> bool {
        self.state.borrow().nonblocking
    }

    pub fn is_closed(&self) -> bool {
        self.state.borrow().closed
    }
}

impl SerialDevice for MockDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_nonblocking(&mut self) -> io::Result<()> {
        self.state.borrow_mut().nonblocking = true;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.borrow_mut();
        if state.closed {
            return Err(io::ErrorKind::NotConnected.into());
        }
        if let Some(kind) = state.read_error.take() {
            return Err(io::Error::new(kind, "injected read failure"));
        }

        let n = core::cmp::min(buf.len(), state.input.len());
        for (slot, byte) in buf.iter_mut().zip(state.input.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.borrow_mut();
        if state.closed {
            return Err(io::ErrorKind::NotConnected.into());
        }
        if let Some(kind) = state.write_error.take() {
            return Err(io::Error::new(kind, "injected write failure"));
        }
        if state.write_blocked {
            return Err(io::ErrorKind::WouldBlock.into());
        }

        let n = state.write_limit.map_or(buf.len(), |limit| limit.min(buf.len()));
        state.output.extend_from_slice(&buf[..n]);
        state.write_calls.push(n);
        Ok(n)
    }

    fn bytes_to_read(&self) -> io::Result<u32> {
        let state = self.state.borrow();
        match state.counter_error {
            Some(kind) => Err(io::Error::new(kind, "injected counter failure")),
            None => Ok(state.input.len() as u32),
        }
    }

    fn bytes_to_write(&self) -> io::Result<u32> {
        let state = self.state.borrow();
        match state.counter_error {
            Some(kind) => Err(io::Error::new(kind, "injected counter failure")),
            None => Ok(state.out_waiting),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        self.state.borrow_mut().closed = true;
        Ok(())
    }
}
