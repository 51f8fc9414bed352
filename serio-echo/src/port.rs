//! `SerialDevice` adapter for ports opened with the `serialport` crate.

use std::io;
use std::time::Duration;

use serialport::SerialPort;
use serio::{Error, SerialDevice};

#[cfg(unix)]
use std::os::unix::io::{AsRawFd, RawFd};

#[cfg(unix)]
type NativePort = serialport::TTYPort;
#[cfg(not(unix))]
type NativePort = Box<dyn SerialPort>;

pub struct Port {
    name: String,
    /// `None` once closed.
    port: Option<NativePort>,
}

impl Port {
    pub fn open(path: &str, baud_rate: u32) -> serio::Result<Self> {
        let builder = serialport::new(path, baud_rate).timeout(Duration::ZERO);
        #[cfg(unix)]
        let port = builder.open_native();
        #[cfg(not(unix))]
        let port = builder.open();
        let port = port.map_err(|e| Error::Connection(format!("could not open {path}: {e}")))?;

        log::info!("Opened {} at {} baud", path, baud_rate);
        Ok(Self {
            name: path.to_owned(),
            port: Some(port),
        })
    }

    fn port(&self) -> io::Result<&NativePort> {
        self.port
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "port closed"))
    }

    fn port_mut(&mut self) -> io::Result<&mut NativePort> {
        self.port
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "port closed"))
    }
}

impl SerialDevice for Port {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_nonblocking(&mut self) -> io::Result<()> {
        self.port_mut()?.set_timeout(Duration::ZERO)?;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match io::Read::read(self.port_mut()?, buf) {
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            other => other,
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match io::Write::write(self.port_mut()?, buf) {
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            other => other,
        }
    }

    fn bytes_to_read(&self) -> io::Result<u32> {
        Ok(self.port()?.bytes_to_read()?)
    }

    fn bytes_to_write(&self) -> io::Result<u32> {
        Ok(self.port()?.bytes_to_write()?)
    }

    #[cfg(unix)]
    fn raw_fd(&self) -> Option<RawFd> {
        self.port.as_ref().map(AsRawFd::as_raw_fd)
    }

    fn close(&mut self) -> io::Result<()> {
        // Dropping the port closes the descriptor.
        self.port.take();
        Ok(())
    }
}
