//! # serio - Non-blocking Serial Transport
//!
//! serio turns an open serial device into an event-driven byte stream that
//! lives on a single-threaded tokio event loop. It provides:
//!
//! - **Readiness-driven I/O**: descriptor readiness on unix, timed polling of
//!   the device buffer counters where no descriptor is available
//! - **Buffered writes**: `write` never blocks; chunks are queued and sent in
//!   order, surviving partial writes
//! - **Flow control**: the protocol is told to pause and resume writing as the
//!   queue crosses its high and low water marks
//! - **Orderly shutdown**: graceful close drains the queue, abort discards it,
//!   device failures end the connection with the error
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                   Protocol (application)                 │
//! ├─────────────────────────────────────────────────────────┤
//! │  SerialTransport handle   │          Driver task         │
//! │  write / close / abort    │  callbacks, readiness loop   │
//! ├─────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐ ┌──────────────┐ ┌─────────────────┐   │
//! │  │ WriteQueue  │ │ FlowControl  │ │    Lifecycle    │   │
//! │  └─────────────┘ └──────────────┘ └─────────────────┘   │
//! ├─────────────────────────────────────────────────────────┤
//! │  Readiness: EdgeReadiness (AsyncFd) | PollReadiness      │
//! ├─────────────────────────────────────────────────────────┤
//! │                SerialDevice (open handle)                │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use serio::{SerialTransport, TransportConfig};
//!
//! let local = tokio::task::LocalSet::new();
//! local.run_until(async {
//!     let transport = SerialTransport::spawn_local(device, protocol, TransportConfig::default())?;
//!     transport.write(&b"Hello, World!"[..]);
//!     transport.close();
//!     Ok::<_, serio::Error>(())
//! }).await?;
//! ```

#![deny(unsafe_code)]

use core::time::Duration;

pub mod buffer;
pub mod config;
pub mod device;
pub mod error;
pub mod flow;
pub mod protocol;
mod readiness;
pub mod sink;
pub mod transport;

// Re-export commonly used types
pub use bytes::Bytes;
pub use config::{ReadinessMode, TransportConfig};
pub use device::{DeviceInfo, SerialDevice};
pub use error::{BoxError, Error, Result};
pub use flow::WaterMarks;
pub use protocol::{CallbackResult, Protocol};
pub use transport::{Driver, ExtraInfo, Lifecycle, SerialTransport};

/// Default size of a single device read.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4096;

/// Default high water mark (64 KiB).
pub const DEFAULT_HIGH_WATER_MARK: usize = 64 * 1024;

/// Default low water mark (16 KiB).
pub const DEFAULT_LOW_WATER_MARK: usize = 16 * 1024;

/// Default poll period when the device has no waitable descriptor.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Poll mode only writes while the device has fewer output bytes pending.
pub const DEFAULT_POLL_WRITE_THRESHOLD: u32 = 1024;
