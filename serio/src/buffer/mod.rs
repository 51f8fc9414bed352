//! Buffer management for the transport.
//!
//! This module provides:
//! - WriteQueue: FIFO of outgoing chunks with an exact pending byte count

mod queue;

pub use queue::WriteQueue;
