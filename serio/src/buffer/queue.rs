//! Outgoing chunk queue.
//!
//! Chunks are kept exactly as the caller wrote them. A partial send only
//! trims the head chunk, so transmission order always equals write order.

use std::collections::VecDeque;

use bytes::{Buf, Bytes};

/// FIFO of chunks waiting to be written to the device.
#[derive(Debug, Default)]
pub struct WriteQueue {
    /// Pending chunks, head first.
    chunks: VecDeque<Bytes>,

    /// Remaining bytes across all chunks.
    pending: usize,
}

impl WriteQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of bytes still to be sent.
    #[inline]
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Returns true if nothing is queued.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Returns the number of queued chunks.
    #[inline]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Appends a chunk at the tail.
    pub fn push(&mut self, chunk: Bytes) {
        self.pending += chunk.len();
        self.chunks.push_back(chunk);
    }

    /// Returns the chunk that must be sent next.
    pub fn front(&self) -> Option<&Bytes> {
        self.chunks.front()
    }

    /// Marks `n` bytes of the head chunk as sent.
    ///
    /// The head is popped once fully consumed; otherwise it is replaced by
    /// its unsent suffix. Returns the number of bytes actually consumed.
    pub fn consume(&mut self, n: usize) -> usize {
        let Some(head) = self.chunks.front_mut() else {
            return 0;
        };

        let n = core::cmp::min(n, head.len());
        if n == head.len() {
            self.chunks.pop_front();
        } else {
            head.advance(n);
        }
        self.pending -= n;
        n
    }

    /// Drops everything queued. Returns the number of bytes discarded.
    pub fn clear(&mut self) -> usize {
        let dropped = self.pending;
        self.chunks.clear();
        self.pending = 0;
        dropped
    }

    /// Iterates over queued chunks, head first.
    pub fn iter(&self) -> impl Iterator<Item = &Bytes> {
        self.chunks.iter()
    }
}
