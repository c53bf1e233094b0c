//! Buffer management for efficient memory reuse.
//!
//! The [`BufferPool`] recycles record buffers between the record layer and the
//! handshake so a long-lived connection settles into zero steady-state
//! allocations. [`Buf`] wraps `Vec<u8>` and never prints its contents.

use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut};

use zeroize::Zeroize;

/// Buffer pool for reusing allocated buffers.
#[derive(Default)]
pub struct BufferPool {
    free: VecDeque<Buf>,
}

impl BufferPool {
    /// Take a Buffer from the pool.
    ///
    /// Creates a new buffer if none is free.
    pub fn pop(&mut self) -> Buf {
        self.free.pop_front().unwrap_or_default()
    }

    /// Return a buffer to the pool.
    ///
    /// The contents are wiped since buffers may have held plaintext.
    pub fn push(&mut self, mut buffer: Buf) {
        buffer.0.zeroize();
        self.free.push_front(buffer);
    }

    /// Number of buffers waiting for reuse.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.free.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }
}

impl fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("free", &self.free.len())
            .finish()
    }
}

/// Growable byte buffer used for records, handshake messages and crypto output.
#[derive(Default, Clone, PartialEq, Eq)]
pub struct Buf(Vec<u8>);

impl Buf {
    /// Create a new empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new buffer from a slice.
    pub fn from_slice(data: &[u8]) -> Self {
        Buf(data.to_vec())
    }

    /// Clear the buffer, removing all data.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Extend the buffer with a slice of bytes.
    pub fn extend_from_slice(&mut self, other: &[u8]) {
        self.0.extend_from_slice(other);
    }

    /// Push a single byte onto the buffer.
    pub fn push(&mut self, byte: u8) {
        self.0.push(byte);
    }

    /// Truncate the buffer to the specified length.
    /// If `len` is greater than the buffer's current length, this has no effect.
    pub fn truncate(&mut self, len: usize) {
        self.0.truncate(len);
    }

    /// Remove the first `n` bytes, shifting the rest to the front.
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.0.len());
        self.0.drain(..n);
    }

    /// Insert bytes at the front of the buffer.
    pub fn prepend(&mut self, data: &[u8]) {
        self.0.splice(0..0, data.iter().copied());
    }

    /// Convert the buffer into the underlying `Vec<u8>`.
    pub fn into_vec(mut self) -> Vec<u8> {
        std::mem::take(&mut self.0)
    }
}

impl Deref for Buf {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Buf {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl AsRef<[u8]> for Buf {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl AsMut<[u8]> for Buf {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl fmt::Debug for Buf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buf").field("len", &self.0.len()).finish()
    }
}

impl Zeroize for Buf {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}
