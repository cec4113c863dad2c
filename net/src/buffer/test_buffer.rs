// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Toy implementation of [`PacketBuffer`] which is useful for testing.
//!
//! [`PacketBuffer`]: crate::buffer::PacketBuffer

use crate::buffer::{
    Append, BufferNotLongEnough, Headroom, NotEnoughHeadRoom, NotEnoughTailRoom, Prepend, Tailroom,
    TrimFromEnd, TrimFromStart,
};
use tracing::trace;

// Caution: do not implement Clone for `TestBuffer`.
// Clone would significantly deviate from the mechanics of a real packet
// buffer.
/// Toy data structure which implements [`PacketBuffer`]
///
/// The core function of this structure is to facilitate testing by
/// "faking" the useful properties of a real driver-owned buffer (fixed
/// capacity, bounded head/tailroom) without the I/O layer.
///
/// [`PacketBuffer`]: crate::buffer::PacketBuffer
#[derive(Debug)]
pub struct TestBuffer {
    backing: Vec<u8>,
    head: usize,
    tail: usize,
}

impl TestBuffer {
    const CAPACITY: usize = 2048;
    const HEADROOM: usize = 128;

    /// Create a new (empty) `TestBuffer`.
    #[must_use]
    pub fn new() -> TestBuffer {
        TestBuffer {
            backing: vec![0; TestBuffer::CAPACITY],
            head: TestBuffer::HEADROOM,
            tail: TestBuffer::HEADROOM,
        }
    }

    /// Create a new `TestBuffer` holding a copy of `data`.
    ///
    /// # Panics
    ///
    /// Panics if `data` exceeds the (fixed, test-only) capacity.
    #[must_use]
    pub fn from_slice(data: &[u8]) -> TestBuffer {
        let mut buffer = TestBuffer::new();
        buffer.tail = buffer.head + data.len();
        assert!(
            buffer.tail <= TestBuffer::CAPACITY,
            "slice exceeds test buffer capacity"
        );
        buffer.backing[buffer.head..buffer.tail].copy_from_slice(data);
        buffer
    }

    /// The number of bytes the buffer currently holds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tail - self.head
    }

    /// True iff the buffer holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }
}

impl Default for TestBuffer {
    fn default() -> TestBuffer {
        TestBuffer::new()
    }
}

impl Drop for TestBuffer {
    fn drop(&mut self) {
        trace!("Dropping TestBuffer");
    }
}

impl AsRef<[u8]> for TestBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.backing[self.head..self.tail]
    }
}

impl AsMut<[u8]> for TestBuffer {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.backing[self.head..self.tail]
    }
}

impl Headroom for TestBuffer {
    #[allow(clippy::cast_possible_truncation)] // capacity fits in u16
    fn headroom(&self) -> u16 {
        self.head as u16
    }
}

impl Tailroom for TestBuffer {
    #[allow(clippy::cast_possible_truncation)] // capacity fits in u16
    fn tailroom(&self) -> u16 {
        (TestBuffer::CAPACITY - self.tail) as u16
    }
}

impl Prepend for TestBuffer {
    type Error = NotEnoughHeadRoom;

    fn prepend(&mut self, len: u16) -> Result<&mut [u8], Self::Error> {
        if len > self.headroom() {
            return Err(NotEnoughHeadRoom {
                requested: len,
                available: self.headroom(),
            });
        }
        self.head -= len as usize;
        self.backing[self.head..self.head + len as usize].fill(0);
        Ok(&mut self.backing[self.head..self.tail])
    }
}

impl Append for TestBuffer {
    type Error = NotEnoughTailRoom;

    fn append(&mut self, len: u16) -> Result<&mut [u8], Self::Error> {
        if len > self.tailroom() {
            return Err(NotEnoughTailRoom {
                requested: len,
                available: self.tailroom(),
            });
        }
        let start = self.tail;
        self.tail += len as usize;
        self.backing[start..self.tail].fill(0);
        Ok(&mut self.backing[start..self.tail])
    }
}

impl TrimFromStart for TestBuffer {
    type Error = BufferNotLongEnough;

    fn trim_from_start(&mut self, len: u16) -> Result<&mut [u8], Self::Error> {
        if usize::from(len) > self.len() {
            #[allow(clippy::cast_possible_truncation)] // capacity fits in u16
            return Err(BufferNotLongEnough {
                requested: len,
                held: self.len() as u16,
            });
        }
        self.head += len as usize;
        Ok(&mut self.backing[self.head..self.tail])
    }
}

impl TrimFromEnd for TestBuffer {
    type Error = BufferNotLongEnough;

    fn trim_from_end(&mut self, len: u16) -> Result<&mut [u8], Self::Error> {
        if usize::from(len) > self.len() {
            #[allow(clippy::cast_possible_truncation)] // capacity fits in u16
            return Err(BufferNotLongEnough {
                requested: len,
                held: self.len() as u16,
            });
        }
        self.tail -= len as usize;
        Ok(&mut self.backing[self.head..self.tail])
    }
}
