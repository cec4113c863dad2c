// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The outer-header buffer a push-tunnel action carries.

use crate::config::HeaderError;
use core::fmt;

/// A fixed-capacity byte buffer holding the materialized outer header of
/// a push-tunnel action: Ethernet + IPv4 composed by the core, then the
/// L4 and tunnel bytes appended by the netdev callback.
#[derive(Clone)]
pub struct TunnelHeader {
    len: usize,
    buf: [u8; TunnelHeader::CAPACITY],
}

impl TunnelHeader {
    /// Room for the largest outer header any supported tunnel composes.
    pub const CAPACITY: usize = 512;

    /// An empty header buffer.
    #[must_use]
    pub fn new() -> TunnelHeader {
        TunnelHeader {
            len: 0,
            buf: [0; TunnelHeader::CAPACITY],
        }
    }

    /// Discard any composed bytes.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// The number of composed bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True iff nothing has been composed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The composed bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// The composed bytes, mutably.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buf[..self.len]
    }

    /// Extend the composed region by `len` zeroed bytes, returning the
    /// new region.
    ///
    /// # Errors
    ///
    /// Returns [`HeaderError::NoRoom`] if the capacity would be
    /// exceeded.
    pub fn append(&mut self, len: usize) -> Result<&mut [u8], HeaderError> {
        if self.len + len > TunnelHeader::CAPACITY {
            return Err(HeaderError::NoRoom { needed: len });
        }
        let start = self.len;
        self.len += len;
        self.buf[start..self.len].fill(0);
        Ok(&mut self.buf[start..self.len])
    }

    /// Append a copy of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`HeaderError::NoRoom`] if the capacity would be
    /// exceeded.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) -> Result<(), HeaderError> {
        let room = self.append(bytes.len())?;
        room.copy_from_slice(bytes);
        Ok(())
    }
}

impl Default for TunnelHeader {
    fn default() -> TunnelHeader {
        TunnelHeader::new()
    }
}

impl fmt::Debug for TunnelHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TunnelHeader")
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)] // valid in test code
#[cfg(test)]
mod test {
    use super::TunnelHeader;
    use crate::config::HeaderError;

    #[test]
    fn append_tracks_length_and_zeroes() {
        let mut header = TunnelHeader::new();
        assert!(header.is_empty());
        let room = header.append(4).unwrap();
        room.copy_from_slice(&[1, 2, 3, 4]);
        header.extend_from_slice(&[5, 6]).unwrap();
        assert_eq!(header.as_slice(), &[1, 2, 3, 4, 5, 6]);
        header.clear();
        assert!(header.is_empty());
        // Reused buffers hand out zeroed regions.
        assert_eq!(header.append(6).unwrap(), &[0; 6]);
    }

    #[test]
    fn capacity_is_enforced() {
        let mut header = TunnelHeader::new();
        header.append(TunnelHeader::CAPACITY).unwrap();
        assert!(matches!(
            header.append(1),
            Err(HeaderError::NoRoom { needed: 1 })
        ));
    }
}
