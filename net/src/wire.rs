// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Alignment-tolerant containers for multi-byte fields inside wire records.
//!
//! Received frames are not guaranteed to place L3 headers on 4-byte
//! boundaries: a 14-byte Ethernet header shifts everything after it to a
//! 2-byte boundary.  Any 32-bit-or-wider field inside an on-wire record
//! therefore lives in one of the containers below, which synthesize the
//! wide value from 16-bit half-words and never require more than 2-byte
//! alignment.  (The Rust representations here are in fact 1-byte aligned,
//! which satisfies the contract with margin.)

use core::fmt;
use std::net::Ipv6Addr;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// A 16-bit value stored in network byte order.
#[repr(transparent)]
#[derive(
    Copy, Clone, Default, PartialEq, Eq, Hash, FromBytes, IntoBytes, Immutable, KnownLayout,
    Unaligned,
)]
pub struct Be16([u8; 2]);

impl Be16 {
    /// The all-zero value.
    pub const ZERO: Be16 = Be16([0; 2]);

    /// Build a container holding `value` (host byte order).
    #[must_use]
    pub const fn new(value: u16) -> Be16 {
        Be16(value.to_be_bytes())
    }

    /// Read the contained value in host byte order.
    #[must_use]
    pub const fn get(self) -> u16 {
        u16::from_be_bytes(self.0)
    }

    /// Store `value` (host byte order).
    pub fn set(&mut self, value: u16) {
        self.0 = value.to_be_bytes();
    }

    /// True iff the contained value is zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0[0] == 0 && self.0[1] == 0
    }
}

impl fmt::Debug for Be16 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.get())
    }
}

impl From<u16> for Be16 {
    fn from(value: u16) -> Be16 {
        Be16::new(value)
    }
}

impl From<Be16> for u16 {
    fn from(value: Be16) -> u16 {
        value.get()
    }
}

/// A 32-bit network-byte-order value stored as two big-endian half-words.
///
/// The "16-aligned" container: the value can live at any 16-bit boundary,
/// and `get`/`set` assemble and split the half-words.
#[repr(transparent)]
#[derive(
    Copy, Clone, Default, PartialEq, Eq, Hash, FromBytes, IntoBytes, Immutable, KnownLayout,
    Unaligned,
)]
pub struct SplitBe32([Be16; 2]);

impl SplitBe32 {
    /// The all-zero value.
    pub const ZERO: SplitBe32 = SplitBe32([Be16::ZERO; 2]);

    /// Build a container holding `value` (host byte order).
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // truncation is the point of the split
    pub const fn new(value: u32) -> SplitBe32 {
        SplitBe32([Be16::new((value >> 16) as u16), Be16::new(value as u16)])
    }

    /// Read the contained value in host byte order.
    #[must_use]
    pub const fn get(self) -> u32 {
        ((self.0[0].get() as u32) << 16) | self.0[1].get() as u32
    }

    /// Store `value` (host byte order).
    #[allow(clippy::cast_possible_truncation)] // truncation is the point of the split
    pub fn set(&mut self, value: u32) {
        self.0[0].set((value >> 16) as u16);
        self.0[1].set(value as u16);
    }

    /// True iff the contained value is zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0[0].is_zero() && self.0[1].is_zero()
    }
}

impl fmt::Debug for SplitBe32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.get())
    }
}

impl From<u32> for SplitBe32 {
    fn from(value: u32) -> SplitBe32 {
        SplitBe32::new(value)
    }
}

impl From<SplitBe32> for u32 {
    fn from(value: SplitBe32) -> u32 {
        value.get()
    }
}

/// A 64-bit value stored in network byte order with no alignment demands.
#[repr(transparent)]
#[derive(
    Copy, Clone, Default, PartialEq, Eq, Hash, FromBytes, IntoBytes, Immutable, KnownLayout,
    Unaligned,
)]
pub struct Be64([u8; 8]);

impl Be64 {
    /// The all-zero value.
    pub const ZERO: Be64 = Be64([0; 8]);

    /// The all-ones value.
    pub const MAX: Be64 = Be64([0xff; 8]);

    /// Build a container holding `value` (host byte order).
    #[must_use]
    pub const fn new(value: u64) -> Be64 {
        Be64(value.to_be_bytes())
    }

    /// Read the contained value in host byte order.
    #[must_use]
    pub const fn get(self) -> u64 {
        u64::from_be_bytes(self.0)
    }

    /// Store `value` (host byte order).
    pub fn set(&mut self, value: u64) {
        self.0 = value.to_be_bytes();
    }
}

impl fmt::Debug for Be64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.get())
    }
}

impl From<u64> for Be64 {
    fn from(value: u64) -> Be64 {
        Be64::new(value)
    }
}

impl From<Be64> for u64 {
    fn from(value: Be64) -> u64 {
        value.get()
    }
}

/// An IPv6 address stored as eight big-endian hextets.
///
/// Mirrors [`std::net::Ipv6Addr`] but tolerates 16-bit alignment, so it
/// can be embedded in on-wire records.
#[repr(transparent)]
#[derive(
    Copy, Clone, Default, PartialEq, Eq, Hash, FromBytes, IntoBytes, Immutable, KnownLayout,
    Unaligned,
)]
pub struct SplitIp6([Be16; 8]);

impl SplitIp6 {
    /// The unspecified (`::`) address.
    pub const UNSPECIFIED: SplitIp6 = SplitIp6([Be16::ZERO; 8]);

    /// Read the address out as a [`Ipv6Addr`].
    #[must_use]
    pub fn get(self) -> Ipv6Addr {
        let s = self.0;
        Ipv6Addr::new(
            s[0].get(),
            s[1].get(),
            s[2].get(),
            s[3].get(),
            s[4].get(),
            s[5].get(),
            s[6].get(),
            s[7].get(),
        )
    }

    /// Store `addr` into the container.
    pub fn set(&mut self, addr: Ipv6Addr) {
        for (slot, segment) in self.0.iter_mut().zip(addr.segments()) {
            slot.set(segment);
        }
    }

    /// Access the raw sixteen octets of the address.
    #[must_use]
    pub fn octets(self) -> [u8; 16] {
        let mut ret = [0; 16];
        ret.copy_from_slice(self.as_bytes());
        ret
    }
}

impl fmt::Debug for SplitIp6 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

impl From<Ipv6Addr> for SplitIp6 {
    fn from(addr: Ipv6Addr) -> SplitIp6 {
        let mut ret = SplitIp6::UNSPECIFIED;
        ret.set(addr);
        ret
    }
}

impl From<SplitIp6> for Ipv6Addr {
    fn from(value: SplitIp6) -> Ipv6Addr {
        value.get()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)] // valid in test code
#[cfg(test)]
mod test {
    use super::{Be16, Be64, SplitBe32, SplitIp6};
    use std::net::Ipv6Addr;
    use zerocopy::IntoBytes;

    #[test]
    fn be16_round_trips_and_stores_big_endian() {
        bolero::check!().with_type().cloned().for_each(|value: u16| {
            let be = Be16::new(value);
            assert_eq!(be.get(), value);
            assert_eq!(be.as_bytes(), &value.to_be_bytes()[..]);
        });
    }

    #[test]
    fn split_be32_round_trips_and_stores_big_endian() {
        bolero::check!().with_type().cloned().for_each(|value: u32| {
            let split = SplitBe32::new(value);
            assert_eq!(split.get(), value);
            assert_eq!(split.as_bytes(), &value.to_be_bytes()[..]);
            assert_eq!(split.is_zero(), value == 0);
        });
    }

    #[test]
    fn be64_round_trips_and_stores_big_endian() {
        bolero::check!().with_type().cloned().for_each(|value: u64| {
            let be = Be64::new(value);
            assert_eq!(be.get(), value);
            assert_eq!(be.as_bytes(), &value.to_be_bytes()[..]);
        });
    }

    #[test]
    fn split_ip6_round_trips() {
        bolero::check!()
            .with_type()
            .cloned()
            .for_each(|octets: [u8; 16]| {
                let addr = Ipv6Addr::from(octets);
                let split = SplitIp6::from(addr);
                assert_eq!(split.get(), addr);
                assert_eq!(split.octets(), octets);
            });
    }

    #[test]
    fn containers_are_layout_compatible_with_the_wire() {
        assert_eq!(core::mem::size_of::<Be16>(), 2);
        assert_eq!(core::mem::align_of::<Be16>(), 1);
        assert_eq!(core::mem::size_of::<SplitBe32>(), 4);
        assert_eq!(core::mem::align_of::<SplitBe32>(), 1);
        assert_eq!(core::mem::size_of::<Be64>(), 8);
        assert_eq!(core::mem::align_of::<Be64>(), 1);
        assert_eq!(core::mem::size_of::<SplitIp6>(), 16);
        assert_eq!(core::mem::align_of::<SplitIp6>(), 1);
    }
}
