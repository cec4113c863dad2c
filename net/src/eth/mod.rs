// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Ethernet and IEEE 802.2 header records.

pub mod ethtype;
pub mod mac;

use crate::eth::ethtype::EthType;
use crate::eth::mac::Mac;
use crate::wire::Be16;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// An Ethernet II header.
#[repr(C)]
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
    Unaligned,
)]
pub struct EthHdr {
    /// Destination address.
    pub dst: Mac,
    /// Source address.
    pub src: Mac,
    /// Ethertype of the payload, in network byte order.
    pub ether_type: Be16,
}

impl EthHdr {
    /// Length of the header in bytes.
    pub const LEN: usize = 14;

    /// Minimum Ethernet payload length.
    pub const PAYLOAD_MIN: usize = 46;
    /// Maximum (untagged) Ethernet payload length.
    pub const PAYLOAD_MAX: usize = 1500;
    /// Minimum total frame length.
    pub const TOTAL_MIN: usize = EthHdr::LEN + EthHdr::PAYLOAD_MIN;
    /// Maximum (untagged) total frame length.
    pub const TOTAL_MAX: usize = EthHdr::LEN + EthHdr::PAYLOAD_MAX;

    /// Build a header from its parts.
    #[must_use]
    pub fn new(dst: Mac, src: Mac, ether_type: EthType) -> EthHdr {
        EthHdr {
            dst,
            src,
            ether_type: Be16::new(ether_type.raw()),
        }
    }

    /// The ethertype as a typed value.
    #[must_use]
    pub fn ether_type(&self) -> EthType {
        EthType::new(self.ether_type.get())
    }

    /// Set the ethertype from a typed value.
    pub fn set_ether_type(&mut self, ether_type: EthType) {
        self.ether_type.set(ether_type.raw());
    }
}

const _: () = assert!(core::mem::size_of::<EthHdr>() == EthHdr::LEN);

/// SAP value designating a SNAP header.
pub const LLC_DSAP_SNAP: u8 = 0xaa;
/// Source SAP value designating a SNAP header.
pub const LLC_SSAP_SNAP: u8 = 0xaa;
/// LLC control value for unnumbered information, used with SNAP.
pub const LLC_CNTL_SNAP: u8 = 3;
/// LLC SAP value used by spanning tree frames.
pub const STP_LLC_SAP: u8 = 0x42;
/// LLC control value used by spanning tree frames.
pub const STP_LLC_CNTL: u8 = 0x03;

/// An IEEE 802.2 LLC header.
#[repr(C)]
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
    Unaligned,
)]
pub struct LlcHdr {
    /// Destination service access point.
    pub dsap: u8,
    /// Source service access point.
    pub ssap: u8,
    /// Control field.
    pub cntl: u8,
}

impl LlcHdr {
    /// Length of the header in bytes.
    pub const LEN: usize = 3;
}

const _: () = assert!(core::mem::size_of::<LlcHdr>() == LlcHdr::LEN);

/// A SNAP header (follows an LLC header with the SNAP SAPs).
#[repr(C)]
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
    Unaligned,
)]
pub struct SnapHdr {
    /// Organizationally unique identifier; all-zero for encapsulated
    /// Ethernet.
    pub org: [u8; 3],
    /// Protocol type of the payload (an ethertype when `org` is zero).
    pub snap_type: Be16,
}

impl SnapHdr {
    /// Length of the header in bytes.
    pub const LEN: usize = 5;

    /// The OUI carried by SNAP headers encapsulating Ethernet protocols.
    pub const ORG_ETHERNET: [u8; 3] = [0, 0, 0];
}

const _: () = assert!(core::mem::size_of::<SnapHdr>() == SnapHdr::LEN);

/// A combined LLC + SNAP header.
#[repr(C)]
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
    Unaligned,
)]
pub struct LlcSnapHdr {
    /// The LLC portion.
    pub llc: LlcHdr,
    /// The SNAP portion.
    pub snap: SnapHdr,
}

impl LlcSnapHdr {
    /// Length of the header in bytes.
    pub const LEN: usize = LlcHdr::LEN + SnapHdr::LEN;
}

const _: () = assert!(core::mem::size_of::<LlcSnapHdr>() == LlcSnapHdr::LEN);

#[allow(clippy::unwrap_used, clippy::expect_used)] // valid in test code
#[cfg(test)]
mod test {
    use super::{EthHdr, LlcSnapHdr};
    use crate::eth::ethtype::EthType;
    use crate::eth::mac::Mac;
    use zerocopy::{FromBytes, IntoBytes};

    #[test]
    fn header_matches_wire_layout() {
        let hdr = EthHdr::new(
            Mac([0xff; 6]),
            Mac([0x02, 0, 0, 0, 0, 1]),
            EthType::IPV4,
        );
        let bytes = hdr.as_bytes();
        assert_eq!(&bytes[0..6], &[0xff; 6]);
        assert_eq!(&bytes[6..12], &[0x02, 0, 0, 0, 0, 1]);
        assert_eq!(&bytes[12..14], &[0x08, 0x00]);
    }

    #[test]
    fn overlay_at_odd_offset() {
        // Records must be readable at any 2-byte boundary; zerocopy
        // guarantees 1-byte, which subsumes the contract.
        let mut buf = [0u8; EthHdr::LEN + 2];
        buf[2..8].copy_from_slice(&[1, 2, 3, 4, 5, 6]);
        buf[14] = 0x86;
        buf[15] = 0xdd;
        let (hdr, _) = EthHdr::ref_from_prefix(&buf[2..]).unwrap();
        assert_eq!(hdr.dst, Mac([1, 2, 3, 4, 5, 6]));
        assert_eq!(hdr.ether_type(), EthType::IPV6);
    }

    #[test]
    fn llc_snap_is_contiguous() {
        assert_eq!(LlcSnapHdr::LEN, 8);
    }
}
