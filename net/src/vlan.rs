// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! 802.1Q VLAN header records and tag control accessors.

use crate::eth::mac::Mac;
use crate::wire::Be16;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// The tag control information word of an 802.1Q tag, in host byte order.
///
/// Layout: PCP in the top 3 bits, CFI at bit 12, VID in the low 12 bits.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tci(pub u16);

impl Tci {
    /// Mask selecting the VLAN id.
    pub const VID_MASK: u16 = 0x0fff;
    /// Mask selecting the priority code point.
    pub const PCP_MASK: u16 = 0xe000;
    /// Shift of the priority code point.
    pub const PCP_SHIFT: u16 = 13;
    /// The canonical format indicator bit.
    pub const CFI: u16 = 0x1000;

    /// The VLAN id (low 12 bits).
    #[must_use]
    pub const fn vid(self) -> u16 {
        self.0 & Tci::VID_MASK
    }

    /// The priority code point (top 3 bits).
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // 3-bit value after the shift
    pub const fn pcp(self) -> u8 {
        ((self.0 & Tci::PCP_MASK) >> Tci::PCP_SHIFT) as u8
    }

    /// The canonical format indicator (bit 12).
    #[must_use]
    pub const fn cfi(self) -> bool {
        self.0 & Tci::CFI != 0
    }
}

impl From<u16> for Tci {
    fn from(value: u16) -> Tci {
        Tci(value)
    }
}

impl From<Tci> for u16 {
    fn from(value: Tci) -> u16 {
        value.0
    }
}

/// An 802.1Q tag as it appears on the wire, after the ethertype that
/// announced it.
#[repr(C)]
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
    Unaligned,
)]
pub struct VlanHdr {
    /// Tag control information; lowest 12 bits are the VLAN id.
    pub tci: Be16,
    /// Ethertype of what follows the tag.
    pub next_type: Be16,
}

impl VlanHdr {
    /// Length of the header in bytes.
    pub const LEN: usize = 4;

    /// The tag control information as a typed value.
    #[must_use]
    pub fn tci(&self) -> Tci {
        Tci(self.tci.get())
    }
}

const _: () = assert!(core::mem::size_of::<VlanHdr>() == VlanHdr::LEN);

/// A full Ethernet header carrying a single 802.1Q tag.
#[repr(C)]
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
    Unaligned,
)]
pub struct VlanEthHdr {
    /// Destination address.
    pub dst: Mac,
    /// Source address.
    pub src: Mac,
    /// Always one of the VLAN tag ethertypes.
    pub vlan_type: Be16,
    /// Tag control information; lowest 12 bits are the VLAN id.
    pub tci: Be16,
    /// Ethertype of the payload after the tag.
    pub next_type: Be16,
}

impl VlanEthHdr {
    /// Length of the header in bytes.
    pub const LEN: usize = 18;

    /// The tag control information as a typed value.
    #[must_use]
    pub fn tci(&self) -> Tci {
        Tci(self.tci.get())
    }
}

const _: () = assert!(core::mem::size_of::<VlanEthHdr>() == VlanEthHdr::LEN);
