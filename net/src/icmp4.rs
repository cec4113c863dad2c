// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! ICMPv4 header record.

use crate::wire::Be16;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// An ICMPv4 header.
///
/// The interpretation of the final four bytes depends on the message
/// type: echo id/sequence, path-MTU, or gateway address.  The accessors
/// below provide the views; the raw half-words are public for the rest.
#[repr(C)]
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
    Unaligned,
)]
pub struct IcmpHdr {
    /// Message type.
    pub icmp_type: u8,
    /// Message code.
    pub code: u8,
    /// Checksum over the ICMP message.
    pub csum: Be16,
    /// Type-dependent trailing words.
    pub rest: [Be16; 2],
}

impl IcmpHdr {
    /// Length of the header in bytes.
    pub const LEN: usize = 8;

    /// Echo request/reply: the identifier.
    #[must_use]
    pub fn echo_id(&self) -> u16 {
        self.rest[0].get()
    }

    /// Echo request/reply: the sequence number.
    #[must_use]
    pub fn echo_seq(&self) -> u16 {
        self.rest[1].get()
    }

    /// Destination-unreachable/fragmentation-needed: the next-hop MTU.
    #[must_use]
    pub fn frag_mtu(&self) -> u16 {
        self.rest[1].get()
    }

    /// Redirect: the gateway address, synthesized from the two
    /// half-words.
    #[must_use]
    pub fn gateway(&self) -> u32 {
        (u32::from(self.rest[0].get()) << 16) | u32::from(self.rest[1].get())
    }
}

const _: () = assert!(core::mem::size_of::<IcmpHdr>() == IcmpHdr::LEN);

#[cfg(test)]
mod test {
    use super::IcmpHdr;
    use crate::wire::Be16;

    #[test]
    fn views_share_the_trailing_words() {
        let hdr = IcmpHdr {
            icmp_type: 5,
            code: 1,
            csum: Be16::ZERO,
            rest: [Be16::new(0x0a00), Be16::new(0x0001)],
        };
        assert_eq!(hdr.echo_id(), 0x0a00);
        assert_eq!(hdr.echo_seq(), 0x0001);
        assert_eq!(hdr.frag_mtu(), 0x0001);
        assert_eq!(hdr.gateway(), 0x0a00_0001);
    }
}
