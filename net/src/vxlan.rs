// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! [VXLAN][RFC7348] header record.
//!
//! [RFC7348]: https://datatracker.ietf.org/doc/html/rfc7348#section-5

use crate::wire::SplitBe32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// A VXLAN header.
#[repr(C)]
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
    Unaligned,
)]
pub struct VxlanHdr {
    /// Flag word; always reads [`VxlanHdr::FLAGS`] when written by this
    /// system.
    pub vx_flags: SplitBe32,
    /// The VNI in the upper 24 bits; low byte reserved.
    pub vx_vni: SplitBe32,
}

impl VxlanHdr {
    /// Length of the header in bytes.
    pub const LEN: usize = 8;

    /// The required value of the flag word: the I bit set, every other
    /// bit reserved as zero.
    pub const FLAGS: u32 = 0x0800_0000;

    /// UDP port on which VXLAN frames are expected.  The standard
    /// requires 4789.
    pub const UDP_PORT: u16 = 4789;

    /// Build a header carrying `vni` (the low 24 bits are used).
    #[must_use]
    pub fn new(vni: u32) -> VxlanHdr {
        VxlanHdr {
            vx_flags: SplitBe32::new(VxlanHdr::FLAGS),
            vx_vni: SplitBe32::new(vni << 8),
        }
    }

    /// The VNI carried by the header.
    #[must_use]
    pub fn vni(&self) -> u32 {
        self.vx_vni.get() >> 8
    }
}

const _: () = assert!(core::mem::size_of::<VxlanHdr>() == VxlanHdr::LEN);

#[cfg(test)]
mod test {
    use super::VxlanHdr;
    use zerocopy::IntoBytes;

    #[test]
    fn flags_word_reads_back_required_value() {
        bolero::check!().with_type().cloned().for_each(|raw: u32| {
            let vni = raw & 0x00ff_ffff;
            let hdr = VxlanHdr::new(vni);
            assert_eq!(hdr.vx_flags.get(), VxlanHdr::FLAGS);
            assert_eq!(hdr.vni(), vni);
            assert_eq!(hdr.as_bytes()[0], 0x08);
            assert_eq!(&hdr.as_bytes()[1..4], &[0, 0, 0]);
        });
    }
}
