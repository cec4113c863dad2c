// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! IPv4 header record, TOS sub-fields, and address predicates.

use crate::wire::{Be16, SplitBe32};
use std::fmt::Write as _;
use std::net::Ipv4Addr;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// IP protocol number for ICMP.
pub const PROTO_ICMP: u8 = 1;
/// IP protocol number for TCP.
pub const PROTO_TCP: u8 = 6;
/// IP protocol number for UDP.
pub const PROTO_UDP: u8 = 17;
/// IP protocol number for the IPv6 fragment extension header.
pub const PROTO_FRAGMENT: u8 = 44;
/// IP protocol number for ICMPv6.
pub const PROTO_ICMPV6: u8 = 58;
/// IP protocol number for SCTP.
pub const PROTO_SCTP: u8 = 132;

/// ECN codepoint: not ECN-capable transport.
pub const ECN_NOT_ECT: u8 = 0x0;
/// ECN codepoint: ECN-capable transport (1).
pub const ECN_ECT_1: u8 = 0x01;
/// ECN codepoint: ECN-capable transport (0).
pub const ECN_ECT_0: u8 = 0x02;
/// ECN codepoint: congestion experienced.
pub const ECN_CE: u8 = 0x03;
/// Mask selecting the ECN bits of the TOS byte.
pub const ECN_MASK: u8 = 0x03;
/// Mask selecting the DSCP bits of the TOS byte.
pub const DSCP_MASK: u8 = 0xfc;

/// The IP version number carried by every IPv4 header.
pub const IP_VERSION: u8 = 4;

/// Don't-fragment bit of the fragment-offset word.
pub const IP_DF: u16 = 0x4000;
/// More-fragments bit of the fragment-offset word.
pub const IP_MF: u16 = 0x2000;
/// Mask selecting the fragment offset itself.
pub const IP_FRAG_OFF_MASK: u16 = 0x1fff;

/// True iff the fragment-offset word (host byte order) marks the packet
/// as a fragment: either more fragments follow or the offset is nonzero.
#[must_use]
pub const fn is_fragment(frag_off: u16) -> bool {
    frag_off & (IP_MF | IP_FRAG_OFF_MASK) != 0
}

/// An IPv4 header without options.
#[repr(C)]
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
    Unaligned,
)]
pub struct Ipv4Hdr {
    /// Version in the high nibble, header length (in 32-bit words) in the
    /// low nibble.
    pub ihl_ver: u8,
    /// Type of service: DSCP in the top six bits, ECN in the low two.
    pub tos: u8,
    /// Total length of the datagram.
    pub total_len: Be16,
    /// Identification.
    pub id: Be16,
    /// Flags and fragment offset.
    pub frag_off: Be16,
    /// Time to live.
    pub ttl: u8,
    /// Payload protocol.
    pub proto: u8,
    /// Header checksum.
    pub csum: Be16,
    /// Source address.
    pub src: SplitBe32,
    /// Destination address.
    pub dst: SplitBe32,
}

impl Ipv4Hdr {
    /// Length of the header (without options) in bytes.
    pub const LEN: usize = 20;

    /// Pack a version/IHL byte.
    #[must_use]
    pub const fn ihl_ver(ihl: u8, ver: u8) -> u8 {
        (ver << 4) | ihl
    }

    /// The IP version (high nibble).
    #[must_use]
    pub const fn ver(&self) -> u8 {
        self.ihl_ver >> 4
    }

    /// The header length in 32-bit words (low nibble).
    #[must_use]
    pub const fn ihl(&self) -> u8 {
        self.ihl_ver & 0x0f
    }

    /// The source address as a typed value.
    #[must_use]
    pub fn source(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.src.get())
    }

    /// The destination address as a typed value.
    #[must_use]
    pub fn destination(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.dst.get())
    }

    /// True iff this header describes a fragment.
    #[must_use]
    pub fn is_fragment(&self) -> bool {
        is_fragment(self.frag_off.get())
    }
}

const _: () = assert!(core::mem::size_of::<Ipv4Hdr>() == Ipv4Hdr::LEN);

/// True iff `netmask` is a CIDR netmask: N high-order one bits followed
/// by 32−N zeros.
#[must_use]
pub fn is_cidr(netmask: Ipv4Addr) -> bool {
    let x = !u32::from(netmask);
    x & x.wrapping_add(1) == 0
}

/// True iff `ip` is a multicast address (`224.0.0.0/4`).
#[must_use]
pub fn is_multicast(ip: Ipv4Addr) -> bool {
    u32::from(ip) & 0xf000_0000 == 0xe000_0000
}

/// True iff `ip` is a link-local multicast address (`224.0.0.0/24`).
#[must_use]
pub fn is_local_multicast(ip: Ipv4Addr) -> bool {
    u32::from(ip) & 0xffff_ff00 == 0xe000_0000
}

/// The number of one bits in a CIDR `netmask`, or `None` if the mask is
/// not CIDR.
#[must_use]
#[allow(clippy::cast_possible_truncation)] // count_ones of a u32 fits in u8
pub fn cidr_bits(netmask: Ipv4Addr) -> Option<u8> {
    is_cidr(netmask).then(|| u32::from(netmask).count_ones() as u8)
}

/// Format `ip` qualified by `mask`: bare when the mask is exact,
/// `ip/prefixlen` when the mask is CIDR, `ip/mask` otherwise.
#[must_use]
pub fn format_masked(ip: Ipv4Addr, mask: Ipv4Addr) -> String {
    let mut out = String::new();
    let _ = write!(out, "{ip}");
    if mask != Ipv4Addr::BROADCAST {
        match cidr_bits(mask) {
            Some(bits) => {
                let _ = write!(out, "/{bits}");
            }
            None => {
                let _ = write!(out, "/{mask}");
            }
        }
    }
    out
}

/// Errors which can occur while parsing a masked IPv4 address.
#[derive(Debug, thiserror::Error)]
pub enum Ipv4ParseError {
    /// The address portion did not parse.
    #[error("invalid IPv4 address in {0}")]
    Address(String),
    /// The mask portion did not parse as a dotted quad or prefix length.
    #[error("invalid IPv4 mask in {0}")]
    Mask(String),
    /// A prefix length was out of range.
    #[error("prefix length {0} is out of range (max 32)")]
    PrefixLength(u32),
}

/// Parse `a.b.c.d`, `a.b.c.d/len`, or `a.b.c.d/m.m.m.m` into an address
/// and mask.  A bare address yields the exact mask.
///
/// # Errors
///
/// Returns an [`Ipv4ParseError`] describing the first offending portion.
pub fn parse_masked(s: &str) -> Result<(Ipv4Addr, Ipv4Addr), Ipv4ParseError> {
    let (addr_str, mask_str) = match s.split_once('/') {
        None => (s, None),
        Some((addr, mask)) => (addr, Some(mask)),
    };
    let addr: Ipv4Addr = addr_str
        .parse()
        .map_err(|_| Ipv4ParseError::Address(s.to_string()))?;
    let mask = match mask_str {
        None => Ipv4Addr::BROADCAST,
        Some(mask_str) => {
            if mask_str.contains('.') {
                mask_str
                    .parse()
                    .map_err(|_| Ipv4ParseError::Mask(s.to_string()))?
            } else {
                let bits: u32 = mask_str
                    .parse()
                    .map_err(|_| Ipv4ParseError::Mask(s.to_string()))?;
                if bits > 32 {
                    return Err(Ipv4ParseError::PrefixLength(bits));
                }
                mask_from_prefix(bits)
            }
        }
    };
    Ok((addr, mask))
}

fn mask_from_prefix(bits: u32) -> Ipv4Addr {
    if bits == 0 {
        Ipv4Addr::UNSPECIFIED
    } else {
        Ipv4Addr::from(u32::MAX << (32 - bits))
    }
}
