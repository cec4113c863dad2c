// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! IPv6 header records, well-known addresses, and address manipulation.

use crate::wire::{Be16, SplitBe32, SplitIp6};
use std::fmt::Write as _;
use std::net::{Ipv4Addr, Ipv6Addr};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// The IPv6 flow label occupies the lower 20 bits of the first 32-bit
/// word of the header.
pub const LABEL_MASK: u32 = 0x000f_ffff;

/// The exact (all-ones) address, used as a wildcard mask.
pub const EXACT: Ipv6Addr = Ipv6Addr::new(
    0xffff, 0xffff, 0xffff, 0xffff, 0xffff, 0xffff, 0xffff, 0xffff,
);

/// The all-hosts link-local multicast group (`ff02::1`).
pub const ALL_HOSTS: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 1);

/// An IPv6 fixed header.
#[repr(C)]
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
    Unaligned,
)]
pub struct Ipv6Hdr {
    /// Version (4 bits), traffic class (8 bits), and flow label (20 bits).
    pub ver_tc_flow: SplitBe32,
    /// Length of the payload following this header.
    pub payload_len: Be16,
    /// Protocol of the next header.
    pub next_hdr: u8,
    /// Hop limit.
    pub hop_limit: u8,
    /// Source address.
    pub src: SplitIp6,
    /// Destination address.
    pub dst: SplitIp6,
}

impl Ipv6Hdr {
    /// Length of the fixed header in bytes.
    pub const LEN: usize = 40;

    /// The traffic class byte (DSCP + ECN).
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // 8-bit value after the shift
    pub fn traffic_class(&self) -> u8 {
        ((self.ver_tc_flow.get() >> 20) & 0xff) as u8
    }

    /// The flow label (low 20 bits of the first word).
    #[must_use]
    pub fn flow_label(&self) -> u32 {
        self.ver_tc_flow.get() & LABEL_MASK
    }

    /// Pack version 6, `tc`, and `flow_label` into the first word.
    pub fn set_ver_tc_flow(&mut self, tc: u8, flow_label: u32) {
        self.ver_tc_flow
            .set((6 << 28) | (u32::from(tc) << 20) | (flow_label & LABEL_MASK));
    }
}

const _: () = assert!(core::mem::size_of::<Ipv6Hdr>() == Ipv6Hdr::LEN);

/// An IPv6 fragment extension header.
#[repr(C)]
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
    Unaligned,
)]
pub struct Ipv6FragHdr {
    /// Protocol of the next header.
    pub next_hdr: u8,
    /// Reserved.
    pub reserved: u8,
    /// Fragment offset (upper 13 bits) and more-fragments flag (bit 0).
    pub frag_off: Be16,
    /// Identification of the fragmented datagram.
    pub ident: SplitBe32,
}

impl Ipv6FragHdr {
    /// Length of the extension header in bytes.
    pub const LEN: usize = 8;
}

const _: () = assert!(core::mem::size_of::<Ipv6FragHdr>() == Ipv6FragHdr::LEN);

/// True iff `addr` is anything other than the unspecified address.
#[must_use]
pub fn is_set(addr: Ipv6Addr) -> bool {
    addr != Ipv6Addr::UNSPECIFIED
}

/// True iff `addr` is multicast (first octet `0xff`).
#[must_use]
pub fn is_multicast(addr: Ipv6Addr) -> bool {
    addr.octets()[0] == 0xff
}

/// True iff `addr` is the all-hosts group.
#[must_use]
pub fn is_all_hosts(addr: Ipv6Addr) -> bool {
    addr == ALL_HOSTS
}

/// True iff `mask` wildcards everything.
#[must_use]
pub fn mask_is_any(mask: Ipv6Addr) -> bool {
    mask == Ipv6Addr::UNSPECIFIED
}

/// True iff `mask` matches exactly.
#[must_use]
pub fn mask_is_exact(mask: Ipv6Addr) -> bool {
    mask == EXACT
}

/// Embed an IPv4 address in the IPv4-mapped prefix (`::ffff:a.b.c.d`).
#[must_use]
pub fn map_ipv4(ip: Ipv4Addr) -> Ipv6Addr {
    ip.to_ipv6_mapped()
}

/// Extract the IPv4 address from an IPv4-mapped IPv6 address, if `addr`
/// carries the mapped prefix.
#[must_use]
pub fn mapped_ipv4(addr: Ipv6Addr) -> Option<Ipv4Addr> {
    addr.to_ipv4_mapped()
}

/// Bitwise-and of an address and a mask.
#[must_use]
pub fn bitand(addr: Ipv6Addr, mask: Ipv6Addr) -> Ipv6Addr {
    Ipv6Addr::from(u128::from(addr) & u128::from(mask))
}

/// The mask with `bits` high-order one bits.
#[must_use]
pub fn create_mask(bits: u8) -> Ipv6Addr {
    match bits {
        0 => Ipv6Addr::UNSPECIFIED,
        bits if bits >= 128 => EXACT,
        bits => Ipv6Addr::from(u128::MAX << (128 - u32::from(bits))),
    }
}

/// True iff `netmask` is a CIDR netmask: N high-order one bits followed
/// by 128−N zeros.
#[must_use]
pub fn is_cidr(netmask: Ipv6Addr) -> bool {
    let x = !u128::from(netmask);
    x & x.wrapping_add(1) == 0
}

/// The number of one bits in a CIDR `netmask`, or `None` if the mask is
/// not CIDR.
#[must_use]
#[allow(clippy::cast_possible_truncation)] // count_ones of a u128 fits in u8
pub fn cidr_bits(netmask: Ipv6Addr) -> Option<u8> {
    is_cidr(netmask).then(|| u128::from(netmask).count_ones() as u8)
}

/// Format `addr`, bracketed when requested (the form used when a port
/// number follows).
#[must_use]
pub fn format_bracketed(addr: Ipv6Addr, bracket: bool) -> String {
    if bracket {
        format!("[{addr}]")
    } else {
        format!("{addr}")
    }
}

/// Format `addr`, rendering IPv4-mapped addresses as the bare dotted
/// quad.
#[must_use]
pub fn format_mapped(addr: Ipv6Addr) -> String {
    match mapped_ipv4(addr) {
        Some(ip4) => format!("{ip4}"),
        None => format!("{addr}"),
    }
}

/// Format `addr` qualified by `mask`: bare when the mask is exact,
/// `addr/prefixlen` when the mask is CIDR, `addr/mask` otherwise.
#[must_use]
pub fn format_masked(addr: Ipv6Addr, mask: Ipv6Addr) -> String {
    let mut out = String::new();
    let _ = write!(out, "{addr}");
    if !mask_is_exact(mask) {
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

/// Errors which can occur while parsing a masked IPv6 address.
#[derive(Debug, thiserror::Error)]
pub enum Ipv6ParseError {
    /// The address portion did not parse.
    #[error("invalid IPv6 address in {0}")]
    Address(String),
    /// The mask portion did not parse as an address or prefix length.
    #[error("invalid IPv6 mask in {0}")]
    Mask(String),
    /// A prefix length was out of range.
    #[error("prefix length {0} is out of range (max 128)")]
    PrefixLength(u32),
}

/// Parse `addr`, `addr/len`, or `addr/mask` into an address and mask.
/// A bare address yields the exact mask.
///
/// # Errors
///
/// Returns an [`Ipv6ParseError`] describing the first offending portion.
pub fn parse_masked(s: &str) -> Result<(Ipv6Addr, Ipv6Addr), Ipv6ParseError> {
    let (addr_str, mask_str) = match s.split_once('/') {
        None => (s, None),
        Some((addr, mask)) => (addr, Some(mask)),
    };
    let addr: Ipv6Addr = addr_str
        .parse()
        .map_err(|_| Ipv6ParseError::Address(s.to_string()))?;
    let mask = match mask_str {
        None => EXACT,
        Some(mask_str) => {
            if mask_str.contains(':') {
                mask_str
                    .parse()
                    .map_err(|_| Ipv6ParseError::Mask(s.to_string()))?
            } else {
                let bits: u32 = mask_str
                    .parse()
                    .map_err(|_| Ipv6ParseError::Mask(s.to_string()))?;
                if bits > 128 {
                    return Err(Ipv6ParseError::PrefixLength(bits));
                }
                #[allow(clippy::cast_possible_truncation)] // bits <= 128
                create_mask(bits as u8)
            }
        }
    };
    Ok((addr, mask))
}

#[allow(clippy::unwrap_used, clippy::expect_used)] // valid in test code
#[cfg(test)]
mod test {
    use super::{
        bitand, cidr_bits, create_mask, format_bracketed, format_mapped, format_masked,
        is_all_hosts, is_cidr, is_multicast, is_set, map_ipv4, mapped_ipv4, mask_is_exact,
        parse_masked, ALL_HOSTS, EXACT,
    };
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn mapped_round_trip() {
        bolero::check!()
            .with_type()
            .cloned()
            .for_each(|octets: [u8; 4]| {
                let ip4 = Ipv4Addr::from(octets);
                let mapped = map_ipv4(ip4);
                assert_eq!(mapped_ipv4(mapped), Some(ip4));
                let segments = mapped.segments();
                assert_eq!(&segments[0..5], &[0, 0, 0, 0, 0]);
                assert_eq!(segments[5], 0xffff);
            });
    }

    #[test]
    fn unmapped_addresses_extract_nothing() {
        assert_eq!(mapped_ipv4(ALL_HOSTS), None);
        assert_eq!(mapped_ipv4(Ipv6Addr::LOCALHOST), None);
    }

    #[test]
    fn well_known_addresses() {
        assert!(is_all_hosts("ff02::1".parse().unwrap()));
        assert!(is_multicast(ALL_HOSTS));
        assert!(!is_multicast(Ipv6Addr::LOCALHOST));
        assert!(mask_is_exact(EXACT));
        assert!(!is_set(Ipv6Addr::UNSPECIFIED));
        assert!(is_set(Ipv6Addr::LOCALHOST));
    }

    #[test]
    fn cidr_masks() {
        assert!(is_cidr(create_mask(0)));
        assert!(is_cidr(create_mask(64)));
        assert!(is_cidr(create_mask(128)));
        assert_eq!(cidr_bits(create_mask(64)), Some(64));
        assert_eq!(create_mask(128), EXACT);
        let holey: Ipv6Addr = "ffff:0:ffff::".parse().unwrap();
        assert!(!is_cidr(holey));
        assert_eq!(cidr_bits(holey), None);
    }

    #[test]
    fn bitand_masks_out_host_bits() {
        let addr: Ipv6Addr = "2001:db8::dead:beef".parse().unwrap();
        assert_eq!(
            bitand(addr, create_mask(32)),
            "2001:db8::".parse::<Ipv6Addr>().unwrap()
        );
    }

    #[test]
    fn mapped_formatting() {
        assert_eq!(
            format_mapped(map_ipv4(Ipv4Addr::new(10, 0, 0, 1))),
            "10.0.0.1"
        );
        assert_eq!(format_mapped(Ipv6Addr::LOCALHOST), "::1");
    }

    #[test]
    fn masked_format_and_parse() {
        let addr: Ipv6Addr = "2001:db8::1".parse().unwrap();
        assert_eq!(format_bracketed(addr, true), "[2001:db8::1]");
        assert_eq!(format_bracketed(addr, false), "2001:db8::1");
        assert_eq!(format_masked(addr, EXACT), "2001:db8::1");
        assert_eq!(format_masked(addr, create_mask(48)), "2001:db8::1/48");

        let (parsed, mask) = parse_masked("2001:db8::1/48").unwrap();
        assert_eq!(parsed, addr);
        assert_eq!(mask, create_mask(48));

        let (_, mask) = parse_masked("2001:db8::1").unwrap();
        assert_eq!(mask, EXACT);

        let (_, mask) = parse_masked("2001:db8::1/ffff:0:ffff::").unwrap();
        assert_eq!(mask, "ffff:0:ffff::".parse::<Ipv6Addr>().unwrap());

        assert!(parse_masked("2001:db8::1/129").is_err());
        assert!(parse_masked("not-an-address/64").is_err());
    }
}
