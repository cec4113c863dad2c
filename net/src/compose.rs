// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Frame composition and in-place rewrite helpers.
//!
//! Thin wrappers over a caller-owned [`PacketBufferMut`]: compose whole
//! frames (Ethernet, SNAP, ARP, RARP), push and pop VLAN tags and MPLS
//! label stack entries, and rewrite addressing fields while keeping the
//! affected L3 and L4 checksums valid.
//!
//! The helpers locate headers structurally (ethertype at the L2 type
//! offset, IHL, next-header) rather than through cached parse offsets, so
//! they apply to frames with at most one VLAN tag and no IPv6 extension
//! headers, which is what the datapath hands them.

use crate::arp::{ArpEthHdr, ARP_HRD_ETHERNET, ARP_OP_RARP, ARP_PRO_IP};
use crate::buffer::{Append, PacketBufferMut, Prepend, TrimFromStart};
use crate::checksum::{crc32c, update_u16, update_u32};
use crate::eth::ethtype::EthType;
use crate::eth::mac::Mac;
use crate::eth::{EthHdr, LlcSnapHdr, LLC_CNTL_SNAP, LLC_DSAP_SNAP, LLC_SSAP_SNAP};
use crate::icmp6::{NdMsg, NdOpt, ND_OPT_SOURCE_LINKADDR, ND_OPT_TARGET_LINKADDR};
use crate::ipv4::{Ipv4Hdr, PROTO_ICMPV6, PROTO_SCTP, PROTO_TCP, PROTO_UDP};
use crate::ipv6::Ipv6Hdr;
use crate::mpls::{MplsHdr, MplsLse};
use crate::vlan::{Tci, VlanEthHdr, VlanHdr};
use std::net::{Ipv4Addr, Ipv6Addr};
use tracing::trace;
use zerocopy::FromBytes;

/// Errors which may occur while composing or rewriting a frame.
#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    /// The buffer has no room for the bytes a helper must add.
    #[error("not enough room in packet buffer")]
    NoRoom,
    /// The frame ends before the header a helper must touch.
    #[error("frame too short for {0}")]
    Truncated(&'static str),
    /// The frame does not carry the header kind a helper expects.
    #[error("frame does not carry {0}")]
    UnexpectedHeader(&'static str),
    /// An options area failed to parse (e.g. a zero-length ND option).
    #[error("malformed {0} options")]
    BadOptions(&'static str),
}

/// The length of the L2 portion of `frame`: 18 bytes when a single
/// 802.1Q/802.1ad tag is present, 14 otherwise.
fn l2_len(frame: &[u8]) -> Result<usize, ComposeError> {
    if frame.len() < EthHdr::LEN {
        return Err(ComposeError::Truncated("ethernet header"));
    }
    let outer = EthType::new_from_be_bytes([frame[12], frame[13]]);
    if outer.is_vlan() {
        if frame.len() < VlanEthHdr::LEN {
            return Err(ComposeError::Truncated("vlan tag"));
        }
        Ok(VlanEthHdr::LEN)
    } else {
        Ok(EthHdr::LEN)
    }
}

/// The ethertype announcing the payload: the inner type field of the L2
/// header (past any VLAN tag).
fn payload_ethertype(frame: &[u8], l2: usize) -> EthType {
    EthType::new_from_be_bytes([frame[l2 - 2], frame[l2 - 1]])
}

fn set_payload_ethertype(frame: &mut [u8], l2: usize, ethertype: EthType) {
    frame[l2 - 2..l2].copy_from_slice(&ethertype.raw().to_be_bytes());
}

fn read_be16(frame: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([frame[offset], frame[offset + 1]])
}

fn write_be16(frame: &mut [u8], offset: usize, value: u16) {
    frame[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
}

fn read_be32(frame: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        frame[offset],
        frame[offset + 1],
        frame[offset + 2],
        frame[offset + 3],
    ])
}

fn write_be32(frame: &mut [u8], offset: usize, value: u32) {
    frame[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}

/// Apply an incremental update to the 16-bit checksum stored at
/// `csum_off` for a 32-bit field change.
fn update_csum32_at(frame: &mut [u8], csum_off: usize, old: u32, new: u32) {
    let updated = update_u32(read_be16(frame, csum_off), old, new);
    write_be16(frame, csum_off, updated);
}

fn update_csum16_at(frame: &mut [u8], csum_off: usize, old: u16, new: u16) {
    let updated = update_u16(read_be16(frame, csum_off), old, new);
    write_be16(frame, csum_off, updated);
}

/// Append an Ethernet II header plus `size` zeroed payload bytes to an
/// empty buffer.  Returns the offset at which the payload begins.
///
/// # Errors
///
/// Returns [`ComposeError::NoRoom`] if the buffer cannot hold the frame.
pub fn eth_compose<B: PacketBufferMut>(
    buf: &mut B,
    dst: Mac,
    src: Mac,
    ether_type: EthType,
    size: usize,
) -> Result<usize, ComposeError> {
    let total = EthHdr::LEN + size;
    let room = buf
        .append(u16::try_from(total).map_err(|_| ComposeError::NoRoom)?)
        .map_err(|_| ComposeError::NoRoom)?;
    let (eth, _) = EthHdr::mut_from_prefix(room).map_err(|_| ComposeError::NoRoom)?;
    *eth = EthHdr::new(dst, src, ether_type);
    Ok(EthHdr::LEN)
}

/// Append an 802.2 frame with an LLC+SNAP header to an empty buffer: the
/// Ethernet length field covers the LLC+SNAP header and `size` payload
/// bytes.  Returns the offset at which the payload begins.
///
/// # Errors
///
/// Returns [`ComposeError::NoRoom`] if the buffer cannot hold the frame.
pub fn snap_compose<B: PacketBufferMut>(
    buf: &mut B,
    dst: Mac,
    src: Mac,
    oui: [u8; 3],
    snap_type: u16,
    size: usize,
) -> Result<usize, ComposeError> {
    let payload_len = LlcSnapHdr::LEN + size;
    let ether_len = u16::try_from(payload_len).map_err(|_| ComposeError::NoRoom)?;
    let offset = eth_compose(buf, dst, src, EthType::new(ether_len), payload_len)?;
    let frame = buf.as_mut();
    let (llc_snap, _) =
        LlcSnapHdr::mut_from_prefix(&mut frame[offset..]).map_err(|_| ComposeError::NoRoom)?;
    llc_snap.llc.dsap = LLC_DSAP_SNAP;
    llc_snap.llc.ssap = LLC_SSAP_SNAP;
    llc_snap.llc.cntl = LLC_CNTL_SNAP;
    llc_snap.snap.org = oui;
    llc_snap.snap.snap_type.set(snap_type);
    Ok(offset + LlcSnapHdr::LEN)
}

/// Insert an 802.1Q tag with the given TPID and TCI after the source
/// address.
///
/// # Errors
///
/// Returns an error if the buffer has no headroom or no Ethernet header.
pub fn push_vlan<B: PacketBufferMut>(
    buf: &mut B,
    tpid: EthType,
    tci: Tci,
) -> Result<(), ComposeError> {
    if buf.as_ref().len() < EthHdr::LEN {
        return Err(ComposeError::Truncated("ethernet header"));
    }
    let frame = buf
        .prepend(u16::try_from(VlanHdr::LEN).map_err(|_| ComposeError::NoRoom)?)
        .map_err(|_| ComposeError::NoRoom)?;
    // The addresses stay in front; the tag lands between them and the
    // original ethertype.
    frame.copy_within(VlanHdr::LEN..VlanHdr::LEN + 12, 0);
    write_be16(frame, 12, tpid.raw());
    write_be16(frame, 14, tci.0);
    Ok(())
}

/// Remove the outermost 802.1Q tag, if one is present.  A frame without
/// a tag is left untouched.
///
/// # Errors
///
/// Returns an error only if the tagged frame is truncated.
pub fn pop_vlan<B: PacketBufferMut>(buf: &mut B) -> Result<(), ComposeError> {
    let frame = buf.as_mut();
    if frame.len() < EthHdr::LEN {
        return Ok(());
    }
    let outer = EthType::new_from_be_bytes([frame[12], frame[13]]);
    if !outer.is_vlan() {
        return Ok(());
    }
    if frame.len() < VlanEthHdr::LEN {
        return Err(ComposeError::Truncated("vlan tag"));
    }
    frame.copy_within(0..12, VlanHdr::LEN);
    buf.trim_from_start(u16::try_from(VlanHdr::LEN).map_err(|_| ComposeError::NoRoom)?)
        .map_err(|_| ComposeError::Truncated("vlan tag"))?;
    Ok(())
}

/// Push an MPLS label stack entry directly after the L2 header and set
/// the ethertype to `mpls_type` (one of the two MPLS ethertypes).
///
/// # Errors
///
/// Returns an error if `mpls_type` is not an MPLS ethertype or the
/// buffer has no headroom.
pub fn push_mpls<B: PacketBufferMut>(
    buf: &mut B,
    mpls_type: EthType,
    lse: MplsLse,
) -> Result<(), ComposeError> {
    if !mpls_type.is_mpls() {
        return Err(ComposeError::UnexpectedHeader("mpls ethertype"));
    }
    let l2 = l2_len(buf.as_ref())?;
    let frame = buf
        .prepend(u16::try_from(MplsHdr::LEN).map_err(|_| ComposeError::NoRoom)?)
        .map_err(|_| ComposeError::NoRoom)?;
    frame.copy_within(MplsHdr::LEN..MplsHdr::LEN + l2, 0);
    set_payload_ethertype(frame, l2, mpls_type);
    write_be32(frame, l2, lse.0);
    Ok(())
}

/// Pop the outermost MPLS label stack entry and restore `ether_type`.
/// A frame without an MPLS ethertype is left untouched.
///
/// # Errors
///
/// Returns an error if the MPLS frame is truncated.
pub fn pop_mpls<B: PacketBufferMut>(buf: &mut B, ether_type: EthType) -> Result<(), ComposeError> {
    let frame = buf.as_mut();
    let l2 = l2_len(frame)?;
    if !payload_ethertype(frame, l2).is_mpls() {
        trace!("pop_mpls on a frame without a label stack");
        return Ok(());
    }
    if frame.len() < l2 + MplsHdr::LEN {
        return Err(ComposeError::Truncated("mpls label stack"));
    }
    frame.copy_within(0..l2, MplsHdr::LEN);
    let frame = buf
        .trim_from_start(u16::try_from(MplsHdr::LEN).map_err(|_| ComposeError::NoRoom)?)
        .map_err(|_| ComposeError::Truncated("mpls label stack"))?;
    set_payload_ethertype(frame, l2, ether_type);
    Ok(())
}

/// The offset of the L4 checksum affected by an IPv4 pseudo-header
/// change, or `None` when no L4 checksum needs maintenance.
fn ipv4_l4_csum_offset(frame: &[u8], l2: usize, ip: &Ipv4Hdr) -> Option<usize> {
    if ip.is_fragment() {
        return None;
    }
    let l4 = l2 + usize::from(ip.ihl()) * 4;
    let csum_off = match ip.proto {
        PROTO_TCP => l4 + 16,
        // A zero UDP checksum means "not computed" over IPv4.
        PROTO_UDP => {
            let off = l4 + 6;
            if frame.len() < off + 2 || read_be16(frame, off) == 0 {
                return None;
            }
            off
        }
        _ => return None,
    };
    (frame.len() >= csum_off + 2).then_some(csum_off)
}

/// Rewrite an IPv4 address field, maintaining the IP header checksum and
/// any affected L4 checksum.
fn set_ipv4_addr_field(
    frame: &mut [u8],
    l2: usize,
    field_off: usize,
    new: u32,
    l4_csum_off: Option<usize>,
) {
    let old = read_be32(frame, field_off);
    if old == new {
        return;
    }
    if let Some(off) = l4_csum_off {
        let proto = frame[l2 + 9];
        update_csum32_at(frame, off, old, new);
        // A UDP checksum that updates to zero must be stored as all-ones;
        // zero means "no checksum".
        if proto == PROTO_UDP && read_be16(frame, off) == 0 {
            write_be16(frame, off, 0xffff);
        }
    }
    update_csum32_at(frame, l2 + 10, old, new);
    write_be32(frame, field_off, new);
}

/// Rewrite the IPv4 source, destination, TOS, and TTL of the frame,
/// keeping the IP header checksum and the TCP/UDP checksum valid.
///
/// # Errors
///
/// Returns an error if the frame does not carry IPv4 or is truncated.
pub fn set_ipv4<B: PacketBufferMut>(
    buf: &mut B,
    src: Ipv4Addr,
    dst: Ipv4Addr,
    tos: u8,
    ttl: u8,
) -> Result<(), ComposeError> {
    let frame = buf.as_mut();
    let l2 = l2_len(frame)?;
    if payload_ethertype(frame, l2) != EthType::IPV4 {
        return Err(ComposeError::UnexpectedHeader("ipv4"));
    }
    if frame.len() < l2 + Ipv4Hdr::LEN {
        return Err(ComposeError::Truncated("ipv4 header"));
    }
    let (ip, _) =
        Ipv4Hdr::read_from_prefix(&frame[l2..]).map_err(|_| ComposeError::Truncated("ipv4"))?;
    let l4_csum_off = ipv4_l4_csum_offset(frame, l2, &ip);

    set_ipv4_addr_field(frame, l2, l2 + 12, u32::from(src), l4_csum_off);
    set_ipv4_addr_field(frame, l2, l2 + 16, u32::from(dst), l4_csum_off);

    if ip.tos != tos {
        let old_word = u16::from_be_bytes([ip.ihl_ver, ip.tos]);
        let new_word = u16::from_be_bytes([ip.ihl_ver, tos]);
        update_csum16_at(frame, l2 + 10, old_word, new_word);
        frame[l2 + 1] = tos;
    }
    if ip.ttl != ttl {
        let old_word = u16::from_be_bytes([ip.ttl, ip.proto]);
        let new_word = u16::from_be_bytes([ttl, ip.proto]);
        update_csum16_at(frame, l2 + 10, old_word, new_word);
        frame[l2 + 8] = ttl;
    }
    Ok(())
}

/// The offset of the L4 checksum affected by an IPv6 pseudo-header
/// change, or `None` when no L4 checksum needs maintenance.
fn ipv6_l4_csum_offset(frame: &[u8], l4: usize, next_hdr: u8) -> Option<usize> {
    let csum_off = match next_hdr {
        PROTO_TCP => l4 + 16,
        PROTO_UDP => l4 + 6,
        PROTO_ICMPV6 => l4 + 2,
        _ => return None,
    };
    (frame.len() >= csum_off + 2).then_some(csum_off)
}

/// Rewrite a 16-byte address, maintaining the L4 checksum across the
/// change, one 32-bit chunk at a time.
fn set_ipv6_addr_field(frame: &mut [u8], field_off: usize, new: &[u8; 16], l4_csum_off: Option<usize>) {
    if let Some(off) = l4_csum_off {
        for chunk in 0..4 {
            let old_word = read_be32(frame, field_off + chunk * 4);
            let new_word = u32::from_be_bytes([
                new[chunk * 4],
                new[chunk * 4 + 1],
                new[chunk * 4 + 2],
                new[chunk * 4 + 3],
            ]);
            update_csum32_at(frame, off, old_word, new_word);
        }
    }
    frame[field_off..field_off + 16].copy_from_slice(new);
}

/// Rewrite the IPv6 source, destination, traffic class, flow label, and
/// hop limit, keeping the TCP/UDP/ICMPv6 checksum valid across the
/// address change.
///
/// # Errors
///
/// Returns an error if the frame does not carry IPv6 or is truncated.
pub fn set_ipv6<B: PacketBufferMut>(
    buf: &mut B,
    src: Ipv6Addr,
    dst: Ipv6Addr,
    tc: u8,
    flow_label: u32,
    hop_limit: u8,
) -> Result<(), ComposeError> {
    let frame = buf.as_mut();
    let l2 = l2_len(frame)?;
    if payload_ethertype(frame, l2) != EthType::IPV6 {
        return Err(ComposeError::UnexpectedHeader("ipv6"));
    }
    if frame.len() < l2 + Ipv6Hdr::LEN {
        return Err(ComposeError::Truncated("ipv6 header"));
    }
    let next_hdr = frame[l2 + 6];
    let l4 = l2 + Ipv6Hdr::LEN;
    let l4_csum_off = ipv6_l4_csum_offset(frame, l4, next_hdr);

    set_ipv6_addr_field(frame, l2 + 8, &src.octets(), l4_csum_off);
    set_ipv6_addr_field(frame, l2 + 24, &dst.octets(), l4_csum_off);

    // Traffic class and flow label live outside the pseudo-header; no
    // checksum maintenance.
    let old_word = read_be32(frame, l2);
    let new_word =
        (6 << 28) | (u32::from(tc) << 20) | (flow_label & crate::ipv6::LABEL_MASK);
    if old_word != new_word {
        write_be32(frame, l2, new_word);
    }
    frame[l2 + 7] = hop_limit;
    Ok(())
}

/// Locate the L4 header of the frame: its offset and the IP protocol
/// that announced it.
fn l4_region(frame: &[u8]) -> Result<(usize, u8), ComposeError> {
    let l2 = l2_len(frame)?;
    let ether_type = payload_ethertype(frame, l2);
    if ether_type == EthType::IPV4 {
        if frame.len() < l2 + Ipv4Hdr::LEN {
            return Err(ComposeError::Truncated("ipv4 header"));
        }
        let ihl = usize::from(frame[l2] & 0x0f) * 4;
        Ok((l2 + ihl, frame[l2 + 9]))
    } else if ether_type == EthType::IPV6 {
        if frame.len() < l2 + Ipv6Hdr::LEN {
            return Err(ComposeError::Truncated("ipv6 header"));
        }
        Ok((l2 + Ipv6Hdr::LEN, frame[l2 + 6]))
    } else {
        Err(ComposeError::UnexpectedHeader("ip"))
    }
}

/// Rewrite the TCP source and destination ports, maintaining the TCP
/// checksum.
///
/// # Errors
///
/// Returns an error if the frame does not carry TCP over IP.
pub fn set_tcp_port<B: PacketBufferMut>(
    buf: &mut B,
    src: u16,
    dst: u16,
) -> Result<(), ComposeError> {
    let frame = buf.as_mut();
    let (l4, proto) = l4_region(frame)?;
    if proto != PROTO_TCP {
        return Err(ComposeError::UnexpectedHeader("tcp"));
    }
    if frame.len() < l4 + 20 {
        return Err(ComposeError::Truncated("tcp header"));
    }
    for (off, new) in [(l4, src), (l4 + 2, dst)] {
        let old = read_be16(frame, off);
        update_csum16_at(frame, l4 + 16, old, new);
        write_be16(frame, off, new);
    }
    Ok(())
}

/// Rewrite the UDP source and destination ports, maintaining the UDP
/// checksum when one is present.
///
/// # Errors
///
/// Returns an error if the frame does not carry UDP over IP.
pub fn set_udp_port<B: PacketBufferMut>(
    buf: &mut B,
    src: u16,
    dst: u16,
) -> Result<(), ComposeError> {
    let frame = buf.as_mut();
    let (l4, proto) = l4_region(frame)?;
    if proto != PROTO_UDP {
        return Err(ComposeError::UnexpectedHeader("udp"));
    }
    if frame.len() < l4 + 8 {
        return Err(ComposeError::Truncated("udp header"));
    }
    let has_csum = read_be16(frame, l4 + 6) != 0;
    for (off, new) in [(l4, src), (l4 + 2, dst)] {
        let old = read_be16(frame, off);
        if has_csum {
            update_csum16_at(frame, l4 + 6, old, new);
            if read_be16(frame, l4 + 6) == 0 {
                write_be16(frame, l4 + 6, 0xffff);
            }
        }
        write_be16(frame, off, new);
    }
    Ok(())
}

/// Rewrite the SCTP source and destination ports, recomputing the CRC32c
/// over the SCTP packet.
///
/// # Errors
///
/// Returns an error if the frame does not carry SCTP over IP.
pub fn set_sctp_port<B: PacketBufferMut>(
    buf: &mut B,
    src: u16,
    dst: u16,
) -> Result<(), ComposeError> {
    let frame = buf.as_mut();
    let (l4, proto) = l4_region(frame)?;
    if proto != PROTO_SCTP {
        return Err(ComposeError::UnexpectedHeader("sctp"));
    }
    if frame.len() < l4 + 12 {
        return Err(ComposeError::Truncated("sctp header"));
    }
    write_be16(frame, l4, src);
    write_be16(frame, l4 + 2, dst);
    write_be32(frame, l4 + 8, 0);
    let crc = crc32c(&frame[l4..]);
    write_be32(frame, l4 + 8, crc);
    Ok(())
}

/// Rewrite the ICMPv4 type and code, maintaining the ICMP checksum.
///
/// # Errors
///
/// Returns an error if the frame does not carry ICMP over IPv4.
pub fn set_icmp<B: PacketBufferMut>(
    buf: &mut B,
    icmp_type: u8,
    code: u8,
) -> Result<(), ComposeError> {
    let frame = buf.as_mut();
    let (l4, proto) = l4_region(frame)?;
    if proto != crate::ipv4::PROTO_ICMP {
        return Err(ComposeError::UnexpectedHeader("icmp"));
    }
    if frame.len() < l4 + 8 {
        return Err(ComposeError::Truncated("icmp header"));
    }
    let old_word = read_be16(frame, l4);
    let new_word = u16::from_be_bytes([icmp_type, code]);
    update_csum16_at(frame, l4 + 2, old_word, new_word);
    write_be16(frame, l4, new_word);
    Ok(())
}

/// Rewrite the target address and the link-layer-address options of a
/// Neighbor Discovery message, maintaining the ICMPv6 checksum.
///
/// # Errors
///
/// Returns an error if the frame does not carry ICMPv6 over IPv6, or if
/// the ND options area is malformed.
pub fn set_nd<B: PacketBufferMut>(
    buf: &mut B,
    target: Ipv6Addr,
    sll: Option<Mac>,
    tll: Option<Mac>,
) -> Result<(), ComposeError> {
    let frame = buf.as_mut();
    let (l4, proto) = l4_region(frame)?;
    if proto != PROTO_ICMPV6 {
        return Err(ComposeError::UnexpectedHeader("icmpv6"));
    }
    if frame.len() < l4 + NdMsg::LEN {
        return Err(ComposeError::Truncated("neighbor discovery message"));
    }
    let csum_off = l4 + 2;
    set_ipv6_addr_field(frame, l4 + 8, &target.octets(), Some(csum_off));

    let mut opt = l4 + NdMsg::LEN;
    while frame.len() >= opt + NdOpt::LEN {
        let opt_type = frame[opt];
        let opt_len = usize::from(frame[opt + 1]) * 8;
        if opt_len == 0 || frame.len() < opt + opt_len {
            return Err(ComposeError::BadOptions("neighbor discovery"));
        }
        let replacement = match opt_type {
            ND_OPT_SOURCE_LINKADDR => sll,
            ND_OPT_TARGET_LINKADDR => tll,
            _ => None,
        };
        if let Some(mac) = replacement {
            if opt_len == NdOpt::LEN {
                for (i, pair) in mac.0.chunks_exact(2).enumerate() {
                    let off = opt + 2 + i * 2;
                    let old = read_be16(frame, off);
                    let new = u16::from_be_bytes([pair[0], pair[1]]);
                    update_csum16_at(frame, csum_off, old, new);
                    write_be16(frame, off, new);
                }
            }
        }
        opt += opt_len;
    }
    Ok(())
}

/// Compose a complete Ethernet/IPv4 ARP frame into an empty buffer.
/// When `broadcast` is set the Ethernet destination is the broadcast
/// address; the ARP target hardware address is written either way.
///
/// # Errors
///
/// Returns [`ComposeError::NoRoom`] if the buffer cannot hold the frame.
pub fn compose_arp<B: PacketBufferMut>(
    buf: &mut B,
    op: u16,
    sha: Mac,
    tha: Mac,
    broadcast: bool,
    spa: Ipv4Addr,
    tpa: Ipv4Addr,
) -> Result<(), ComposeError> {
    let eth_dst = if broadcast { Mac::BROADCAST } else { tha };
    let offset = eth_compose(buf, eth_dst, sha, EthType::ARP, ArpEthHdr::LEN)?;
    let frame = buf.as_mut();
    let (arp, _) =
        ArpEthHdr::mut_from_prefix(&mut frame[offset..]).map_err(|_| ComposeError::NoRoom)?;
    arp.hrd.set(ARP_HRD_ETHERNET);
    arp.pro.set(ARP_PRO_IP);
    arp.hln = 6;
    arp.pln = 4;
    arp.op.set(op);
    arp.sha = sha;
    arp.spa.set(u32::from(spa));
    arp.tha = tha;
    arp.tpa.set(u32::from(tpa));
    Ok(())
}

/// Compose a RARP announcement for `mac` into an empty buffer.
///
/// # Errors
///
/// Returns [`ComposeError::NoRoom`] if the buffer cannot hold the frame.
pub fn compose_rarp<B: PacketBufferMut>(buf: &mut B, mac: Mac) -> Result<(), ComposeError> {
    let offset = eth_compose(buf, Mac::BROADCAST, mac, EthType::RARP, ArpEthHdr::LEN)?;
    let frame = buf.as_mut();
    let (arp, _) =
        ArpEthHdr::mut_from_prefix(&mut frame[offset..]).map_err(|_| ComposeError::NoRoom)?;
    arp.hrd.set(ARP_HRD_ETHERNET);
    arp.pro.set(ARP_PRO_IP);
    arp.hln = 6;
    arp.pln = 4;
    arp.op.set(ARP_OP_RARP);
    arp.sha = mac;
    arp.spa.set(0);
    arp.tha = mac;
    arp.tpa.set(0);
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used, clippy::field_reassign_with_default)] // valid in test code
#[cfg(test)]
mod test {
    use super::{
        compose_arp, compose_rarp, eth_compose, pop_mpls, pop_vlan, push_mpls, push_vlan,
        set_icmp, set_ipv4, set_ipv6, set_nd, set_tcp_port, set_udp_port, snap_compose,
    };
    use crate::arp::{ArpEthHdr, ARP_OP_REQUEST, ARP_OP_RARP};
    use crate::buffer::TestBuffer;
    use crate::checksum::{checksum, pseudoheader_partial, Checksum};
    use crate::eth::ethtype::EthType;
    use crate::eth::mac::Mac;
    use crate::eth::EthHdr;
    use crate::icmp6::{NdMsg, NdOpt, ND_OPT_SOURCE_LINKADDR};
    use crate::ipv4::{Ipv4Hdr, PROTO_ICMPV6};
    use crate::ipv6::Ipv6Hdr;
    use crate::mpls::MplsLse;
    use crate::vlan::Tci;
    use etherparse::PacketBuilder;
    use std::net::{Ipv4Addr, Ipv6Addr};
    use zerocopy::{FromBytes, IntoBytes};

    fn udp_frame() -> TestBuffer {
        let builder = PacketBuilder::ethernet2([2, 0, 0, 0, 0, 1], [2, 0, 0, 0, 0, 2])
            .ipv4([10, 0, 0, 1], [10, 0, 0, 2], 64)
            .udp(1234, 4789);
        let payload = [0xabu8; 32];
        let mut frame = Vec::with_capacity(builder.size(payload.len()));
        builder.write(&mut frame, &payload).unwrap();
        TestBuffer::from_slice(&frame)
    }

    fn tcp_frame() -> TestBuffer {
        let builder = PacketBuilder::ethernet2([2, 0, 0, 0, 0, 1], [2, 0, 0, 0, 0, 2])
            .ipv4([10, 0, 0, 1], [10, 0, 0, 2], 64)
            .tcp(1234, 80, 1000, 512);
        let payload = [0x55u8; 16];
        let mut frame = Vec::with_capacity(builder.size(payload.len()));
        builder.write(&mut frame, &payload).unwrap();
        TestBuffer::from_slice(&frame)
    }

    /// One's-complement verification: a valid IPv4 header sums to zero,
    /// and a valid L4 checksum sums to zero over the pseudo-header and
    /// segment.
    fn assert_checksums_valid(frame: &[u8]) {
        let (ip, _) = Ipv4Hdr::read_from_prefix(&frame[14..]).unwrap();
        assert_eq!(checksum(&frame[14..14 + Ipv4Hdr::LEN]), 0);
        let l4 = 14 + usize::from(ip.ihl()) * 4;
        let mut csum = Checksum::with_partial(pseudoheader_partial(&ip));
        csum.add_bytes(&frame[l4..]);
        assert_eq!(csum.finish(), 0);
    }

    #[test]
    fn set_ipv4_maintains_checksums() {
        for mut buf in [udp_frame(), tcp_frame()] {
            set_ipv4(
                &mut buf,
                Ipv4Addr::new(192, 168, 7, 7),
                Ipv4Addr::new(172, 16, 0, 9),
                0x12,
                13,
            )
            .unwrap();
            let frame = buf.as_ref();
            let (ip, _) = Ipv4Hdr::read_from_prefix(&frame[14..]).unwrap();
            assert_eq!(ip.source(), Ipv4Addr::new(192, 168, 7, 7));
            assert_eq!(ip.destination(), Ipv4Addr::new(172, 16, 0, 9));
            assert_eq!(ip.tos, 0x12);
            assert_eq!(ip.ttl, 13);
            assert_checksums_valid(frame);
        }
    }

    #[test]
    fn set_ports_maintain_checksums() {
        let mut buf = udp_frame();
        set_udp_port(&mut buf, 111, 222).unwrap();
        assert_checksums_valid(buf.as_ref());

        let mut buf = tcp_frame();
        set_tcp_port(&mut buf, 443, 8443).unwrap();
        let frame = buf.as_ref();
        assert_eq!(&frame[34..36], &443u16.to_be_bytes());
        assert_eq!(&frame[36..38], &8443u16.to_be_bytes());
        assert_checksums_valid(frame);
    }

    #[test]
    fn vlan_push_pop_round_trip() {
        let mut buf = udp_frame();
        let original: Vec<u8> = buf.as_ref().to_vec();
        push_vlan(&mut buf, EthType::VLAN, Tci(0x2123)).unwrap();
        {
            let frame = buf.as_ref();
            assert_eq!(frame.len(), original.len() + 4);
            assert_eq!(&frame[0..12], &original[0..12]);
            assert_eq!(&frame[12..14], &[0x81, 0x00]);
            assert_eq!(&frame[14..16], &[0x21, 0x23]);
            assert_eq!(&frame[16..], &original[12..]);
        }
        pop_vlan(&mut buf).unwrap();
        assert_eq!(buf.as_ref(), &original[..]);
    }

    #[test]
    fn pop_vlan_leaves_untagged_frames_alone() {
        let mut buf = udp_frame();
        let original: Vec<u8> = buf.as_ref().to_vec();
        pop_vlan(&mut buf).unwrap();
        assert_eq!(buf.as_ref(), &original[..]);
    }

    #[test]
    fn mpls_push_pop_round_trip() {
        let mut buf = udp_frame();
        let original: Vec<u8> = buf.as_ref().to_vec();
        let lse = MplsLse::new(1000, 2, true, 63);
        push_mpls(&mut buf, EthType::MPLS, lse).unwrap();
        {
            let frame = buf.as_ref();
            assert_eq!(frame.len(), original.len() + 4);
            assert_eq!(&frame[12..14], &[0x88, 0x47]);
            assert_eq!(&frame[14..18], &lse.0.to_be_bytes());
            assert_eq!(&frame[18..], &original[14..]);
        }
        pop_mpls(&mut buf, EthType::IPV4).unwrap();
        assert_eq!(buf.as_ref(), &original[..]);
    }

    #[test]
    fn push_mpls_rejects_non_mpls_ethertype() {
        let mut buf = udp_frame();
        assert!(push_mpls(&mut buf, EthType::IPV4, MplsLse(0)).is_err());
    }

    #[test]
    fn eth_compose_lays_out_header_and_payload() {
        let mut buf = TestBuffer::new();
        let offset = eth_compose(
            &mut buf,
            Mac::BROADCAST,
            Mac([2, 0, 0, 0, 0, 1]),
            EthType::IPV4,
            6,
        )
        .unwrap();
        assert_eq!(offset, EthHdr::LEN);
        assert_eq!(buf.as_ref().len(), EthHdr::LEN + 6);
        assert_eq!(&buf.as_ref()[12..14], &[0x08, 0x00]);
        assert_eq!(&buf.as_ref()[14..], &[0; 6]);
    }

    #[test]
    fn snap_compose_lays_out_llc_and_length() {
        let mut buf = TestBuffer::new();
        let offset = snap_compose(
            &mut buf,
            Mac::STP,
            Mac([2, 0, 0, 0, 0, 1]),
            [0, 0, 0],
            0x010b,
            4,
        )
        .unwrap();
        assert_eq!(offset, EthHdr::LEN + 8);
        let frame = buf.as_ref();
        // The Ethernet type field carries the 802.2 length.
        assert_eq!(&frame[12..14], &12u16.to_be_bytes());
        assert_eq!(&frame[14..17], &[0xaa, 0xaa, 0x03]);
        assert_eq!(&frame[17..20], &[0, 0, 0]);
        assert_eq!(&frame[20..22], &[0x01, 0x0b]);
    }

    #[test]
    fn arp_compose() {
        let sha = Mac([2, 0, 0, 0, 0, 1]);
        let tha = Mac([2, 0, 0, 0, 0, 2]);
        let mut buf = TestBuffer::new();
        compose_arp(
            &mut buf,
            ARP_OP_REQUEST,
            sha,
            tha,
            true,
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(10, 0, 0, 2),
        )
        .unwrap();
        let frame = buf.as_ref();
        assert_eq!(frame.len(), EthHdr::LEN + ArpEthHdr::LEN);
        let (eth, rest) = EthHdr::read_from_prefix(frame).unwrap();
        assert_eq!(eth.dst, Mac::BROADCAST);
        assert_eq!(eth.src, sha);
        assert_eq!(eth.ether_type(), EthType::ARP);
        let (arp, _) = ArpEthHdr::read_from_prefix(rest).unwrap();
        assert_eq!(arp.op.get(), ARP_OP_REQUEST);
        assert_eq!(arp.sha, sha);
        assert_eq!(arp.tha, tha);
        assert_eq!(arp.spa.get(), u32::from(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(arp.tpa.get(), u32::from(Ipv4Addr::new(10, 0, 0, 2)));
    }

    #[test]
    fn rarp_compose() {
        let mac = Mac([2, 0, 0, 0, 0, 7]);
        let mut buf = TestBuffer::new();
        compose_rarp(&mut buf, mac).unwrap();
        let frame = buf.as_ref();
        let (eth, rest) = EthHdr::read_from_prefix(frame).unwrap();
        assert_eq!(eth.dst, Mac::BROADCAST);
        assert_eq!(eth.ether_type(), EthType::RARP);
        let (arp, _) = ArpEthHdr::read_from_prefix(rest).unwrap();
        assert_eq!(arp.op.get(), ARP_OP_RARP);
        assert_eq!(arp.sha, mac);
        assert_eq!(arp.tha, mac);
        assert_eq!(arp.spa.get(), 0);
        assert_eq!(arp.tpa.get(), 0);
    }

    #[test]
    fn set_icmp_updates_checksum() {
        let builder = PacketBuilder::ethernet2([2, 0, 0, 0, 0, 1], [2, 0, 0, 0, 0, 2])
            .ipv4([10, 0, 0, 1], [10, 0, 0, 2], 64)
            .icmpv4_echo_request(7, 9);
        let mut frame = Vec::with_capacity(builder.size(0));
        builder.write(&mut frame, &[]).unwrap();
        let mut buf = TestBuffer::from_slice(&frame);
        set_icmp(&mut buf, 0, 0).unwrap();
        let frame = buf.as_ref();
        assert_eq!(frame[34], 0);
        assert_eq!(frame[35], 0);
        // ICMPv4 checksums cover only the message, no pseudo-header.
        assert_eq!(checksum(&frame[34..]), 0);
    }

    fn ipv6_tcp_frame() -> TestBuffer {
        let builder = PacketBuilder::ethernet2([2, 0, 0, 0, 0, 1], [2, 0, 0, 0, 0, 2])
            .ipv6(
                Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1).octets(),
                Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 2).octets(),
                64,
            )
            .tcp(1234, 80, 1000, 512);
        let payload = [0x5au8; 8];
        let mut frame = Vec::with_capacity(builder.size(payload.len()));
        builder.write(&mut frame, &payload).unwrap();
        TestBuffer::from_slice(&frame)
    }

    fn assert_ipv6_l4_checksum_valid(frame: &[u8]) {
        let (ip, _) = Ipv6Hdr::read_from_prefix(&frame[14..]).unwrap();
        let l4 = 14 + Ipv6Hdr::LEN;
        let mut csum = Checksum::new();
        csum.add_bytes(ip.src.as_bytes());
        csum.add_bytes(ip.dst.as_bytes());
        csum.add_u16(ip.payload_len.get());
        csum.add_u16(u16::from(ip.next_hdr));
        csum.add_bytes(&frame[l4..]);
        assert_eq!(csum.finish(), 0);
    }

    #[test]
    fn set_ipv6_maintains_l4_checksum() {
        let mut buf = ipv6_tcp_frame();
        set_ipv6(
            &mut buf,
            "fd00::a".parse().unwrap(),
            "fd00::b".parse().unwrap(),
            0x12,
            0xbeef,
            13,
        )
        .unwrap();
        let frame = buf.as_ref();
        let (ip, _) = Ipv6Hdr::read_from_prefix(&frame[14..]).unwrap();
        assert_eq!(ip.src.get(), "fd00::a".parse::<Ipv6Addr>().unwrap());
        assert_eq!(ip.dst.get(), "fd00::b".parse::<Ipv6Addr>().unwrap());
        assert_eq!(ip.traffic_class(), 0x12);
        assert_eq!(ip.flow_label(), 0xbeef);
        assert_eq!(ip.hop_limit, 13);
        assert_ipv6_l4_checksum_valid(frame);
    }

    #[test]
    fn set_nd_rewrites_target_and_options() {
        // Hand-build a neighbor solicitation with an SLL option.
        let src = Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1);
        let dst = Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 2);
        let nd_len = NdMsg::LEN + NdOpt::LEN;
        let mut l4 = vec![0u8; nd_len];
        l4[0] = 135; // neighbor solicitation
        l4[24] = ND_OPT_SOURCE_LINKADDR;
        l4[25] = 1;
        l4[26..32].copy_from_slice(&[2, 0, 0, 0, 0, 9]);

        let mut frame = Vec::new();
        frame.extend_from_slice(&[2, 0, 0, 0, 0, 2]);
        frame.extend_from_slice(&[2, 0, 0, 0, 0, 1]);
        frame.extend_from_slice(&[0x86, 0xdd]);
        let mut ip = Ipv6Hdr::default();
        ip.set_ver_tc_flow(0, 0);
        ip.payload_len.set(u16::try_from(nd_len).unwrap());
        ip.next_hdr = PROTO_ICMPV6;
        ip.hop_limit = 255;
        ip.src.set(src);
        ip.dst.set(dst);
        frame.extend_from_slice(ip.as_bytes());
        // Seed a valid checksum before the rewrite.
        let mut seed = Checksum::new();
        seed.add_bytes(&src.octets());
        seed.add_bytes(&dst.octets());
        seed.add_u16(u16::try_from(nd_len).unwrap());
        seed.add_u16(u16::from(PROTO_ICMPV6));
        seed.add_bytes(&l4);
        let csum = seed.finish();
        l4[2..4].copy_from_slice(&csum.to_be_bytes());
        frame.extend_from_slice(&l4);

        let mut buf = TestBuffer::from_slice(&frame);
        let new_target: Ipv6Addr = "fe80::42".parse().unwrap();
        let new_mac = Mac([2, 0, 0, 0, 0, 0x42]);
        set_nd(&mut buf, new_target, Some(new_mac), None).unwrap();

        let frame = buf.as_ref();
        let l4_off = 14 + Ipv6Hdr::LEN;
        assert_eq!(&frame[l4_off + 8..l4_off + 24], &new_target.octets());
        assert_eq!(&frame[l4_off + 26..l4_off + 32], &new_mac.0);
        assert_ipv6_l4_checksum_valid(frame);
    }

    #[test]
    fn frames_without_ip_are_rejected_for_rewrites() {
        let mut buf = TestBuffer::new();
        compose_rarp(&mut buf, Mac([2, 0, 0, 0, 0, 1])).unwrap();
        assert!(set_ipv4(
            &mut buf,
            Ipv4Addr::LOCALHOST,
            Ipv4Addr::LOCALHOST,
            0,
            64
        )
        .is_err());
        assert!(set_tcp_port(&mut buf, 1, 2).is_err());
    }
}
