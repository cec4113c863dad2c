// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! ARP header record for Ethernet/IPv4.

use crate::eth::mac::Mac;
use crate::wire::{Be16, SplitBe32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Hardware type for Ethernet.
pub const ARP_HRD_ETHERNET: u16 = 1;
/// Protocol type for IPv4 (the IPv4 ethertype).
pub const ARP_PRO_IP: u16 = 0x0800;
/// Opcode: request.
pub const ARP_OP_REQUEST: u16 = 1;
/// Opcode: reply.
pub const ARP_OP_REPLY: u16 = 2;
/// Opcode: reverse request (RARP).
pub const ARP_OP_RARP: u16 = 3;

/// An ARP header specialized for Ethernet hardware and IPv4 protocol
/// addresses.
#[repr(C)]
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
    Unaligned,
)]
pub struct ArpEthHdr {
    /// Hardware type; always [`ARP_HRD_ETHERNET`].
    pub hrd: Be16,
    /// Protocol type; always [`ARP_PRO_IP`].
    pub pro: Be16,
    /// Hardware address length; always 6.
    pub hln: u8,
    /// Protocol address length; always 4.
    pub pln: u8,
    /// Opcode.
    pub op: Be16,
    /// Sender hardware address.
    pub sha: Mac,
    /// Sender protocol address.
    pub spa: SplitBe32,
    /// Target hardware address.
    pub tha: Mac,
    /// Target protocol address.
    pub tpa: SplitBe32,
}

impl ArpEthHdr {
    /// Length of the header in bytes.
    pub const LEN: usize = 28;
}

const _: () = assert!(core::mem::size_of::<ArpEthHdr>() == ArpEthHdr::LEN);
