// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! ICMPv6, Neighbor Discovery, and MLD header records.

use crate::eth::mac::Mac;
use crate::wire::{Be16, SplitBe32, SplitIp6};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Neighbor solicitation message type.
pub const ND_NEIGHBOR_SOLICIT: u8 = 135;
/// Neighbor advertisement message type.
pub const ND_NEIGHBOR_ADVERT: u8 = 136;
/// ND option: source link-layer address.
pub const ND_OPT_SOURCE_LINKADDR: u8 = 1;
/// ND option: target link-layer address.
pub const ND_OPT_TARGET_LINKADDR: u8 = 2;

/// MLD listener query message type.
pub const MLD_QUERY: u8 = 130;
/// MLDv1 listener report message type.
pub const MLD_REPORT: u8 = 131;
/// MLDv1 listener done message type.
pub const MLD_DONE: u8 = 132;
/// MLDv2 listener report message type.
pub const MLD2_REPORT: u8 = 143;

/// An ICMPv6 header (the common four bytes).
#[repr(C)]
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
    Unaligned,
)]
pub struct Icmp6Hdr {
    /// Message type.
    pub icmp6_type: u8,
    /// Message code.
    pub code: u8,
    /// Checksum over the message and pseudo-header.
    pub csum: Be16,
}

impl Icmp6Hdr {
    /// Length of the common header in bytes.
    pub const LEN: usize = 4;
}

const _: () = assert!(core::mem::size_of::<Icmp6Hdr>() == Icmp6Hdr::LEN);

/// A Neighbor Discovery option.
///
/// ND options are always a multiple of 8 bytes; this record covers the
/// link-layer-address options, whose payload is a MAC.
#[repr(C)]
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
    Unaligned,
)]
pub struct NdOpt {
    /// Option type.
    pub opt_type: u8,
    /// Option length in units of 8 octets (the size of this record).
    pub opt_len: u8,
    /// Link-layer address, for the SLL and TLL options.
    pub opt_mac: Mac,
}

impl NdOpt {
    /// Length of the option in bytes.
    pub const LEN: usize = 8;
}

const _: () = assert!(core::mem::size_of::<NdOpt>() == NdOpt::LEN);

/// A Neighbor Discovery (solicitation or advertisement) message.
///
/// Options follow the fixed part; see [`NdOpt`].
#[repr(C)]
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
    Unaligned,
)]
pub struct NdMsg {
    /// The ICMPv6 header.
    pub icmph: Icmp6Hdr,
    /// Router/solicited/override flags (advertisement) or reserved.
    pub rco_flags: SplitBe32,
    /// The target address.
    pub target: SplitIp6,
}

impl NdMsg {
    /// Length of the fixed message in bytes.
    pub const LEN: usize = 24;
}

const _: () = assert!(core::mem::size_of::<NdMsg>() == NdMsg::LEN);

/// An MLD header.
///
/// MLDv1 and MLDv2 share this shape; fields reserved in one version are
/// meaningful in the other.
#[repr(C)]
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
    Unaligned,
)]
pub struct MldHdr {
    /// Message type.
    pub mld_type: u8,
    /// Code; reserved in queries and reports.
    pub code: u8,
    /// Checksum over the message and pseudo-header.
    pub csum: Be16,
    /// Maximum response delay (queries).
    pub mrd: Be16,
    /// Number of group records (MLDv2 reports).
    pub ngrp: Be16,
}

impl MldHdr {
    /// Length of the header in bytes.
    pub const LEN: usize = 8;
}

const _: () = assert!(core::mem::size_of::<MldHdr>() == MldHdr::LEN);

/// An MLDv2 group record header (sources follow).
#[repr(C)]
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
    Unaligned,
)]
pub struct Mld2Record {
    /// Record type.
    pub record_type: u8,
    /// Length of auxiliary data, in 32-bit words.
    pub aux_len: u8,
    /// Number of source addresses that follow.
    pub nsrcs: Be16,
    /// Multicast group address.
    pub maddr: SplitIp6,
}

impl Mld2Record {
    /// Length of the record header in bytes.
    pub const LEN: usize = 20;
}

const _: () = assert!(core::mem::size_of::<Mld2Record>() == Mld2Record::LEN);
