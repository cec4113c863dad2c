// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! IGMP header records (v2 report/query and v3 report).

use crate::wire::{Be16, SplitBe32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Membership query (all versions).
pub const IGMP_HOST_MEMBERSHIP_QUERY: u8 = 0x11;
/// v1 membership report.
pub const IGMP_HOST_MEMBERSHIP_REPORT: u8 = 0x12;
/// v2 membership report.
pub const IGMPV2_HOST_MEMBERSHIP_REPORT: u8 = 0x16;
/// v2 leave-group message.
pub const IGMP_HOST_LEAVE_MESSAGE: u8 = 0x17;
/// v3 membership report.
pub const IGMPV3_HOST_MEMBERSHIP_REPORT: u8 = 0x22;

/// v3 record: current state is include.
pub const IGMPV3_MODE_IS_INCLUDE: u8 = 1;
/// v3 record: current state is exclude.
pub const IGMPV3_MODE_IS_EXCLUDE: u8 = 2;
/// v3 record: filter changed to include.
pub const IGMPV3_CHANGE_TO_INCLUDE_MODE: u8 = 3;
/// v3 record: filter changed to exclude.
pub const IGMPV3_CHANGE_TO_EXCLUDE_MODE: u8 = 4;
/// v3 record: sources added.
pub const IGMPV3_ALLOW_NEW_SOURCES: u8 = 5;
/// v3 record: sources removed.
pub const IGMPV3_BLOCK_OLD_SOURCES: u8 = 6;

/// An IGMP (v1/v2) header.
#[repr(C)]
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
    Unaligned,
)]
pub struct IgmpHdr {
    /// Message type.
    pub igmp_type: u8,
    /// Max response time (query) or reserved.
    pub code: u8,
    /// Checksum over the IGMP message.
    pub csum: Be16,
    /// Multicast group address.
    pub group: SplitBe32,
}

impl IgmpHdr {
    /// Length of the header in bytes.
    pub const LEN: usize = 8;
}

const _: () = assert!(core::mem::size_of::<IgmpHdr>() == IgmpHdr::LEN);

/// An IGMPv3 membership report header.
#[repr(C)]
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
    Unaligned,
)]
pub struct Igmpv3Hdr {
    /// Message type.
    pub igmp_type: u8,
    /// Reserved.
    pub rsvr1: u8,
    /// Checksum over the IGMP message.
    pub csum: Be16,
    /// Reserved.
    pub rsvr2: Be16,
    /// Number of group records that follow.
    pub ngrp: Be16,
}

impl Igmpv3Hdr {
    /// Length of the header in bytes.
    pub const LEN: usize = 8;
}

const _: () = assert!(core::mem::size_of::<Igmpv3Hdr>() == Igmpv3Hdr::LEN);

/// An IGMPv3 group record header (sources follow).
#[repr(C)]
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
    Unaligned,
)]
pub struct Igmpv3Record {
    /// Record type.
    pub record_type: u8,
    /// Length of auxiliary data, in 32-bit words.
    pub aux_len: u8,
    /// Number of source addresses that follow.
    pub nsrcs: Be16,
    /// Multicast group address.
    pub maddr: SplitBe32,
}

impl Igmpv3Record {
    /// Length of the record header in bytes.
    pub const LEN: usize = 8;
}

const _: () = assert!(core::mem::size_of::<Igmpv3Record>() == Igmpv3Record::LEN);
