// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! GRE base header record and flag constants.

use crate::wire::Be16;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Checksum-present flag.
pub const GRE_CSUM: u16 = 0x8000;
/// Routing-present flag (obsolete).
pub const GRE_ROUTING: u16 = 0x4000;
/// Key-present flag.
pub const GRE_KEY: u16 = 0x2000;
/// Sequence-number-present flag.
pub const GRE_SEQ: u16 = 0x1000;
/// Strict-source-route flag (obsolete).
pub const GRE_STRICT: u16 = 0x0800;
/// Recursion control (obsolete).
pub const GRE_REC: u16 = 0x0700;
/// Reserved flag bits.
pub const GRE_FLAGS: u16 = 0x00f8;
/// Version number mask.
pub const GRE_VERSION: u16 = 0x0007;

/// A GRE base header.
///
/// Optional fields (checksum, key, sequence number) follow when the
/// corresponding flags are set.
#[repr(C)]
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
    Unaligned,
)]
pub struct GreHdr {
    /// Flags and version.
    pub flags: Be16,
    /// Ethertype of the encapsulated payload.
    pub protocol: Be16,
}

impl GreHdr {
    /// Length of the base header in bytes.
    pub const LEN: usize = 4;
}

const _: () = assert!(core::mem::size_of::<GreHdr>() == GreHdr::LEN);
