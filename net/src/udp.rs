// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! UDP header record.

use crate::wire::Be16;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// A UDP header.
#[repr(C)]
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
    Unaligned,
)]
pub struct UdpHdr {
    /// Source port.
    pub src: Be16,
    /// Destination port.
    pub dst: Be16,
    /// Length of the header plus payload.
    pub len: Be16,
    /// Checksum over the datagram and pseudo-header; zero when unused
    /// (IPv4 only).
    pub csum: Be16,
}

impl UdpHdr {
    /// Length of the header in bytes.
    pub const LEN: usize = 8;
}

const _: () = assert!(core::mem::size_of::<UdpHdr>() == UdpHdr::LEN);
