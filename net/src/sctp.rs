// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! SCTP common header record.

use crate::wire::{Be16, SplitBe32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// An SCTP common header.
#[repr(C)]
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout,
    Unaligned,
)]
pub struct SctpHdr {
    /// Source port.
    pub src: Be16,
    /// Destination port.
    pub dst: Be16,
    /// Verification tag.
    pub vtag: SplitBe32,
    /// CRC32c checksum over the whole packet.
    pub csum: SplitBe32,
}

impl SctpHdr {
    /// Length of the common header in bytes.
    pub const LEN: usize = 12;
}

const _: () = assert!(core::mem::size_of::<SctpHdr>() == SctpHdr::LEN);
