// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Per-packet tunnel state and the slice of the classifier's flow this
//! core reads and writes.
//!
//! [`FlowTnl`] is compared, copied, and hashed by *effective size*: the
//! smallest prefix of the record covering its meaningful fields.  A
//! record with no destination set carries no meaning past the
//! destination slots, and the option area only counts when options are
//! actually present.  The effective-size function is the sole source of
//! truth; the record is always created zeroed so the tail never holds
//! garbage.

use core::fmt;
use core::hash::{Hash, Hasher};
use core::mem::{offset_of, size_of};
use net::eth::ethtype::EthType;
use net::ipv6;
use net::wire::{Be16, Be64, SplitBe32};
use std::net::{Ipv4Addr, Ipv6Addr};
use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout};

/// A datapath port number.
#[repr(transparent)]
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    serde::Serialize,
    serde::Deserialize,
    FromBytes,
    IntoBytes,
    Immutable,
    KnownLayout,
)]
pub struct OdpPort(pub u32);

impl fmt::Display for OdpPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for OdpPort {
    fn from(value: u32) -> OdpPort {
        OdpPort(value)
    }
}

/// Out-of-band tunnel TLV metadata (Geneve-style options).
///
/// `present` does double duty, exactly as wide as the larger use: it is
/// the bitmap of decoded TLVs, or the raw option length in bytes when
/// the enclosing record carries [`FlowTnl::F_UDPIF`] (options still in
/// datapath format).
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct TunMetadata {
    present: u64,
    opts: [u8; TunMetadata::OPTS_LEN],
}

impl TunMetadata {
    /// Size of the option area in bytes.
    pub const OPTS_LEN: usize = 256;

    pub(crate) const OPTS_OFFSET: usize = offset_of!(TunMetadata, opts);

    /// The bitmap of decoded TLV options.
    #[must_use]
    pub fn present_map(&self) -> u64 {
        self.present
    }

    /// The raw option length, for metadata still in datapath format.
    /// Never exceeds the option area.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // bounded by OPTS_LEN
    pub fn present_len(&self) -> usize {
        (self.present as usize).min(TunMetadata::OPTS_LEN)
    }

    /// Record the bitmap of decoded TLV options.
    pub fn set_present_map(&mut self, map: u64) {
        self.present = map;
    }

    /// Record the raw option length (datapath format).
    pub fn set_present_len(&mut self, len: usize) {
        self.present = len.min(TunMetadata::OPTS_LEN) as u64;
    }

    /// The option area.
    #[must_use]
    pub fn opts(&self) -> &[u8; TunMetadata::OPTS_LEN] {
        &self.opts
    }

    /// The option area, mutably.
    pub fn opts_mut(&mut self) -> &mut [u8; TunMetadata::OPTS_LEN] {
        &mut self.opts
    }
}

/// Tunnel information used in flow key and metadata.
///
/// The destination slots come first: a record whose destination is not
/// set (neither the IPv4 slot nor the IPv6 slot) promises nothing about
/// any later field.  A set IPv4 slot marks an IPv4 tunnel; the endpoint
/// accessors return the IPv4-mapped form in that case.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct FlowTnl {
    /// Outer IPv4 destination; zero unless this is an IPv4 tunnel.
    pub ip_dst: SplitBe32,
    /// Outer IPv6 destination.
    pub ipv6_dst: [u8; 16],
    /// Outer IPv4 source; zero unless this is an IPv4 tunnel.
    pub ip_src: SplitBe32,
    /// Outer IPv6 source.
    pub ipv6_src: [u8; 16],
    /// The 64-bit tunnel key (VNI, GRE key, ...), network order.
    pub tun_id: Be64,
    /// Flag bits; see the `F_*` constants.
    pub flags: u16,
    /// Outer DSCP/ECN byte.
    pub ip_tos: u8,
    /// Outer TTL.
    pub ip_ttl: u8,
    /// Outer transport source port.
    pub tp_src: Be16,
    /// Outer transport destination port.
    pub tp_dst: Be16,
    /// Group-based policy id.
    pub gbp_id: Be16,
    /// Group-based policy flags.
    pub gbp_flags: u8,
    pad1: [u8; 5],
    /// TLV option metadata.
    pub metadata: TunMetadata,
}

const _: () = assert!(size_of::<FlowTnl>() == 328);
const _: () = assert!(offset_of!(FlowTnl, ip_src) == 20);

impl FlowTnl {
    /// OAM frame; the only flag exposed through OpenFlow.
    pub const F_OAM: u16 = 1 << 0;
    /// Mask of the public flags.
    pub const PUB_F_MASK: u16 = (1 << 1) - 1;
    /// Set the don't-fragment bit on the outer header.
    pub const F_DONT_FRAGMENT: u16 = 1 << 1;
    /// Checksum the outer transport header.
    pub const F_CSUM: u16 = 1 << 2;
    /// A tunnel key is present.
    pub const F_KEY: u16 = 1 << 3;
    /// Mask of all externally meaningful flags.
    pub const F_MASK: u16 = (1 << 4) - 1;
    /// Purely internal: tunnel metadata is still in raw datapath format.
    /// Never exposed outside the process, hence outside `F_MASK`.
    pub const F_UDPIF: u16 = 1 << 4;

    const OPTS_OFFSET: usize = offset_of!(FlowTnl, metadata) + TunMetadata::OPTS_OFFSET;

    /// True iff either destination slot is set, i.e. the record
    /// describes a tunnel at all.
    #[must_use]
    pub fn dst_is_set(&self) -> bool {
        !self.ip_dst.is_zero() || self.ipv6_dst != [0; 16]
    }

    /// The outer destination, in IPv4-mapped form for IPv4 tunnels.
    #[must_use]
    pub fn dst(&self) -> Ipv6Addr {
        if self.ip_dst.is_zero() {
            Ipv6Addr::from(self.ipv6_dst)
        } else {
            ipv6::map_ipv4(Ipv4Addr::from(self.ip_dst.get()))
        }
    }

    /// The outer source, in IPv4-mapped form for IPv4 tunnels.
    #[must_use]
    pub fn src(&self) -> Ipv6Addr {
        if self.ip_src.is_zero() {
            Ipv6Addr::from(self.ipv6_src)
        } else {
            ipv6::map_ipv4(Ipv4Addr::from(self.ip_src.get()))
        }
    }

    /// An offset into the record covering all its meaningful fields.
    #[must_use]
    pub fn effective_len(&self) -> usize {
        if !self.dst_is_set() {
            // Covers the destination slots only.
            return offset_of!(FlowTnl, ip_src);
        }
        if self.flags & FlowTnl::F_UDPIF != 0 {
            // Datapath format: cover the raw options we have.
            return FlowTnl::OPTS_OFFSET + self.metadata.present_len();
        }
        if self.metadata.present_map() == 0 {
            // No decoded TLVs; the option area is irrelevant.
            return FlowTnl::OPTS_OFFSET;
        }
        size_of::<FlowTnl>()
    }

    /// Copy `src` into `self`, touching only the meaningful prefix of
    /// `src`.  Bytes past that prefix in `self` are NOT cleared, so this
    /// must not be used where the uninitialized portion may be hashed
    /// over.
    pub fn copy_from(&mut self, src: &FlowTnl) {
        let len = src.effective_len();
        self.as_mut_bytes()[..len].copy_from_slice(&src.as_bytes()[..len]);
    }
}

impl Default for FlowTnl {
    fn default() -> FlowTnl {
        FlowTnl::new_zeroed()
    }
}

impl PartialEq for FlowTnl {
    fn eq(&self, other: &FlowTnl) -> bool {
        let len = self.effective_len();
        len == other.effective_len() && self.as_bytes()[..len] == other.as_bytes()[..len]
    }
}

impl Eq for FlowTnl {}

impl Hash for FlowTnl {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write(&self.as_bytes()[..self.effective_len()]);
    }
}

impl fmt::Display for FlowTnl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tun_id={:#x},src={},dst={},tos={:#x},ttl={},flags={:#x}",
            self.tun_id.get(),
            ipv6::format_mapped(self.src()),
            ipv6::format_mapped(self.dst()),
            self.ip_tos,
            self.ip_ttl,
            self.flags
        )
    }
}

/// The slice of the classifier's flow that the tunnel core reads and
/// writes: the outer tunnel state plus the inner L3 fields that feed
/// TTL/TOS/ECN inheritance.
#[derive(Debug, Clone)]
pub struct Flow {
    /// Outer tunnel state.
    pub tunnel: FlowTnl,
    /// Ingress datapath port.
    pub in_port: OdpPort,
    /// Packet mark (skb mark).
    pub pkt_mark: u32,
    /// Inner ethertype.
    pub dl_type: EthType,
    /// Inner TOS byte (DSCP + ECN).
    pub nw_tos: u8,
    /// Inner TTL.
    pub nw_ttl: u8,
}

impl Flow {
    /// True iff the inner packet is IP of either family.
    #[must_use]
    pub fn is_ip_any(&self) -> bool {
        self.dl_type.is_ip_any()
    }
}

impl Default for Flow {
    fn default() -> Flow {
        Flow {
            tunnel: FlowTnl::default(),
            in_port: OdpPort(0),
            pkt_mark: 0,
            dl_type: EthType::new(0),
            nw_tos: 0,
            nw_ttl: 0,
        }
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tunnel({}),in_port({}),pkt_mark({:#x}),dl_type({:#06x}),nw_tos={:#x},nw_ttl={}",
            self.tunnel,
            self.in_port,
            self.pkt_mark,
            self.dl_type.raw(),
            self.nw_tos,
            self.nw_ttl
        )
    }
}

/// The wildcard masks the classifier feeds back into flow caching: a
/// mask-shaped [`Flow`] where all-ones means "this field mattered".
#[derive(Debug, Clone, Default)]
pub struct FlowWildcards {
    /// The masks, field for field.
    pub masks: Flow,
}

/// Datapath packet metadata, initialized per packet.
#[derive(Debug, Clone)]
pub struct PacketMetadata {
    /// Recirculation id; 0 for packets fresh off the wire.
    pub recirc_id: u32,
    /// Hash computed by the recirculation action.
    pub dp_hash: u32,
    /// QoS priority.
    pub skb_priority: u32,
    /// Packet mark.
    pub pkt_mark: u32,
    /// Connection-tracking state.
    pub ct_state: u16,
    /// Connection-tracking zone.
    pub ct_zone: u16,
    /// Connection-tracking mark.
    pub ct_mark: u32,
    /// Connection-tracking label.
    pub ct_label: u128,
    /// Input port.
    pub in_port: OdpPort,
    /// Encapsulating tunnel parameters.  Until a tunnel claims the
    /// packet, only the cleared destination slots are meaningful; they
    /// mark the rest of the record as not worth reading.
    pub tunnel: FlowTnl,
}

impl PacketMetadata {
    /// Fresh metadata for a packet received on `port`.
    #[must_use]
    pub fn new(port: OdpPort) -> PacketMetadata {
        PacketMetadata {
            recirc_id: 0,
            dp_hash: 0,
            skb_priority: 0,
            pkt_mark: 0,
            ct_state: 0,
            ct_zone: 0,
            ct_mark: 0,
            ct_label: 0,
            in_port: port,
            tunnel: FlowTnl::default(),
        }
    }
}

#[cfg(any(test, feature = "arbitrary"))]
mod contract {
    use super::{FlowTnl, TunMetadata};
    use bolero::{Driver, TypeGenerator};
    use zerocopy::FromZeros;

    impl TypeGenerator for FlowTnl {
        fn generate<D: Driver>(u: &mut D) -> Option<Self> {
            let mut tnl = FlowTnl::new_zeroed();
            tnl.ip_dst.set(u.produce()?);
            tnl.ipv6_dst = u.produce()?;
            if !tnl.dst_is_set() {
                // No destination: every later field stays meaningless,
                // and in a legal record meaningless means zeroed.
                return Some(tnl);
            }
            tnl.ip_src.set(u.produce()?);
            tnl.ipv6_src = u.produce()?;
            tnl.tun_id.set(u.produce()?);
            tnl.flags = u.produce::<u16>()? & (FlowTnl::F_MASK | FlowTnl::F_UDPIF);
            tnl.ip_tos = u.produce()?;
            tnl.ip_ttl = u.produce()?;
            tnl.tp_src.set(u.produce()?);
            tnl.tp_dst.set(u.produce()?);
            if u.produce::<bool>()? {
                tnl.metadata.set_present_map(u.produce()?);
            }
            if tnl.flags & FlowTnl::F_UDPIF != 0 {
                tnl.metadata
                    .set_present_len(usize::from(u.produce::<u8>()?));
            }
            Some(tnl)
        }
    }

    impl TypeGenerator for TunMetadata {
        fn generate<D: Driver>(u: &mut D) -> Option<Self> {
            let mut metadata = TunMetadata::new_zeroed();
            metadata.set_present_map(u.produce()?);
            Some(metadata)
        }
    }
}
