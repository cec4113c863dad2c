// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The registry key of a tunnel port and the port record itself.
//!
//! Which fields a tunnel port matches against a received packet depends
//! on the port itself (the parenthesized names refer to
//! [`TunnelMatch`] fields):
//!
//! - `in_key`: a port may match a specific tunnel id
//!   (`in_key_flow == false`) or arrange for the id to be matched as
//!   `tunnel.tun_id` in the flow table (`in_key_flow == true`).
//!
//! - `ip_dst`: a port may match a specific destination address
//!   (`ip_dst_flow == false`) or defer the destination to the flow
//!   table (`ip_dst_flow == true`).
//!
//! - `ip_src`: a port may match a specific source address
//!   (`ip_src_flow == false`, `ipv6_src` set), wildcard all sources
//!   (`ip_src_flow == false`, `ipv6_src` zero), or defer the source to
//!   the flow table (`ip_src_flow == true`).
//!
//! That makes 2 × 2 × 3 = 12 ways a port can match a tunnel packet.
//! The possibilities for each field are numbered in increasing order as
//! listed above, and the twelve combinations are ordered
//! lexicographically considering `in_key` first, then `ip_dst`, then
//! `ip_src`.  The resulting index is both the registry partition and
//! the priority order of the resolver.

use crate::config::{TunnelConfig, TunnelNetdev};
use crate::flow::OdpPort;
use core::fmt;
use core::mem::size_of;
use net::ipv6;
use net::wire::Be64;
use std::net::Ipv6Addr;
use std::sync::Arc;
use zerocopy::{Immutable, IntoBytes, KnownLayout};

/// The skb mark stamped on IPsec tunnel packets.
pub const IPSEC_MARK: u32 = 1;

/// The number of distinct wildcarding patterns (and match-map buckets).
pub const N_MATCH_TYPES: usize = 2 * 2 * 3;

/// The three possibilities for a port's `ip_src` match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IpSrcKind {
    /// `ip_src` must equal the configured address.
    Cfg = 0,
    /// Any `ip_src` is acceptable.
    Any = 1,
    /// `ip_src` is handled in the flow table.
    Flow = 2,
}

/// The match tuple of a tunnel port: the registry key.
///
/// The record is contiguous with no padding holes (the trailing pad
/// byte is explicit and always zero), so zero-initialization followed by
/// field population yields a canonical form and the derived equality
/// and hash see every byte that matters.
#[repr(C)]
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, IntoBytes, Immutable, KnownLayout,
)]
pub struct TunnelMatch {
    /// Tunnel id to match, network order; zero when `in_key_flow`.
    pub in_key: Be64,
    /// Source endpoint (mapped form for IPv4); zero to accept any, and
    /// zero when `ip_src_flow`.
    pub ipv6_src: [u8; 16],
    /// Destination endpoint (mapped form for IPv4); zero when
    /// `ip_dst_flow`.
    pub ipv6_dst: [u8; 16],
    /// Datapath port of the underlay.
    pub odp_port: OdpPort,
    /// skb mark; [`IPSEC_MARK`] for IPsec-protected tunnels, else 0.
    pub pkt_mark: u32,
    /// Defer the tunnel id to the flow table.
    pub in_key_flow: bool,
    /// Defer the source address to the flow table.
    pub ip_src_flow: bool,
    /// Defer the destination address to the flow table.
    pub ip_dst_flow: bool,
    pad: u8,
}

const _: () = assert!(size_of::<TunnelMatch>() == 52);
const _: () = assert!(size_of::<TunnelMatch>() % size_of::<u32>() == 0);

impl TunnelMatch {
    /// Build the match tuple a netdev's configuration asks for.
    ///
    /// A field whose companion `*_flow` flag defers it to the flow table
    /// is zeroed here regardless of what the configuration carries, so
    /// the invariant "flow-deferred fields are zero" holds for any
    /// input.
    #[must_use]
    pub fn from_config(cfg: &TunnelConfig, odp_port: OdpPort) -> TunnelMatch {
        TunnelMatch {
            in_key: if cfg.in_key_flow {
                Be64::ZERO
            } else {
                Be64::new(cfg.in_key)
            },
            ipv6_src: if cfg.ip_src_flow {
                [0; 16]
            } else {
                cfg.ipv6_src.octets()
            },
            ipv6_dst: cfg.ipv6_dst.octets(),
            odp_port,
            pkt_mark: if cfg.ipsec { IPSEC_MARK } else { 0 },
            in_key_flow: cfg.in_key_flow,
            ip_src_flow: cfg.ip_src_flow,
            ip_dst_flow: cfg.ip_dst_flow,
            pad: 0,
        }
    }

    /// How this tuple treats the source address.
    #[must_use]
    pub fn ip_src_kind(&self) -> IpSrcKind {
        if self.ip_src_flow {
            IpSrcKind::Flow
        } else if self.ipv6_src != [0; 16] {
            IpSrcKind::Cfg
        } else {
            IpSrcKind::Any
        }
    }

    /// The match-map bucket this tuple lives in; doubles as its lookup
    /// priority (lower is more specific).
    #[must_use]
    pub fn bucket_index(&self) -> usize {
        6 * usize::from(self.in_key_flow)
            + 3 * usize::from(self.ip_dst_flow)
            + self.ip_src_kind() as usize
    }
}

impl fmt::Display for TunnelMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.ip_dst_flow {
            write!(
                f,
                "{}->{}",
                ipv6::format_mapped(Ipv6Addr::from(self.ipv6_src)),
                ipv6::format_mapped(Ipv6Addr::from(self.ipv6_dst))
            )?;
        } else if !self.ip_src_flow {
            write!(
                f,
                "{}->flow",
                ipv6::format_mapped(Ipv6Addr::from(self.ipv6_src))
            )?;
        } else {
            write!(f, "flow->flow")?;
        }

        if self.in_key_flow {
            write!(f, ", key=flow")?;
        } else {
            write!(f, ", key={:#x}", self.in_key.get())?;
        }

        write!(f, ", dp port={}", self.odp_port)?;
        write!(f, ", pkt mark={}", self.pkt_mark)
    }
}

/// A registered tunnel port.  Owned by the registry; referenced from
/// both of its indices.
pub(crate) struct TunnelPort<O> {
    /// The opaque upper-layer handle.  Not owned here; its lifetime is
    /// the enclosing system's responsibility.
    pub ofport: O,
    /// Strong reference to the netdev providing the tunnel config.
    pub netdev: Arc<dyn TunnelNetdev>,
    /// The netdev's change sequence as of registration; drift means the
    /// port needs reconfiguration.
    pub change_seq: u64,
    /// The match tuple the port was registered under.
    pub tmatch: TunnelMatch,
}

impl<O> TunnelPort<O> {
    pub(crate) fn name(&self) -> &str {
        self.netdev.name()
    }

    /// The long-form description logged with flow dumps.
    pub(crate) fn describe(&self) -> String {
        use std::fmt::Write as _;

        let cfg = self.netdev.tunnel_config();
        let mut out = String::new();
        let _ = write!(
            out,
            "port {}: {} ({}: {}",
            self.tmatch.odp_port,
            self.name(),
            self.netdev.kind(),
            self.tmatch
        );

        if cfg.out_key != cfg.in_key
            || cfg.out_key_present != cfg.in_key_present
            || cfg.out_key_flow != cfg.in_key_flow
        {
            if !cfg.out_key_present {
                let _ = write!(out, ", out_key=none");
            } else if cfg.out_key_flow {
                let _ = write!(out, ", out_key=flow");
            } else {
                let _ = write!(out, ", out_key={:#x}", cfg.out_key);
            }
        }

        if cfg.ttl_inherit {
            let _ = write!(out, ", ttl=inherit");
        } else {
            let _ = write!(out, ", ttl={}", cfg.ttl);
        }

        if cfg.tos_inherit {
            let _ = write!(out, ", tos=inherit");
        } else if cfg.tos != 0 {
            let _ = write!(out, ", tos={:#x}", cfg.tos);
        }

        if !cfg.dont_fragment {
            let _ = write!(out, ", df=false");
        }
        if cfg.csum {
            let _ = write!(out, ", csum=true");
        }
        let _ = write!(out, ")");
        out
    }
}
