// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The netdev-provided tunnel configuration and the collaborator traits.
//!
//! The tunnel core deliberately does not know VXLAN from GRE: a tunnel
//! netdev appears here as a configuration record, a change sequence, and
//! a callback that appends the protocol-specific outer L4 and tunnel
//! headers.

use crate::flow::{Flow, OdpPort};
use crate::header::TunnelHeader;
use serde::{Deserialize, Serialize};
use std::net::Ipv6Addr;

/// A tunnel netdev's configuration, as pulled when a port is registered.
///
/// IPv4 endpoints are carried in IPv4-mapped IPv6 form; an unspecified
/// address means "not configured" (wildcarded, for the source).  Each
/// `*_flow` flag defers the corresponding field to the flow table
/// instead of matching or stamping it here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelConfig {
    /// Tunnel key expected on received packets (network-independent
    /// host value).
    pub in_key: u64,
    /// Whether an `in_key` was configured at all.
    pub in_key_present: bool,
    /// Match the tunnel key in the flow table instead.
    pub in_key_flow: bool,

    /// Tunnel key stamped on transmitted packets.
    pub out_key: u64,
    /// Whether an `out_key` was configured at all.
    pub out_key_present: bool,
    /// Let the flow table provide the outgoing key.
    pub out_key_flow: bool,

    /// Local endpoint (mapped form for IPv4); unspecified to accept any
    /// source.
    pub ipv6_src: Ipv6Addr,
    /// Remote endpoint (mapped form for IPv4).
    pub ipv6_dst: Ipv6Addr,
    /// Match the source address in the flow table instead.
    pub ip_src_flow: bool,
    /// Match the destination address in the flow table instead.
    pub ip_dst_flow: bool,

    /// The tunnel is IPsec-protected.
    pub ipsec: bool,

    /// Outer TTL when not inherited.
    pub ttl: u8,
    /// Inherit the outer TTL from the inner header.
    pub ttl_inherit: bool,
    /// Outer TOS when not inherited.
    pub tos: u8,
    /// Inherit the outer DSCP from the inner header.
    pub tos_inherit: bool,

    /// Set the don't-fragment bit on outer headers.
    pub dont_fragment: bool,
    /// Checksum the outer transport header.
    pub csum: bool,

    /// Outer transport destination port (e.g. 4789 for VXLAN).
    pub dst_port: u16,
}

impl Default for TunnelConfig {
    fn default() -> TunnelConfig {
        TunnelConfig {
            in_key: 0,
            in_key_present: false,
            in_key_flow: false,
            out_key: 0,
            out_key_present: false,
            out_key_flow: false,
            ipv6_src: Ipv6Addr::UNSPECIFIED,
            ipv6_dst: Ipv6Addr::UNSPECIFIED,
            ip_src_flow: false,
            ip_dst_flow: false,
            ipsec: false,
            ttl: 0,
            ttl_inherit: false,
            tos: 0,
            tos_inherit: false,
            dont_fragment: false,
            csum: false,
            dst_port: 0,
        }
    }
}

/// Errors surfaced while building an outer header.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum HeaderError {
    /// The referenced port handle is not registered.
    #[error("unknown tunnel port")]
    UnknownPort,
    /// The netdev's tunnel type cannot build headers.
    #[error("tunnel type '{0}' cannot build outer headers")]
    Unsupported(String),
    /// The header buffer cannot hold the bytes being appended.
    #[error("outer header buffer cannot hold {needed} more bytes")]
    NoRoom {
        /// Bytes that did not fit.
        needed: usize,
    },
}

/// The tunnel netdev, as this core sees it.
///
/// `tunnel_config` is a pure read and may be called under the registry
/// lock.
pub trait TunnelNetdev: Send + Sync {
    /// The current tunnel configuration.
    fn tunnel_config(&self) -> TunnelConfig;

    /// A monotonically increasing sequence number, bumped on every
    /// configuration change.
    fn change_seq(&self) -> u64;

    /// The device's display name.
    fn name(&self) -> &str;

    /// The tunnel type string ("vxlan", "gre", ...).
    fn kind(&self) -> &str;

    /// Append the outer L4 and tunnel headers to `header`, which already
    /// carries the Ethernet and IPv4 prefix composed from `flow`.
    ///
    /// # Errors
    ///
    /// Whatever this returns is propagated verbatim to the caller of
    /// [`TunnelTable::build_header`].
    ///
    /// [`TunnelTable::build_header`]: crate::table::TunnelTable::build_header
    fn build_header(&self, header: &mut TunnelHeader, flow: &Flow) -> Result<(), HeaderError>;
}

/// The side table mapping tunnels terminated in userspace back to a
/// port name.
///
/// Implementations must tolerate being called while the registry lock is
/// held.
pub trait NativeTunnelSink: Send + Sync {
    /// Record that `name` terminates native-tunnel traffic arriving on
    /// `odp_port` with outer transport destination `dst_port`.
    fn insert(&self, odp_port: OdpPort, dst_port: u16, name: &str);

    /// Drop the record for `dst_port`.
    fn remove(&self, dst_port: u16);
}
