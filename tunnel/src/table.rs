// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The tunnel-port registry and the operations the classifier and the
//! action translator call into.
//!
//! A [`TunnelTable`] maps packets received over tunnel protocols to the
//! port handle that claims them, and stamps outgoing flows with a port's
//! outer-header parameters.  Ports are indexed twice: by handle, and by
//! [`TunnelMatch`] across twelve buckets whose order encodes lookup
//! priority (see [`port`]).
//!
//! The table is a value: the process-global lock and index pointers of
//! classic implementations are bundled here so every operation goes
//! through an instance.  One readers-writer lock protects both indices;
//! lookups run concurrently, mutations exclusively, and a mutation is
//! visible to exactly those lookups that acquire the lock after it
//! releases.
//!
//! [`port`]: crate::port

use crate::config::{HeaderError, NativeTunnelSink, TunnelNetdev};
use crate::flow::{Flow, FlowTnl, FlowWildcards, OdpPort};
use crate::header::TunnelHeader;
use crate::port::{IpSrcKind, TunnelMatch, TunnelPort, IPSEC_MARK, N_MATCH_TYPES};
use crate::ratelimit::RateLimiter;
use ahash::RandomState;
use core::hash::Hash;
use net::checksum::checksum;
use net::eth::ethtype::EthType;
use net::eth::mac::Mac;
use net::eth::EthHdr;
use net::ipv4::{Ipv4Hdr, DSCP_MASK, ECN_CE, ECN_ECT_0, ECN_MASK, ECN_NOT_ECT, IP_DF};
use net::ipv6;
use net::wire::{Be16, Be64};
use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::{Arc, LazyLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::{debug, warn};
use zerocopy::FromBytes;

// Misses and ECN drops are per-packet conditions; the flow dumps are
// even hotter.
static WARN_RL: LazyLock<RateLimiter> =
    LazyLock::new(|| RateLimiter::new(1, Duration::from_secs(5)));
static DBG_RL: LazyLock<RateLimiter> =
    LazyLock::new(|| RateLimiter::new(60, Duration::from_secs(60)));

/// Errors from [`TunnelTable::add`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AddError {
    /// A port with an identical match tuple is already registered.
    #[error("a tunnel port with the same match configuration already exists")]
    Exists,
}

type MatchMap<O> = HashMap<TunnelMatch, O, RandomState>;

struct TableInner<O> {
    /// The owning index, keyed by the opaque port handle.
    ofport_map: HashMap<O, TunnelPort<O>, RandomState>,
    /// The match index, partitioned by wildcarding pattern.  A bucket is
    /// allocated on first insertion and freed when it empties.
    match_maps: [Option<MatchMap<O>>; N_MATCH_TYPES],
}

/// The tunnel-port registry.
///
/// `O` is the opaque handle identifying the upper layer's port; the
/// registry stores it, never inspects it beyond identity.
pub struct TunnelTable<O> {
    inner: RwLock<TableInner<O>>,
    native: Option<Arc<dyn NativeTunnelSink>>,
}

impl<O> Default for TunnelTable<O>
where
    O: Copy + Eq + Hash,
{
    fn default() -> TunnelTable<O> {
        TunnelTable::new()
    }
}

impl<O> TunnelTable<O>
where
    O: Copy + Eq + Hash,
{
    /// An empty registry with no native-tunnel side table.
    #[must_use]
    pub fn new() -> TunnelTable<O> {
        TunnelTable {
            inner: RwLock::new(TableInner {
                ofport_map: HashMap::default(),
                match_maps: std::array::from_fn(|_| None),
            }),
            native: None,
        }
    }

    /// An empty registry which reports native tunnels to `sink`.
    ///
    /// The sink is invoked while the registry lock is held and must be
    /// reentrant with respect to it.
    #[must_use]
    pub fn with_native_sink(sink: Arc<dyn NativeTunnelSink>) -> TunnelTable<O> {
        TunnelTable {
            native: Some(sink),
            ..TunnelTable::new()
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, TableInner<O>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, TableInner<O>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `ofport` as a tunnel port carried by `odp_port`, with
    /// the tunnel configuration pulled from `netdev`.  Ports must be
    /// registered before the other operations can see them.
    ///
    /// When `native_tnl` is set, the (datapath port, outer transport
    /// port, name) triple is reported to the native-tunnel sink.
    ///
    /// # Errors
    ///
    /// Returns [`AddError::Exists`] (and logs the conflicting port) if a
    /// port with an identical match tuple is already registered; the
    /// registry is unchanged in that case.
    pub fn add(
        &self,
        ofport: O,
        netdev: Arc<dyn TunnelNetdev>,
        odp_port: OdpPort,
        native_tnl: bool,
        name: &str,
    ) -> Result<(), AddError> {
        let mut inner = self.write();
        self.add_locked(&mut inner, ofport, &netdev, odp_port, true, native_tnl, name)
    }

    #[allow(clippy::too_many_arguments)] // mirrors the registration surface
    fn add_locked(
        &self,
        inner: &mut TableInner<O>,
        ofport: O,
        netdev: &Arc<dyn TunnelNetdev>,
        odp_port: OdpPort,
        warn_on_dup: bool,
        native_tnl: bool,
        name: &str,
    ) -> Result<(), AddError> {
        let cfg = netdev.tunnel_config();
        let tmatch = TunnelMatch::from_config(&cfg, odp_port);
        let bucket = tmatch.bucket_index();

        if let Some(existing) = inner.match_maps[bucket]
            .as_ref()
            .and_then(|map| map.get(&tmatch))
        {
            if warn_on_dup {
                let existing_name = inner
                    .ofport_map
                    .get(existing)
                    .map_or("<unknown>", TunnelPort::name);
                warn!(
                    "{}: attempting to add tunnel port with same config as port '{}' ({})",
                    netdev.name(),
                    existing_name,
                    tmatch
                );
            }
            return Err(AddError::Exists);
        }

        let port = TunnelPort {
            ofport,
            netdev: Arc::clone(netdev),
            change_seq: netdev.change_seq(),
            tmatch,
        };
        debug!("adding tunnel port {} ({})", port.name(), tmatch);
        inner.ofport_map.insert(ofport, port);
        inner.match_maps[bucket]
            .get_or_insert_with(HashMap::default)
            .insert(tmatch, ofport);

        if native_tnl {
            if let Some(sink) = &self.native {
                sink.insert(odp_port, cfg.dst_port, name);
            }
        }
        Ok(())
    }

    /// Remove `ofport` from the registry.  Unknown handles are ignored.
    pub fn del(&self, ofport: O) {
        let mut inner = self.write();
        self.del_locked(&mut inner, ofport);
    }

    fn del_locked(&self, inner: &mut TableInner<O>, ofport: O) {
        if let Some(port) = inner.ofport_map.remove(&ofport) {
            let cfg = port.netdev.tunnel_config();
            if let Some(sink) = &self.native {
                // Unregistration goes by outer transport port and is
                // offered for every deleted port, native or not; the
                // sink treats an unknown port as a no-op.
                sink.remove(cfg.dst_port);
            }
            debug!("removing tunnel port {} ({})", port.name(), port.tmatch);
            let bucket = port.tmatch.bucket_index();
            if let Some(map) = inner.match_maps[bucket].as_mut() {
                map.remove(&port.tmatch);
                if map.is_empty() {
                    inner.match_maps[bucket] = None;
                }
            }
        }
    }

    /// Bring `ofport` in line with its netdev's current configuration.
    ///
    /// An unknown handle is registered afresh (without the duplicate
    /// warning).  A known handle whose netdev reference, datapath port,
    /// or change sequence has moved is deleted and re-added.  Returns
    /// true iff the registry changed.
    pub fn reconfigure(
        &self,
        ofport: O,
        netdev: Arc<dyn TunnelNetdev>,
        odp_port: OdpPort,
        native_tnl: bool,
        name: &str,
    ) -> bool {
        let mut inner = self.write();
        let Some(port) = inner.ofport_map.get(&ofport) else {
            return self
                .add_locked(&mut inner, ofport, &netdev, odp_port, false, native_tnl, name)
                .is_ok();
        };
        let drifted = !Arc::ptr_eq(&port.netdev, &netdev)
            || port.tmatch.odp_port != odp_port
            || port.change_seq != port.netdev.change_seq();
        if !drifted {
            return false;
        }
        debug!("reconfiguring {}", port.name());
        self.del_locked(&mut inner, ofport);
        let _ = self.add_locked(&mut inner, ofport, &netdev, odp_port, true, native_tnl, name);
        true
    }

    /// Look up the tunnel port claiming the metadata in `flow`.  Returns
    /// the handle of the best match, or `None` when no port claims the
    /// flow.
    ///
    /// Callers should verify that `flow` wants tunnel processing with
    /// [`should_receive`] first.
    pub fn receive(&self, flow: &Flow) -> Option<O> {
        let inner = self.read();
        let Some(port) = Self::find(&inner, flow) else {
            if WARN_RL.check() {
                warn!(%flow, "receive tunnel port not found");
            }
            return None;
        };
        if DBG_RL.check() {
            debug!(port = %port.describe(), %flow, "flow received");
        }
        Some(port.ofport)
    }

    /// The best-matching port for `flow`: walk the twelve buckets from
    /// most to least specific, and within each do an exact-tuple lookup
    /// against a match synthesized from the flow.  The first hit wins.
    #[allow(clippy::field_reassign_with_default)] // the pad field keeps literal construction out of reach
    fn find<'a>(inner: &'a TableInner<O>, flow: &Flow) -> Option<&'a TunnelPort<O>> {
        let mut index = 0;
        for in_key_flow in [false, true] {
            for ip_dst_flow in [false, true] {
                for ip_src in [IpSrcKind::Cfg, IpSrcKind::Any, IpSrcKind::Flow] {
                    if let Some(map) = &inner.match_maps[index] {
                        let mut tmatch = TunnelMatch::default();

                        // The apparent mix-up of destination and source
                        // below is correct: the match tuple is expressed
                        // in terms of packets being sent out, but here
                        // it describes how to treat received packets.
                        tmatch.in_key = if in_key_flow {
                            Be64::ZERO
                        } else {
                            flow.tunnel.tun_id
                        };
                        if ip_src == IpSrcKind::Cfg {
                            tmatch.ipv6_src = flow.tunnel.dst().octets();
                        }
                        if !ip_dst_flow {
                            tmatch.ipv6_dst = flow.tunnel.src().octets();
                        }
                        tmatch.odp_port = flow.in_port;
                        tmatch.pkt_mark = flow.pkt_mark;
                        tmatch.in_key_flow = in_key_flow;
                        tmatch.ip_dst_flow = ip_dst_flow;
                        tmatch.ip_src_flow = ip_src == IpSrcKind::Flow;

                        if let Some(ofport) = map.get(&tmatch) {
                            return inner.ofport_map.get(ofport);
                        }
                    }
                    index += 1;
                }
            }
        }
        None
    }

    /// Stamp `flow`'s tunnel fields for output through `ofport` and
    /// return the datapath port to emit on, or `None` (with `flow`
    /// untouched) when the handle is unknown.
    pub fn send(&self, ofport: O, flow: &mut Flow, wc: &mut FlowWildcards) -> Option<OdpPort> {
        let inner = self.read();
        let port = inner.ofport_map.get(&ofport)?;
        let cfg = port.netdev.tunnel_config();
        let pre = DBG_RL.check().then(|| flow.to_string());

        if !cfg.ip_src_flow {
            let src = Ipv6Addr::from(port.tmatch.ipv6_src);
            let mapped = ipv6::mapped_ipv4(src);
            flow.tunnel.ip_src.set(mapped.map_or(0, u32::from));
            if mapped.is_none() {
                flow.tunnel.ipv6_src = src.octets();
            }
        }
        if !cfg.ip_dst_flow {
            let dst = Ipv6Addr::from(port.tmatch.ipv6_dst);
            let mapped = ipv6::mapped_ipv4(dst);
            flow.tunnel.ip_dst.set(mapped.map_or(0, u32::from));
            if mapped.is_none() {
                flow.tunnel.ipv6_dst = dst.octets();
            }
        }
        flow.pkt_mark = port.tmatch.pkt_mark;

        if !cfg.out_key_flow {
            flow.tunnel.tun_id.set(cfg.out_key);
        }

        if cfg.ttl_inherit && flow.is_ip_any() {
            wc.masks.nw_ttl = 0xff;
            flow.tunnel.ip_ttl = flow.nw_ttl;
        } else {
            flow.tunnel.ip_ttl = cfg.ttl;
        }

        if cfg.tos_inherit && flow.is_ip_any() {
            wc.masks.nw_tos |= DSCP_MASK;
            flow.tunnel.ip_tos = flow.nw_tos & DSCP_MASK;
        } else {
            flow.tunnel.ip_tos = cfg.tos;
        }

        // ECN fields are always inherited.
        if flow.is_ip_any() {
            wc.masks.nw_tos |= ECN_MASK;
            if flow.nw_tos & ECN_MASK == ECN_CE {
                // The outer header must never carry CE the inner packet
                // could not have set itself.
                flow.tunnel.ip_tos |= ECN_ECT_0;
            } else {
                flow.tunnel.ip_tos |= flow.nw_tos & ECN_MASK;
            }
        }

        let mut flags = 0;
        if cfg.dont_fragment {
            flags |= FlowTnl::F_DONT_FRAGMENT;
        }
        if cfg.csum {
            flags |= FlowTnl::F_CSUM;
        }
        if cfg.out_key_present {
            flags |= FlowTnl::F_KEY;
        }
        flow.tunnel.flags |= flags;

        if let Some(pre) = pre {
            debug!(port = %port.describe(), %pre, post = %flow, "flow sent");
        }
        Some(port.tmatch.odp_port)
    }

    /// Materialize the outer Ethernet + IPv4 prefix for a push-tunnel
    /// action through `ofport`, then let the netdev append its L4 and
    /// tunnel bytes, and finally stamp the IPv4 header checksum.
    ///
    /// The Ethernet type of the outer frame is always IPv4; an IPv6
    /// outer transport is not supported by this path.
    ///
    /// # Errors
    ///
    /// [`HeaderError::UnknownPort`] when the handle is not registered;
    /// any error of the netdev callback is propagated verbatim.
    pub fn build_header(
        &self,
        ofport: O,
        flow: &Flow,
        dmac: Mac,
        smac: Mac,
        src_ip: Ipv4Addr,
        header: &mut TunnelHeader,
    ) -> Result<(), HeaderError> {
        let inner = self.read();
        let netdev = inner
            .ofport_map
            .get(&ofport)
            .map(|port| Arc::clone(&port.netdev))
            .ok_or(HeaderError::UnknownPort)?;
        // The netdev reference keeps the device alive past the lock; the
        // callback below must not run under it.
        drop(inner);

        header.clear();
        let room = header.append(EthHdr::LEN + Ipv4Hdr::LEN)?;
        let (eth, rest) = EthHdr::mut_from_prefix(room).map_err(|_| HeaderError::NoRoom {
            needed: EthHdr::LEN,
        })?;
        *eth = EthHdr::new(dmac, smac, EthType::IPV4);

        let (ip, _) = Ipv4Hdr::mut_from_prefix(rest).map_err(|_| HeaderError::NoRoom {
            needed: Ipv4Hdr::LEN,
        })?;
        ip.ihl_ver = Ipv4Hdr::ihl_ver(5, 4);
        ip.tos = flow.tunnel.ip_tos;
        ip.ttl = flow.tunnel.ip_ttl;
        ip.frag_off = if flow.tunnel.flags & FlowTnl::F_DONT_FRAGMENT != 0 {
            Be16::new(IP_DF)
        } else {
            Be16::ZERO
        };
        ip.src.set(u32::from(src_ip));
        ip.dst.set(flow.tunnel.ip_dst.get());

        netdev.build_header(header, flow)?;

        // The checksum goes in last, once the netdev is done.
        let bytes = header.as_mut_slice();
        let csum = checksum(&bytes[EthHdr::LEN..EthHdr::LEN + Ipv4Hdr::LEN]);
        bytes[EthHdr::LEN + 10..EthHdr::LEN + 12].copy_from_slice(&csum.to_be_bytes());
        Ok(())
    }
}

/// True iff `flow` arrived over a tunnel: either outer destination slot
/// is set.
#[must_use]
pub fn should_receive(flow: &Flow) -> bool {
    flow.tunnel.dst_is_set()
}

/// Initialize the wildcards a tunneled flow always depends on.  Called
/// at the start of action translation.
pub fn wc_init(flow: &Flow, wc: &mut FlowWildcards) {
    if !should_receive(flow) {
        return;
    }
    wc.masks.tunnel.tun_id = Be64::MAX;
    if !flow.tunnel.ip_dst.is_zero() {
        wc.masks.tunnel.ip_src.set(u32::MAX);
        wc.masks.tunnel.ip_dst.set(u32::MAX);
    } else {
        wc.masks.tunnel.ipv6_src = [0xff; 16];
        wc.masks.tunnel.ipv6_dst = [0xff; 16];
    }
    wc.masks.tunnel.flags = FlowTnl::F_DONT_FRAGMENT | FlowTnl::F_CSUM | FlowTnl::F_KEY;
    wc.masks.tunnel.ip_tos = u8::MAX;
    wc.masks.tunnel.ip_ttl = u8::MAX;
    // The outer transport ports are always wildcarded; do not
    // unwildcard them here.
    wc.masks.tunnel.tp_src = Be16::ZERO;
    wc.masks.tunnel.tp_dst = Be16::ZERO;

    wc.masks.pkt_mark = u32::MAX;

    // The receive path may overwrite the inner ECN when the outer is
    // CE.
    if flow.is_ip_any() && flow.tunnel.ip_tos & ECN_MASK == ECN_CE {
        wc.masks.nw_tos |= ECN_MASK;
    }
}

/// Apply the receive-side ECN policy to a tunneled flow.  Returns false
/// if the packet must be dropped (outer congestion mark on a
/// non-ECN-capable inner packet).
pub fn process_ecn(flow: &mut Flow) -> bool {
    if !should_receive(flow) {
        return true;
    }

    if flow.is_ip_any() && flow.tunnel.ip_tos & ECN_MASK == ECN_CE {
        if flow.nw_tos & ECN_MASK == ECN_NOT_ECT {
            if WARN_RL.check() {
                warn!("dropping tunnel packet marked ECN CE but is not ECN capable");
            }
            return false;
        }

        // Set the ECN CE value in the tunneled packet.
        flow.nw_tos |= ECN_CE;
    }

    // The mark was tunnel demux state, not a user-visible field.  It is
    // cleared whether or not this flow was IPsec-protected.
    flow.pkt_mark &= !IPSEC_MARK;
    true
}
