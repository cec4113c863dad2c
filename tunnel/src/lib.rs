// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Tunnel-port demultiplexing and encapsulation core.
//!
//! This crate decides, for each packet traversing a tunnel, which logical
//! tunnel port it belongs to (on receive) and which datapath port and
//! outer-header fields to use (on send).  The centerpiece is the
//! [`TunnelTable`]: a concurrent registry of tunnel ports indexed both by
//! opaque port handle and by match tuple, the latter partitioned across
//! twelve sub-maps encoding the priority order of the wildcarding
//! policies.
//!
//! The classifier itself, the datapath, and the per-protocol netdevs are
//! external: the netdev appears here as an opaque provider of a
//! [`TunnelConfig`] and a header-finalization callback.
//!
//! [`TunnelTable`]: crate::table::TunnelTable
//! [`TunnelConfig`]: crate::config::TunnelConfig

#![deny(
    unsafe_code,
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic
)]
#![allow(clippy::should_panic_without_expect)] // we panic in contract checks with simple unwrap()

pub mod config;
pub mod flow;
pub mod header;
pub mod port;
pub mod ratelimit;
pub mod table;

pub use config::{HeaderError, NativeTunnelSink, TunnelConfig, TunnelNetdev};
pub use flow::{Flow, FlowTnl, FlowWildcards, OdpPort};
pub use header::TunnelHeader;
pub use port::TunnelMatch;
pub use table::{process_ecn, should_receive, wc_init, AddError, TunnelTable};
