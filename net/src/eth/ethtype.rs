// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Ethernet type related fields and parsing

use etherparse::EtherType;

#[cfg(any(test, feature = "arbitrary"))]
#[allow(unused_imports)] // just re-exporting conditionally included feature
pub use contract::*;

/// The ethernet header's ethertype field.
///
/// This is a transparent wrapper around the type provided by etherparse.
/// The main point of wrapping this type is to
///
/// 1. Keep this crate's public surface independent of etherparse's,
/// 2. Permit the implementation of the `TypeGenerator` trait on this type
///    to allow us to property test the rest of our code.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EthType(pub(crate) EtherType);

impl EthType {
    /// Ethernet type for [address resolution protocol](https://en.wikipedia.org/wiki/Address_Resolution_Protocol)
    pub const ARP: EthType = EthType(EtherType::ARP);
    /// Ethernet type for reverse ARP
    pub const RARP: EthType = EthType(EtherType(0x8035));
    /// Ethernet type for [IPv4](https://en.wikipedia.org/wiki/IPv4)
    pub const IPV4: EthType = EthType(EtherType::IPV4);
    /// Ethernet type for [IPv6](https://en.wikipedia.org/wiki/IPv6)
    pub const IPV6: EthType = EthType(EtherType::IPV6);
    /// Ethernet type for [VLAN](https://en.wikipedia.org/wiki/IEEE_802.1Q)
    pub const VLAN: EthType = EthType(EtherType::VLAN_TAGGED_FRAME);
    /// Ethernet type for [QinQ (aka provider bridging)](https://en.wikipedia.org/wiki/IEEE_802.1ad)
    pub const VLAN_QINQ: EthType = EthType(EtherType::PROVIDER_BRIDGING);
    /// Ethernet type for MPLS unicast
    pub const MPLS: EthType = EthType(EtherType(0x8847));
    /// Ethernet type for MPLS multicast
    pub const MPLS_MCAST: EthType = EthType(EtherType(0x8848));
    /// Ethernet type for transparent ethernet bridging (the GRE payload
    /// type used when bridging full frames)
    pub const TEB: EthType = EthType(EtherType(0x6558));
    /// Ethernet type for [LACP](https://en.wikipedia.org/wiki/Link_aggregation)
    pub const LACP: EthType = EthType(EtherType(0x8809));
    /// Minimum value for an ethertype: values below this are IEEE 802.2
    /// frame lengths rather than types.
    pub const MIN: u16 = 0x600;

    /// Map a raw (native-endian) u16 into an [`EthType`]
    #[must_use]
    pub const fn new(raw: u16) -> EthType {
        EthType(EtherType(raw))
    }

    /// Map a raw (big-endian) u16 into an [`EthType`]
    #[must_use]
    pub const fn new_from_be_bytes(raw: [u8; 2]) -> EthType {
        EthType(EtherType(u16::from_be_bytes(raw)))
    }

    /// get the raw `u16` value (native-endian)
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0 .0
    }

    /// True iff this is one of the two VLAN tag ethertypes (802.1Q or
    /// 802.1ad).
    #[must_use]
    pub fn is_vlan(self) -> bool {
        self == EthType::VLAN || self == EthType::VLAN_QINQ
    }

    /// True iff this is one of the two MPLS ethertypes.
    #[must_use]
    pub fn is_mpls(self) -> bool {
        self == EthType::MPLS || self == EthType::MPLS_MCAST
    }

    /// True iff the ethertype carries an IP payload of either family.
    #[must_use]
    pub fn is_ip_any(self) -> bool {
        self == EthType::IPV4 || self == EthType::IPV6
    }
}

impl From<EtherType> for EthType {
    fn from(value: EtherType) -> Self {
        EthType(value)
    }
}

impl From<EthType> for EtherType {
    fn from(value: EthType) -> Self {
        value.0
    }
}

#[cfg(any(test, feature = "arbitrary"))]
mod contract {
    use super::EthType;
    use bolero::{Driver, TypeGenerator};
    use etherparse::EtherType;

    impl TypeGenerator for EthType {
        fn generate<D: Driver>(u: &mut D) -> Option<Self> {
            Some(EthType(EtherType(u.produce()?)))
        }
    }
}
