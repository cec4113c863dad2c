// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Mac address type and logic.

use arrayvec::ArrayVec;
use std::fmt::Display;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// A [MAC Address] type.
///
/// `Mac` is a transparent wrapper around `[u8; 6]` which provides the
/// predicates and packing operations the dataplane needs, plus type
/// safety.  It derives the zerocopy traits so it can be embedded directly
/// in on-wire records.
///
/// [MAC Address]: https://en.wikipedia.org/wiki/MAC_address
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
    Unaligned,
)]
pub struct Mac(pub [u8; 6]);

impl From<[u8; 6]> for Mac {
    fn from(value: [u8; 6]) -> Self {
        Mac(value)
    }
}

impl From<Mac> for [u8; 6] {
    fn from(value: Mac) -> Self {
        value.0
    }
}

impl AsRef<[u8; 6]> for Mac {
    fn as_ref(&self) -> &[u8; 6] {
        &self.0
    }
}

impl AsMut<[u8; 6]> for Mac {
    fn as_mut(&mut self) -> &mut [u8; 6] {
        &mut self.0
    }
}

/// Errors which can occur while converting a string to a [`Mac`]
#[derive(Debug, thiserror::Error)]
pub enum MacFromStringError {
    /// Invalid string representation of mac address
    #[error("invalid string representation of mac address: {0}")]
    Invalid(String),
}

impl TryFrom<&str> for Mac {
    type Error = MacFromStringError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        const MAX_OCTETS: usize = 6;
        let mut octets_strs = value.split(':');
        let octets_parsed =
            octets_strs.try_fold(ArrayVec::<_, MAX_OCTETS>::new(), |mut acc, octet_str| {
                if octet_str.len() != 2 {
                    return Err(MacFromStringError::Invalid(value.to_string()));
                }
                if octet_str.chars().any(|c| !c.is_ascii_hexdigit()) {
                    return Err(MacFromStringError::Invalid(value.to_string()));
                }
                let parsed = u8::from_str_radix(octet_str, 16)
                    .map_err(|_| MacFromStringError::Invalid(value.to_string()))?;
                acc.try_push(parsed)
                    .map_err(|_| MacFromStringError::Invalid(value.to_string()))?;
                Ok(acc)
            })?;

        let octets = match octets_parsed.as_slice() {
            [o0, o1, o2, o3, o4, o5] => [*o0, *o1, *o2, *o3, *o4, *o5],
            _ => return Err(MacFromStringError::Invalid(value.to_string())),
        };

        Ok(Mac(octets))
    }
}

impl Mac {
    /// The broadcast `Mac`.
    pub const BROADCAST: Mac = Mac([u8::MAX; 6]);
    /// The exact (all-ones) mask; identical bits to [`Mac::BROADCAST`]
    /// but named for use as a wildcard mask.
    pub const EXACT: Mac = Mac([u8::MAX; 6]);
    /// The zero `Mac`.
    ///
    /// `ZERO` is illegal as a source or destination `Mac` in most contexts.
    pub const ZERO: Mac = Mac([0; 6]);
    /// Destination of [spanning tree protocol] frames.
    ///
    /// [spanning tree protocol]: https://en.wikipedia.org/wiki/Spanning_Tree_Protocol
    pub const STP: Mac = Mac([0x01, 0x80, 0xc2, 0x00, 0x00, 0x00]);
    /// Destination of [LACP] frames.
    ///
    /// [LACP]: https://en.wikipedia.org/wiki/Link_aggregation#Link_Aggregation_Control_Protocol
    pub const LACP: Mac = Mac([0x01, 0x80, 0xc2, 0x00, 0x00, 0x02]);
    /// The BFD discriminator destination address.
    pub const BFD: Mac = Mac([0x00, 0x23, 0x20, 0x00, 0x00, 0x01]);
    /// The vendor OUI carried by generated "vendor random" addresses.
    pub const VENDOR_OUI: [u8; 3] = [0x00, 0x23, 0x20];

    /// Returns true iff the binary representation of the [`Mac`] is exclusively ones.
    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        self == &Mac::BROADCAST
    }

    /// Returns true iff the [`Mac`] is usable as an exact wildcard mask
    /// (i.e., all ones).
    #[must_use]
    pub fn is_exact_mask(&self) -> bool {
        self == &Mac::EXACT
    }

    /// Returns true iff the least significant bit of the first octet of the [`Mac`] is one.
    #[must_use]
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 == 0x01
    }

    /// Returns true iff the least significant bit of the first octet of the [`Mac`] is zero.
    #[must_use]
    pub fn is_unicast(&self) -> bool {
        !self.is_multicast()
    }

    /// Returns true iff the binary representation of the [`Mac`] is exclusively zeros.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self == &Mac::ZERO
    }

    /// Returns true iff the address is locally administered.
    ///
    /// Local either by the second least significant bit of the first octet,
    /// or by carrying the vendor OUI with the high bit of the fourth octet
    /// set (the pattern [`Mac::vendor_random`] generates).
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.0[0] & 0x02 != 0
            || (self.0[..3] == Mac::VENDOR_OUI && self.0[3] & 0x80 != 0)
    }

    /// Returns true iff the address is universally administered.
    #[must_use]
    pub fn is_universal(&self) -> bool {
        !self.is_local()
    }

    /// Returns true if the [`Mac`] is reserved for link local usage.
    ///
    /// Link local usage includes [spanning tree protocol] and [LACP].
    ///
    /// [spanning tree protocol]: https://en.wikipedia.org/wiki/Spanning_Tree_Protocol
    /// [LACP]: https://en.wikipedia.org/wiki/Link_aggregation#Link_Aggregation_Control_Protocol
    #[must_use]
    pub fn is_link_local(&self) -> bool {
        let bytes = self.as_ref();
        (bytes[0..5] == [0x01, 0x80, 0xc2, 0x00, 0x00]) && (bytes[5] & 0x0f == bytes[5])
    }

    /// Returns true iff `self` and `other` agree on every bit set in `mask`.
    #[must_use]
    pub fn equal_under_mask(&self, other: Mac, mask: Mac) -> bool {
        self.0
            .iter()
            .zip(other.0)
            .zip(mask.0)
            .all(|((a, b), m)| (a ^ b) & m == 0)
    }

    /// Returns the bitwise complement of the address.
    #[must_use]
    pub fn invert(&self) -> Mac {
        let mut ret = *self;
        for octet in &mut ret.0 {
            *octet = !*octet;
        }
        ret
    }

    /// Pack the six octets into the low 48 bits of a `u64`.
    #[must_use]
    pub fn to_u64(self) -> u64 {
        let [a, b, c, d, e, f] = self.0;
        u64::from_be_bytes([0, 0, a, b, c, d, e, f])
    }

    /// Unpack the low 48 bits of `value` into an address.
    #[must_use]
    pub fn from_u64(value: u64) -> Mac {
        let [_, _, a, b, c, d, e, f] = value.to_be_bytes();
        Mac([a, b, c, d, e, f])
    }

    /// Pack the address and a VLAN id into a `u64`: the address occupies
    /// the low 48 bits and `vlan` the next 16.
    #[must_use]
    pub fn vlan_to_u64(self, vlan: u16) -> u64 {
        (u64::from(vlan) << 48) | self.to_u64()
    }

    /// Hash the address (qualified by `vlan`) with the given basis.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // basis only seeds the hasher
    pub fn hash_with_basis(self, vlan: u16, basis: u64) -> u64 {
        use std::hash::{BuildHasher, Hasher};
        let mut hasher = ahash::RandomState::with_seed(basis as usize).build_hasher();
        hasher.write_u64(self.vlan_to_u64(vlan));
        hasher.finish()
    }

    /// Generate a random unicast, locally administered address.
    #[must_use]
    pub fn random() -> Mac {
        let mut mac = Mac(rand::random());
        mac.0[0] &= !0x01; // unicast
        mac.0[0] |= 0x02; // private
        mac
    }

    /// Generate a random address carrying [`Mac::VENDOR_OUI`], with the
    /// high bit of the fourth octet marking it as generated.
    #[must_use]
    pub fn vendor_random() -> Mac {
        let mut mac = Mac::random();
        mac.0[..3].copy_from_slice(&Mac::VENDOR_OUI);
        mac.0[3] |= 0x80;
        mac
    }

    /// Format the address qualified by an optional mask: `addr` when the
    /// mask is absent or exact, `addr/mask` otherwise.
    #[must_use]
    pub fn format_masked(&self, mask: Option<Mac>) -> String {
        match mask {
            None => format!("{self}"),
            Some(mask) if mask.is_exact_mask() => format!("{self}"),
            Some(mask) => format!("{self}/{mask}"),
        }
    }

    /// Returns `Ok(())` iff the [`Mac`] is a legal source `Mac`.
    ///
    /// # Errors
    ///
    /// Multicast and zero are not legal source addresses.
    pub fn valid_src(&self) -> Result<(), SourceMacAddressError> {
        if self.is_zero() {
            Err(SourceMacAddressError::ZeroSource(*self))
        } else if self.is_multicast() {
            Err(SourceMacAddressError::MulticastSource(*self))
        } else {
            Ok(())
        }
    }

    /// Returns `Ok(())` iff the [`Mac`] is a legal destination [`Mac`].
    ///
    /// # Errors
    ///
    /// Zero is not a legal destination [`Mac`].
    pub fn valid_dst(&self) -> Result<(), DestinationMacAddressError> {
        if self.is_zero() {
            Err(DestinationMacAddressError::ZeroDestination(*self))
        } else {
            Ok(())
        }
    }
}

impl Display for Mac {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:<02x}:{:<02x}:{:<02x}:{:<02x}:{:<02x}:{:<02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

/// Errors which can occur while validating a source [`Mac`]
#[derive(Debug, thiserror::Error)]
pub enum SourceMacAddressError {
    /// Multicast [`Mac`]s are not legal as a source [`Mac`]
    #[error("invalid source MAC address: multicast MACs are illegal as source macs")]
    MulticastSource(Mac),
    /// Zero is not a legal source
    #[error("invalid source MAC address: zero MAC is illegal as source MAC")]
    ZeroSource(Mac),
}

/// Errors which can occur while validating a destination [`Mac`]
#[derive(Debug, thiserror::Error)]
pub enum DestinationMacAddressError {
    /// Zero is not a legal destination
    #[error("invalid destination mac address: zero mac is illegal as destination mac")]
    ZeroDestination(Mac),
}

#[cfg(any(test, feature = "arbitrary"))]
mod contract {
    use crate::eth::mac::Mac;
    use bolero::{Driver, TypeGenerator};

    impl TypeGenerator for Mac {
        fn generate<D: Driver>(u: &mut D) -> Option<Self> {
            Some(Mac(u.produce()?))
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)] // valid in test code
#[cfg(test)]
mod test {
    use super::Mac;

    #[test]
    fn display_parse_round_trip() {
        bolero::check!().with_type().cloned().for_each(|mac: Mac| {
            let formatted = mac.to_string();
            assert_eq!(Mac::try_from(formatted.as_str()).unwrap(), mac);
        });
    }

    #[test]
    fn mac_from_string_rejects_malformed() {
        assert!(Mac::try_from("00:00:00:00:00:00:00").is_err());
        assert!(Mac::try_from("00:00:00:00:00").is_err());
        assert!(Mac::try_from("00:00:00:00:00:000").is_err());
        assert!(Mac::try_from("00:00:00:00:+0:00").is_err());
    }

    #[test]
    fn pack_round_trip() {
        bolero::check!().with_type().cloned().for_each(|mac: Mac| {
            assert_eq!(Mac::from_u64(mac.to_u64()), mac);
            assert_eq!(mac.to_u64() >> 48, 0);
            assert_eq!(mac.vlan_to_u64(0x123) >> 48, 0x123);
        });
    }

    #[test]
    fn invert_is_involutive() {
        bolero::check!().with_type().cloned().for_each(|mac: Mac| {
            assert_eq!(mac.invert().invert(), mac);
        });
    }

    #[test]
    fn equal_under_mask_ignores_unmasked_bits() {
        let a = Mac([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
        let b = Mac([0x02, 0x00, 0x00, 0xff, 0xff, 0x01]);
        let mask = Mac([0xff, 0xff, 0xff, 0x00, 0x00, 0xff]);
        assert!(a.equal_under_mask(b, mask));
        assert!(!a.equal_under_mask(b, Mac::EXACT));
        assert!(a.equal_under_mask(b, Mac::ZERO));
    }

    #[test]
    fn predicates() {
        assert!(Mac::BROADCAST.is_broadcast());
        assert!(Mac::BROADCAST.is_multicast());
        assert!(Mac::EXACT.is_exact_mask());
        assert!(Mac::ZERO.is_zero());
        assert!(Mac::STP.is_link_local());
        assert!(Mac::LACP.is_link_local());
        assert!(!Mac::BFD.is_link_local());
        // Locally administered by bit 2 of the first octet.
        assert!(Mac([0x02, 0, 0, 0, 0, 1]).is_local());
        // Locally administered by the vendor random pattern.
        assert!(Mac([0x00, 0x23, 0x20, 0x80, 0, 1]).is_local());
        // Vendor OUI without the random marker is universal.
        assert!(Mac([0x00, 0x23, 0x20, 0x00, 0, 1]).is_universal());
    }

    #[test]
    fn random_addresses_are_unicast_and_local() {
        for _ in 0..32 {
            let mac = Mac::random();
            assert!(mac.is_unicast());
            assert!(mac.is_local());

            let vendor = Mac::vendor_random();
            assert!(vendor.is_unicast());
            assert!(vendor.is_local());
            assert_eq!(vendor.0[..3], Mac::VENDOR_OUI);
            assert_ne!(vendor.0[3] & 0x80, 0);
        }
    }

    #[test]
    fn hash_with_basis_is_deterministic() {
        let mac = Mac([2, 0, 0, 0, 0, 1]);
        assert_eq!(mac.hash_with_basis(5, 42), mac.hash_with_basis(5, 42));
        assert_eq!(mac.hash_with_basis(0, 0), mac.hash_with_basis(0, 0));
    }

    #[test]
    fn three_way_compare_is_byte_wise() {
        let low = Mac([0, 0, 0, 0, 0, 1]);
        let high = Mac([0, 0, 0, 0, 1, 0]);
        assert!(low < high);
        assert!(high < Mac::BROADCAST);
    }

    #[test]
    fn masked_format() {
        let mac = Mac([0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f]);
        assert_eq!(mac.format_masked(None), "0a:0b:0c:0d:0e:0f");
        assert_eq!(mac.format_masked(Some(Mac::EXACT)), "0a:0b:0c:0d:0e:0f");
        assert_eq!(
            mac.format_masked(Some(Mac([0xff, 0xff, 0xff, 0, 0, 0]))),
            "0a:0b:0c:0d:0e:0f/ff:ff:ff:00:00:00"
        );
    }
}
