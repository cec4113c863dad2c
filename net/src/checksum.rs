// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Checksum primitives: the one's-complement Internet checksum, its
//! incremental-update forms, the TCP/UDP pseudo-header sum, and the
//! CRC32c used by SCTP.

use crate::ipv4::Ipv4Hdr;

/// A streaming one's-complement (RFC 1071) checksum accumulator.
///
/// Bytes may be fed in chunks of any length; an odd-length chunk leaves a
/// trailing byte pending that pairs with the first byte of the next
/// chunk, so chunk boundaries do not affect the result.
#[derive(Debug, Default, Clone)]
pub struct Checksum {
    sum: u32,
    trailing: Option<u8>,
}

impl Checksum {
    /// Start a fresh accumulator.
    #[must_use]
    pub fn new() -> Checksum {
        Checksum::default()
    }

    /// Start an accumulator seeded with a partial sum (e.g. a
    /// pseudo-header sum).
    #[must_use]
    pub fn with_partial(partial: u32) -> Checksum {
        Checksum {
            sum: partial,
            trailing: None,
        }
    }

    /// Fold `bytes` into the sum.
    pub fn add_bytes(&mut self, bytes: &[u8]) {
        let mut bytes = bytes;
        if let Some(pending) = self.trailing.take() {
            if let Some((&first, rest)) = bytes.split_first() {
                self.sum += u32::from(u16::from_be_bytes([pending, first]));
                bytes = rest;
            } else {
                self.trailing = Some(pending);
                return;
            }
        }
        let mut chunks = bytes.chunks_exact(2);
        for pair in &mut chunks {
            self.sum += u32::from(u16::from_be_bytes([pair[0], pair[1]]));
        }
        if let [last] = chunks.remainder() {
            self.trailing = Some(*last);
        }
    }

    /// Fold a single 16-bit word (host byte order) into the sum.
    pub fn add_u16(&mut self, word: u16) {
        self.add_bytes(&word.to_be_bytes());
    }

    /// The finished checksum: the one's complement of the folded sum,
    /// ready to store in a header's checksum field.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // folded below 16 bits first
    pub fn finish(mut self) -> u16 {
        if let Some(pending) = self.trailing.take() {
            self.sum += u32::from(u16::from_be_bytes([pending, 0]));
        }
        let mut sum = self.sum;
        while sum > 0xffff {
            sum = (sum & 0xffff) + (sum >> 16);
        }
        !(sum as u16)
    }
}

/// One-shot checksum over `bytes`.
#[must_use]
pub fn checksum(bytes: &[u8]) -> u16 {
    let mut csum = Checksum::new();
    csum.add_bytes(bytes);
    csum.finish()
}

/// Incrementally update a stored checksum for a 16-bit field change,
/// per RFC 1624.
//
// From RFC 1624, with HC the old stored checksum, m the old field value
// and m' the new one:
//
//     HC' = ~(~HC + ~m + m')    --    [Eqn. 3]
//
// computed here by subtracting complements with borrow:
//
//     HC' = HC - ~m - m'        --    [Eqn. 4]
#[must_use]
pub fn update_u16(csum: u16, old: u16, new: u16) -> u16 {
    let (mut tmp, borrow) = csum.overflowing_sub(!old);
    if borrow {
        tmp = tmp.wrapping_sub(1);
    }
    let (mut ret, borrow) = tmp.overflowing_sub(new);
    if borrow {
        ret = ret.wrapping_sub(1);
    }
    ret
}

/// Incrementally update a stored checksum for a 32-bit field change.
#[must_use]
#[allow(clippy::cast_possible_truncation)] // halving is intentional
pub fn update_u32(csum: u16, old: u32, new: u32) -> u16 {
    let tmp = update_u16(csum, (old >> 16) as u16, (new >> 16) as u16);
    update_u16(tmp, old as u16, new as u16)
}

/// The pseudo-header partial sum for a TCP or UDP checksum over IPv4:
/// source, destination, protocol, and L4 length, ready to seed
/// [`Checksum::with_partial`].
#[must_use]
pub fn pseudoheader_partial(ip: &Ipv4Hdr) -> u32 {
    let src = ip.src.get();
    let dst = ip.dst.get();
    let l4_len = ip.total_len.get().wrapping_sub(u16::from(ip.ihl()) * 4);
    (src >> 16)
        + (src & 0xffff)
        + (dst >> 16)
        + (dst & 0xffff)
        + u32::from(ip.proto)
        + u32::from(l4_len)
}

/// CRC32c (the Castagnoli polynomial, reflected), as SCTP requires.
#[must_use]
pub fn crc32c(bytes: &[u8]) -> u32 {
    let mut crc = u32::MAX;
    for byte in bytes {
        crc ^= u32::from(*byte);
        for _ in 0..8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ 0x82f6_3b78
            } else {
                crc >> 1
            };
        }
    }
    !crc
}

#[allow(clippy::unwrap_used, clippy::expect_used)] // valid in test code
#[cfg(test)]
mod test {
    use super::{checksum, crc32c, pseudoheader_partial, update_u16, update_u32, Checksum};
    use crate::ipv4::Ipv4Hdr;
    use crate::wire::{Be16, SplitBe32};
    use zerocopy::IntoBytes;

    #[test]
    fn known_ipv4_header_checksum() {
        // The classic example header from RFC 1071 discussions.
        let bytes: [u8; 20] = [
            0x45, 0x00, 0x00, 0x73, 0x00, 0x00, 0x40, 0x00, 0x40, 0x11, 0x00, 0x00, 0xc0, 0xa8,
            0x00, 0x01, 0xc0, 0xa8, 0x00, 0xc7,
        ];
        assert_eq!(checksum(&bytes), 0xb861);
    }

    #[test]
    fn verifying_a_filled_header_yields_zero() {
        bolero::check!()
            .with_type()
            .cloned()
            .for_each(|mut bytes: [u8; 20]| {
                bytes[10] = 0;
                bytes[11] = 0;
                let csum = checksum(&bytes);
                bytes[10..12].copy_from_slice(&csum.to_be_bytes());
                // Sum over the full header including the stored checksum
                // is all-ones, i.e. the complement is zero.
                assert_eq!(checksum(&bytes), 0);
            });
    }

    #[test]
    fn chunk_boundaries_do_not_change_the_sum() {
        bolero::check!()
            .with_type()
            .cloned()
            .for_each(|(bytes, split): (Vec<u8>, usize)| {
                let whole = checksum(&bytes);
                let split = if bytes.is_empty() {
                    0
                } else {
                    split % bytes.len()
                };
                let mut chunked = Checksum::new();
                chunked.add_bytes(&bytes[..split]);
                chunked.add_bytes(&bytes[split..]);
                assert_eq!(chunked.finish(), whole);
            });
    }

    #[test]
    fn incremental_update_matches_recompute() {
        bolero::check!()
            .with_type()
            .cloned()
            .for_each(|(mut bytes, new_word): ([u8; 20], u16)| {
                // Pin a nonzero word so the sum never degenerates to the
                // ambiguous all-zero case, which a fresh computation and
                // the incremental form represent differently (+0 vs -0).
                bytes[0] = 0x45;
                bytes[10] = 0;
                bytes[11] = 0;
                let csum = checksum(&bytes);
                let old_word = u16::from_be_bytes([bytes[2], bytes[3]]);
                bytes[2..4].copy_from_slice(&new_word.to_be_bytes());
                let updated = update_u16(csum, old_word, new_word);
                assert_eq!(updated, checksum(&bytes));
            });
    }

    #[test]
    fn incremental_update_u32_matches_recompute() {
        bolero::check!()
            .with_type()
            .cloned()
            .for_each(|(mut bytes, new_word): ([u8; 20], u32)| {
                bytes[0] = 0x45; // see incremental_update_matches_recompute
                bytes[10] = 0;
                bytes[11] = 0;
                let csum = checksum(&bytes);
                let old_word = u32::from_be_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]);
                bytes[12..16].copy_from_slice(&new_word.to_be_bytes());
                let updated = update_u32(csum, old_word, new_word);
                assert_eq!(updated, checksum(&bytes));
            });
    }

    #[test]
    fn pseudoheader_covers_addresses_protocol_and_length() {
        let ip = Ipv4Hdr {
            ihl_ver: Ipv4Hdr::ihl_ver(5, 4),
            tos: 0,
            total_len: Be16::new(20 + 8),
            id: Be16::ZERO,
            frag_off: Be16::ZERO,
            ttl: 64,
            proto: crate::ipv4::PROTO_UDP,
            csum: Be16::ZERO,
            src: SplitBe32::new(0xc0a8_0001),
            dst: SplitBe32::new(0xc0a8_00c7),
        };
        let partial = pseudoheader_partial(&ip);
        let expected = 0xc0a8 + 0x0001 + 0xc0a8 + 0x00c7 + 17 + 8;
        assert_eq!(partial, expected);
        let _ = ip.as_bytes();
    }

    #[test]
    fn crc32c_known_vectors() {
        // RFC 3720 appendix B.4 test vectors.
        assert_eq!(crc32c(&[0u8; 32]), 0x8a91_36aa);
        assert_eq!(crc32c(&[0xffu8; 32]), 0x62a8_ab43);
        let ascending: Vec<u8> = (0..32).collect();
        assert_eq!(crc32c(&ascending), 0x46dd_794e);
    }
}
