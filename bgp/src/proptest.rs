// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Property-based tests for the wire primitives: integer round trips and
//! the zero-padding rule for variable-width prefixes.

use crate::wire::{prefix_octets, Reader};
use proptest::prelude::*;

proptest! {
    /// Property: big-endian u16 write/read is the identity.
    #[test]
    fn prop_u16_round_trip(v in any::<u16>()) {
        let buf = v.to_be_bytes();
        let mut r = Reader::new(&buf);
        prop_assert_eq!(r.read_u16().unwrap(), v);
    }

    /// Property: big-endian u32 write/read is the identity.
    #[test]
    fn prop_u32_round_trip(v in any::<u32>()) {
        let buf = v.to_be_bytes();
        let mut r = Reader::new(&buf);
        prop_assert_eq!(r.read_u32().unwrap(), v);
    }

    /// Property: a decoded IPv4 prefix carries zero bits past the octets
    /// present on the wire.
    #[test]
    fn prop_v4_prefix_padding(
        octets in proptest::array::uniform4(any::<u8>()),
        mask in 0u8..=32,
    ) {
        let n = prefix_octets(mask);
        let mut r = Reader::new(&octets[..n]);
        let decoded = r.read_v4_prefix(mask).unwrap();
        let bits = u32::from(decoded);
        // Everything past the wire octets must be zero-padded.
        if n < 4 {
            prop_assert_eq!(bits & (u32::MAX >> (n * 8)), 0);
        }
        // Everything on the wire must round-trip untouched.
        prop_assert_eq!(&decoded.octets()[..n], &octets[..n]);
    }

    /// Property: same padding rule for IPv6.
    #[test]
    fn prop_v6_prefix_padding(
        octets in proptest::array::uniform16(any::<u8>()),
        mask in 0u8..=128,
    ) {
        let n = prefix_octets(mask);
        let mut r = Reader::new(&octets[..n]);
        let decoded = r.read_v6_prefix(mask).unwrap();
        let bits = u128::from(decoded);
        if n < 16 {
            prop_assert_eq!(bits & (u128::MAX >> (n * 8)), 0);
        }
        prop_assert_eq!(&decoded.octets()[..n], &octets[..n]);
    }

    /// Property: prefix reads never touch octets beyond ⌈mask/8⌉.
    #[test]
    fn prop_prefix_read_consumes_exactly(
        octets in proptest::array::uniform16(any::<u8>()),
        mask in 0u8..=128,
    ) {
        let mut r = Reader::new(&octets);
        r.read_v6_prefix(mask).unwrap();
        prop_assert_eq!(r.remaining(), 16 - prefix_octets(mask));
    }
}

proptest! {
    /// Property: the NLRI decoder accepts any well-formed packed list and
    /// reproduces each mask.
    #[test]
    fn prop_v4_nlri_masks_round_trip(masks in proptest::collection::vec(0u8..=32, 0..16)) {
        let mut buf = Vec::new();
        for mask in &masks {
            buf.push(*mask);
            buf.extend(std::iter::repeat(0xabu8).take(prefix_octets(*mask)));
        }
        let mut r = Reader::new(&buf);
        let decoded = crate::nlri::decode_v4(&mut r, false).unwrap();
        let got: Vec<u8> = decoded.iter().map(|p| p.length).collect();
        prop_assert_eq!(got, masks);
    }
}
