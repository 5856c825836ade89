// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The path-attribute stream of an UPDATE message.
//!
//! Each attribute is a TLV: a flags octet, a type-code octet, a one- or
//! two-octet length (the extended-length flag selects which), and a body of
//! exactly that many octets. The body is sliced into a bounded sub-reader;
//! a decoder that leaves residue behind marks the attribute malformed. One
//! [`PathAttribute`] variant exists per type code; decoding folds them into
//! the at-most-one-of-each [`PathAttributes`] bundle the session logs from.

use crate::capabilities::{AddressFamily, Negotiated};
use crate::error::Error;
use crate::nlri::{self, Prefix4, Prefix6};
use crate::wire::Reader;
use num_enum::TryFromPrimitive;
use slog::{debug, warn, Logger};
use std::fmt::{self, Display, Formatter};
use std::net::{Ipv4Addr, Ipv6Addr};

/// Attribute type codes retired by the IANA registry. Their bodies are
/// skipped without comment beyond a debug line.
pub const DEPRECATED_TYPE_CODES: [u8; 13] =
    [11, 12, 13, 19, 20, 21, 28, 30, 31, 129, 241, 242, 243];

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[repr(u8)]
pub enum PathAttributeFlags {
    Optional = 0b1000_0000,
    Transitive = 0b0100_0000,
    Partial = 0b0010_0000,
    ExtendedLength = 0b0001_0000,
}

#[derive(Debug, PartialEq, Eq, Copy, Clone, TryFromPrimitive)]
#[repr(u8)]
pub enum PathAttributeTypeCode {
    /// RFC 4271
    Origin = 1,
    AsPath = 2,
    NextHop = 3,
    MultiExitDisc = 4,
    LocalPref = 5,
    AtomicAggregate = 6,
    Aggregator = 7,

    /// RFC 1997
    Communities = 8,

    /// RFC 4456
    OriginatorId = 9,
    ClusterList = 10,

    /// RFC 4760
    MpReachNlri = 14,
    MpUnreachNlri = 15,

    /// RFC 4360
    ExtendedCommunities = 16,

    /// RFC 8092
    LargeCommunities = 32,
}

#[derive(Debug, PartialEq, Eq, Copy, Clone, TryFromPrimitive)]
#[repr(u8)]
pub enum PathOrigin {
    Igp = 0,
    Egp = 1,
    Incomplete = 2,
}

impl Display for PathOrigin {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Igp => write!(f, "IGP"),
            Self::Egp => write!(f, "EGP"),
            Self::Incomplete => write!(f, "INCOMPLETE"),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Copy, Clone, TryFromPrimitive)]
#[repr(u8)]
pub enum AsPathType {
    AsSet = 1,
    AsSequence = 2,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsPathSegment {
    pub typ: AsPathType,
    pub value: Vec<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Community {
    pub high: u16,
    pub low: u16,
}

impl Display for Community {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.high, self.low)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LargeCommunity {
    pub admin: u32,
    pub high: u32,
    pub low: u32,
}

impl Display for LargeCommunity {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}:{}:{}", self.admin, self.high, self.low)
    }
}

/// An 8-octet extended community carried opaquely. Structured sub-type
/// interpretation is not attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtCommunity(pub u64);

impl Display for ExtCommunity {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aggregator {
    pub asn: u32,
    pub id: Ipv4Addr,
}

/// NLRI carried inside an MP attribute, tagged by what the family turned
/// out to be. Families without NLRI handling leave only the tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MpNlri {
    V4(Vec<Prefix4>),
    V6(Vec<Prefix6>),
    Unsupported,
}

impl MpNlri {
    pub fn len(&self) -> usize {
        match self {
            Self::V4(v) => v.len(),
            Self::V6(v) => v.len(),
            Self::Unsupported => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MpReachNlri {
    pub family: AddressFamily,

    /// One global next-hop, or a global (possibly `::`) followed by a
    /// link-local.
    pub next_hops: Vec<Ipv6Addr>,

    pub nlri: MpNlri,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MpUnreachNlri {
    pub family: AddressFamily,
    pub nlri: MpNlri,

    /// A body holding nothing but the family is the End-of-RIB marker for
    /// that family.
    pub end_of_rib: bool,
}

/// One decoded path attribute. The observer only inspects these, so owned
/// values are enough; nothing refers back into the wire buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathAttribute {
    Origin(PathOrigin),
    AsPath(Vec<AsPathSegment>),
    NextHop(Ipv4Addr),
    MultiExitDisc(u32),
    LocalPref(u32),
    AtomicAggregate,
    Aggregator(Aggregator),
    Communities(Vec<Community>),
    OriginatorId(Ipv4Addr),
    ClusterList(Vec<Ipv4Addr>),
    MpReachNlri(MpReachNlri),
    MpUnreachNlri(MpUnreachNlri),
    ExtendedCommunities(Vec<ExtCommunity>),
    LargeCommunities(Vec<LargeCommunity>),
}

impl PathAttribute {
    fn decode(
        tc: PathAttributeTypeCode,
        r: &mut Reader,
        caps: &Negotiated,
        log: &Logger,
    ) -> Result<PathAttribute, Error> {
        use PathAttributeTypeCode as Tc;
        let attr = match tc {
            Tc::Origin => {
                PathAttribute::Origin(PathOrigin::try_from(r.read_u8()?)?)
            }
            Tc::AsPath => PathAttribute::AsPath(decode_as_path(r)?),
            Tc::NextHop => PathAttribute::NextHop(r.read_ipv4()?),
            Tc::MultiExitDisc => PathAttribute::MultiExitDisc(r.read_u32()?),
            Tc::LocalPref => PathAttribute::LocalPref(r.read_u32()?),
            Tc::AtomicAggregate => PathAttribute::AtomicAggregate,
            Tc::Aggregator => PathAttribute::Aggregator(Aggregator {
                asn: r.read_u32()?,
                id: r.read_ipv4()?,
            }),
            Tc::Communities => {
                let mut communities = Vec::with_capacity(r.remaining() / 4);
                while !r.is_empty() {
                    communities.push(Community {
                        high: r.read_u16()?,
                        low: r.read_u16()?,
                    });
                }
                PathAttribute::Communities(communities)
            }
            Tc::OriginatorId => PathAttribute::OriginatorId(r.read_ipv4()?),
            Tc::ClusterList => {
                let mut ids = Vec::with_capacity(r.remaining() / 4);
                while !r.is_empty() {
                    ids.push(r.read_ipv4()?);
                }
                PathAttribute::ClusterList(ids)
            }
            Tc::MpReachNlri => {
                PathAttribute::MpReachNlri(decode_mp_reach(r, caps, log)?)
            }
            Tc::MpUnreachNlri => {
                PathAttribute::MpUnreachNlri(decode_mp_unreach(r, caps, log)?)
            }
            Tc::ExtendedCommunities => {
                let mut communities = Vec::with_capacity(r.remaining() / 8);
                while !r.is_empty() {
                    communities.push(ExtCommunity(r.read_u64()?));
                }
                PathAttribute::ExtendedCommunities(communities)
            }
            Tc::LargeCommunities => {
                let mut communities = Vec::with_capacity(r.remaining() / 12);
                while !r.is_empty() {
                    communities.push(LargeCommunity {
                        admin: r.read_u32()?,
                        high: r.read_u32()?,
                        low: r.read_u32()?,
                    });
                }
                PathAttribute::LargeCommunities(communities)
            }
        };
        Ok(attr)
    }
}

/// Segments repeat until the body is drained; a path may hold any number of
/// them, typically one sequence optionally followed by one set. An empty
/// body is a valid (iBGP) path.
fn decode_as_path(r: &mut Reader) -> Result<Vec<AsPathSegment>, Error> {
    let mut segments = Vec::new();
    while !r.is_empty() {
        let typ = AsPathType::try_from(r.read_u8()?)?;
        let count = usize::from(r.read_u8()?);
        let mut value = Vec::with_capacity(count);
        for _ in 0..count {
            value.push(r.read_u32()?);
        }
        segments.push(AsPathSegment { typ, value });
    }
    Ok(segments)
}

/// MP_REACH_NLRI: AFI(2) SAFI(1) NhLen(1) NextHop(NhLen) SNPA(1, ignored)
/// NLRI(rest). A 16-octet next-hop is one global address; 32 octets are a
/// global (which may be `::`) followed by a link-local.
fn decode_mp_reach(
    r: &mut Reader,
    caps: &Negotiated,
    log: &Logger,
) -> Result<MpReachNlri, Error> {
    let afi = r.read_u16()?;
    let safi = r.read_u8()?;
    let family = AddressFamily { afi, safi };

    let nh_len = r.read_u8()?;
    let mut next_hops = Vec::with_capacity(2);
    match nh_len {
        16 => next_hops.push(r.read_ipv6()?),
        32 => {
            next_hops.push(r.read_ipv6()?);
            next_hops.push(r.read_ipv6()?);
        }
        n => {
            return Err(Error::MalformedAttribute(format!(
                "mp_reach next-hop length {n}"
            )));
        }
    }

    let _snpa_count = r.read_u8()?;

    let nlri = decode_mp_nlri(r, family, caps, log)?;
    Ok(MpReachNlri {
        family,
        next_hops,
        nlri,
    })
}

/// MP_UNREACH_NLRI: AFI(2) SAFI(1) then withdrawn NLRI. A three-octet body
/// carries only the family and is that family's End-of-RIB.
fn decode_mp_unreach(
    r: &mut Reader,
    caps: &Negotiated,
    log: &Logger,
) -> Result<MpUnreachNlri, Error> {
    let end_of_rib = r.remaining() == 3;
    let afi = r.read_u16()?;
    let safi = r.read_u8()?;
    let family = AddressFamily { afi, safi };
    let nlri = if end_of_rib {
        match family {
            AddressFamily { afi: 1, .. } => MpNlri::V4(Vec::new()),
            _ => MpNlri::V6(Vec::new()),
        }
    } else {
        decode_mp_nlri(r, family, caps, log)?
    };
    Ok(MpUnreachNlri {
        family,
        nlri,
        end_of_rib,
    })
}

fn decode_mp_nlri(
    r: &mut Reader,
    family: AddressFamily,
    caps: &Negotiated,
    log: &Logger,
) -> Result<MpNlri, Error> {
    if family.is_ipv4_unicast() {
        Ok(MpNlri::V4(nlri::decode_v4(r, caps.v4_add_path)?))
    } else if family.is_ipv6_unicast() {
        Ok(MpNlri::V6(nlri::decode_v6(r, caps.v6_add_path)?))
    } else {
        warn!(log, "no nlri handling for {family}, skipping");
        r.take(r.remaining())?;
        Ok(MpNlri::Unsupported)
    }
}

/// The attribute bundle of one UPDATE: at most one of each attribute.
/// Duplicates keep the last occurrence.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PathAttributes {
    pub origin: Option<PathOrigin>,
    pub as_path: Vec<AsPathSegment>,
    pub next_hop: Option<Ipv4Addr>,
    pub med: Option<u32>,
    pub local_pref: Option<u32>,
    pub atomic_aggregate: bool,
    pub aggregator: Option<Aggregator>,
    pub originator_id: Option<Ipv4Addr>,
    pub cluster_list: Vec<Ipv4Addr>,
    pub communities: Vec<Community>,
    pub large_communities: Vec<LargeCommunity>,
    pub extended_communities: Vec<ExtCommunity>,
    pub mp_reach: Option<MpReachNlri>,
    pub mp_unreach: Option<MpUnreachNlri>,
}

impl PathAttributes {
    pub fn is_empty(&self) -> bool {
        *self == PathAttributes::default()
    }

    fn insert(&mut self, attr: PathAttribute) {
        match attr {
            PathAttribute::Origin(v) => self.origin = Some(v),
            PathAttribute::AsPath(v) => self.as_path = v,
            PathAttribute::NextHop(v) => self.next_hop = Some(v),
            PathAttribute::MultiExitDisc(v) => self.med = Some(v),
            PathAttribute::LocalPref(v) => self.local_pref = Some(v),
            PathAttribute::AtomicAggregate => self.atomic_aggregate = true,
            PathAttribute::Aggregator(v) => self.aggregator = Some(v),
            PathAttribute::Communities(v) => self.communities = v,
            PathAttribute::OriginatorId(v) => self.originator_id = Some(v),
            PathAttribute::ClusterList(v) => self.cluster_list = v,
            PathAttribute::MpReachNlri(v) => self.mp_reach = Some(v),
            PathAttribute::MpUnreachNlri(v) => self.mp_unreach = Some(v),
            PathAttribute::ExtendedCommunities(v) => {
                self.extended_communities = v
            }
            PathAttribute::LargeCommunities(v) => self.large_communities = v,
        }
    }
}

/// Walk the attribute section of an UPDATE until the reader is drained.
/// Unknown and deprecated type codes are skipped by their declared length;
/// a known attribute that does not consume its body exactly is malformed.
pub fn decode_path_attributes(
    r: &mut Reader,
    caps: &Negotiated,
    log: &Logger,
) -> Result<PathAttributes, Error> {
    let mut attrs = PathAttributes::default();
    while !r.is_empty() {
        let flags = r.read_u8()?;
        let code = r.read_u8()?;
        let len = if flags & PathAttributeFlags::ExtendedLength as u8 != 0 {
            usize::from(r.read_u16()?)
        } else {
            usize::from(r.read_u8()?)
        };
        let mut body = r.sub_reader(len).map_err(|_| {
            Error::MalformedAttribute(format!(
                "attribute {code} overruns section"
            ))
        })?;

        let tc = match PathAttributeTypeCode::try_from(code) {
            Ok(tc) => tc,
            Err(_) => {
                if DEPRECATED_TYPE_CODES.contains(&code) {
                    debug!(log, "discarding deprecated attribute {code}");
                } else {
                    warn!(log, "unknown attribute type code {code}");
                }
                continue;
            }
        };

        let attr =
            PathAttribute::decode(tc, &mut body, caps, log).map_err(|e| {
                match e {
                    Error::Eom => Error::MalformedAttribute(format!(
                        "truncated {tc:?}"
                    )),
                    e => e,
                }
            })?;
        if !body.is_empty() {
            return Err(Error::MalformedAttribute(format!(
                "{tc:?} left {} residual octets",
                body.remaining()
            )));
        }
        attrs.insert(attr);
    }
    Ok(attrs)
}

/// Sequence ASNs lead, space separated; any set ASNs follow inside one
/// trailing pair of braces.
pub fn format_as_path(segments: &[AsPathSegment]) -> String {
    let mut sequence = Vec::new();
    let mut set = Vec::new();
    for segment in segments {
        match segment.typ {
            AsPathType::AsSequence => sequence.extend(&segment.value),
            AsPathType::AsSet => set.extend(&segment.value),
        }
    }

    let mut out = sequence
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(" ");
    if !set.is_empty() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str("{ ");
        out.push_str(
            &set.iter().map(u32::to_string).collect::<Vec<_>>().join(" "),
        );
        out.push_str(" }");
    }
    out
}

pub fn format_communities(communities: &[Community]) -> String {
    communities
        .iter()
        .map(Community::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn format_large_communities(communities: &[LargeCommunity]) -> String {
    communities
        .iter()
        .map(LargeCommunity::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn format_cluster_list(ids: &[Ipv4Addr]) -> String {
    ids.iter()
        .map(Ipv4Addr::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn test_log() -> Logger {
        Logger::root(slog::Discard, slog::o!())
    }

    fn decode(buf: &[u8], caps: &Negotiated) -> PathAttributes {
        let mut r = Reader::new(buf);
        decode_path_attributes(&mut r, caps, &test_log()).unwrap()
    }

    #[test]
    fn as_path_sequence() {
        let buf = [
            0x02, 0x02, 0x00, 0x00, 0x90, 0xec, 0x00, 0x00, 0x19, 0x35,
        ];
        let mut r = Reader::new(&buf);
        let got = decode_as_path(&mut r).unwrap();
        assert_eq!(
            got,
            vec![AsPathSegment {
                typ: AsPathType::AsSequence,
                value: vec![37100, 6453],
            }]
        );
        assert_eq!(format_as_path(&got), "37100 6453");
    }

    #[test]
    fn as_path_set() {
        let buf = [
            0x01, 0x02, 0x00, 0x00, 0xcc, 0x8f, 0x00, 0x04, 0x06, 0x2e,
        ];
        let mut r = Reader::new(&buf);
        let got = decode_as_path(&mut r).unwrap();
        assert_eq!(
            got,
            vec![AsPathSegment {
                typ: AsPathType::AsSet,
                value: vec![52367, 263726],
            }]
        );
        assert_eq!(format_as_path(&got), "{ 52367 263726 }");
    }

    #[test]
    fn as_path_many_segments() {
        // Three segments in one attribute body.
        let buf = [
            0x02, 0x01, 0x00, 0x00, 0x00, 0x7b, // seq 123
            0x02, 0x01, 0x00, 0x01, 0x81, 0xcd, // seq 98765
            0x01, 0x01, 0x00, 0x00, 0x01, 0x59, // set 345
        ];
        let mut r = Reader::new(&buf);
        let got = decode_as_path(&mut r).unwrap();
        assert_eq!(got.len(), 3);
        assert_eq!(format_as_path(&got), "123 98765 { 345 }");
    }

    #[test]
    fn as_path_empty_is_ibgp() {
        let mut r = Reader::new(&[]);
        assert_eq!(decode_as_path(&mut r).unwrap(), vec![]);
    }

    #[test]
    fn as_path_formatting() {
        let seq = |value: Vec<u32>| AsPathSegment {
            typ: AsPathType::AsSequence,
            value,
        };
        let set = |value: Vec<u32>| AsPathSegment {
            typ: AsPathType::AsSet,
            value,
        };
        assert_eq!(format_as_path(&[]), "");
        assert_eq!(format_as_path(&[seq(vec![98765])]), "98765");
        assert_eq!(format_as_path(&[seq(vec![98765, 123])]), "98765 123");
        assert_eq!(
            format_as_path(&[seq(vec![98765, 123]), set(vec![345])]),
            "98765 123 { 345 }"
        );
        assert_eq!(
            format_as_path(&[seq(vec![98765, 123]), set(vec![345, 153489])]),
            "98765 123 { 345 153489 }"
        );
        assert_eq!(
            format_as_path(&[set(vec![345, 153489])]),
            "{ 345 153489 }"
        );
    }

    #[test]
    fn communities() {
        let buf = [
            0xc0, 0x08, 0x10, 0x04, 0xf9, 0x35, 0x86, 0x13, 0xe5, 0x00,
            0xc3, 0x13, 0xe5, 0x00, 0xc9, 0xe0, 0xd3, 0x00, 0x00,
        ];
        let got = decode(&buf, &Negotiated::default());
        assert_eq!(
            got.communities,
            vec![
                Community { high: 1273, low: 13702 },
                Community { high: 5093, low: 195 },
                Community { high: 5093, low: 201 },
                Community { high: 57555, low: 0 },
            ]
        );
        assert_eq!(
            format_communities(&got.communities),
            "1273:13702 5093:195 5093:201 57555:0"
        );
    }

    #[test]
    fn large_communities() {
        let buf = [
            0xc0, 0x20, 0x18, 0x00, 0x00, 0xdf, 0xf7, 0x00, 0x00, 0x00,
            0x01, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0xdf, 0xf7, 0x00,
            0x00, 0x00, 0x01, 0x00, 0x00, 0x0b, 0xce,
        ];
        let got = decode(&buf, &Negotiated::default());
        assert_eq!(
            got.large_communities,
            vec![
                LargeCommunity { admin: 57335, high: 1, low: 1 },
                LargeCommunity { admin: 57335, high: 1, low: 3022 },
            ]
        );
        assert_eq!(
            format_large_communities(&got.large_communities),
            "57335:1:1 57335:1:3022"
        );
    }

    #[test]
    fn community_formatting() {
        assert_eq!(format_communities(&[]), "");
        assert_eq!(
            format_communities(&[Community { high: 64500, low: 12345 }]),
            "64500:12345"
        );
        assert_eq!(
            format_communities(&[
                Community { high: 64500, low: 12345 },
                Community { high: 64501, low: 456 },
            ]),
            "64500:12345 64501:456"
        );
        assert_eq!(
            format_large_communities(&[LargeCommunity {
                admin: 321654987,
                high: 64501,
                low: 0,
            }]),
            "321654987:64501:0"
        );
    }

    #[test]
    fn aggregator() {
        let buf = [
            0xc0, 0x07, 0x08, 0x00, 0x00, 0x30, 0xa7, 0x3e, 0x18, 0x60,
            0xa0,
        ];
        let got = decode(&buf, &Negotiated::default());
        assert_eq!(
            got.aggregator,
            Some(Aggregator {
                asn: 12455,
                id: Ipv4Addr::new(62, 24, 96, 160),
            })
        );
    }

    #[test]
    fn cluster_list() {
        let buf = [
            0x80, 0x0a, 0x08, 0x0a, 0x01, 0x01, 0x01, 0x0a, 0x01, 0x02,
            0x03,
        ];
        let got = decode(&buf, &Negotiated::default());
        assert_eq!(
            got.cluster_list,
            vec![Ipv4Addr::new(10, 1, 1, 1), Ipv4Addr::new(10, 1, 2, 3)]
        );
        assert_eq!(
            format_cluster_list(&got.cluster_list),
            "10.1.1.1, 10.1.2.3"
        );
    }

    #[test]
    fn mp_reach_dual_next_hop() {
        let buf = [
            0x00, 0x02, 0x01, 0x20, 0x20, 0x01, 0x0d, 0xb8, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02,
            0xfe, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xc0, 0x02,
            0x0b, 0xff, 0xfe, 0x7e, 0x00, 0x00, 0x00, 0x40, 0x20, 0x01,
            0x0d, 0xb8, 0x00, 0x02, 0x00, 0x02, 0x40, 0x20, 0x01, 0x0d,
            0xb8, 0x00, 0x02, 0x00, 0x01, 0x40, 0x20, 0x01, 0x0d, 0xb8,
            0x00, 0x02, 0x00, 0x00,
        ];
        let mut r = Reader::new(&buf);
        let got =
            decode_mp_reach(&mut r, &Negotiated::default(), &test_log())
                .unwrap();
        assert_eq!(got.family, AddressFamily::IPV6_UNICAST);
        assert_eq!(
            got.next_hops,
            vec![
                "2001:db8::2".parse::<Ipv6Addr>().unwrap(),
                "fe80::c002:bff:fe7e:0".parse::<Ipv6Addr>().unwrap(),
            ]
        );
        assert_eq!(
            got.nlri,
            MpNlri::V6(vec![
                Prefix6::new("2001:db8:2:2::".parse().unwrap(), 64),
                Prefix6::new("2001:db8:2:1::".parse().unwrap(), 64),
                Prefix6::new("2001:db8:2::".parse().unwrap(), 64),
            ])
        );
    }

    #[test]
    fn mp_reach_link_local_only_next_hop() {
        // A link-local advertised next-hop shows up as :: followed by the
        // link-local address.
        let buf = [
            0x00, 0x02, 0x01, 0x20, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0xfe, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0a, 0x00,
            0x27, 0xff, 0xfe, 0x3b, 0xbe, 0x83, 0x00, 0x38, 0x20, 0x01,
            0x0a, 0x09, 0x98, 0x76, 0x54,
        ];
        let mut r = Reader::new(&buf);
        let got =
            decode_mp_reach(&mut r, &Negotiated::default(), &test_log())
                .unwrap();
        assert_eq!(
            got.next_hops,
            vec![
                Ipv6Addr::UNSPECIFIED,
                "fe80::a00:27ff:fe3b:be83".parse::<Ipv6Addr>().unwrap(),
            ]
        );
        assert_eq!(
            got.nlri,
            MpNlri::V6(vec![Prefix6::new(
                "2001:a09:9876:5400::".parse().unwrap(),
                56
            )])
        );
    }

    #[test]
    fn mp_reach_bad_next_hop_length() {
        let buf = [0x00, 0x02, 0x01, 0x04, 0x0a, 0x00, 0x00, 0x01];
        let mut r = Reader::new(&buf);
        assert!(matches!(
            decode_mp_reach(&mut r, &Negotiated::default(), &test_log()),
            Err(Error::MalformedAttribute(_))
        ));
    }

    #[test]
    fn mp_unreach_end_of_rib() {
        let buf = [0x00, 0x02, 0x01];
        let mut r = Reader::new(&buf);
        let got =
            decode_mp_unreach(&mut r, &Negotiated::default(), &test_log())
                .unwrap();
        assert_eq!(got.family, AddressFamily::IPV6_UNICAST);
        assert!(got.end_of_rib);
        assert!(got.nlri.is_empty());
    }

    #[test]
    fn mp_unreach_withdraws() {
        let buf = [
            0x00, 0x02, 0x01, 0x40, 0x20, 0x01, 0x0d, 0xb8, 0x00, 0x02,
            0x00, 0x02,
        ];
        let mut r = Reader::new(&buf);
        let got =
            decode_mp_unreach(&mut r, &Negotiated::default(), &test_log())
                .unwrap();
        assert!(!got.end_of_rib);
        assert_eq!(
            got.nlri,
            MpNlri::V6(vec![Prefix6::new(
                "2001:db8:2:2::".parse().unwrap(),
                64
            )])
        );
    }

    #[test]
    fn ipv6_update_attribute_blob() {
        // MP_REACH (extended length) with :: + link-local next-hops and one
        // /56, then origin IGP, empty AS path, local-pref 100, and two
        // large communities.
        let buf = [
            0x90, 0x0e, 0x00, 0x2d, 0x00, 0x02, 0x01, 0x20, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0xfe, 0x80, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x0a, 0x00, 0x27, 0xff, 0xfe, 0x3b, 0xbe, 0x83,
            0x00, 0x38, 0x20, 0x01, 0x0a, 0x09, 0x98, 0x76, 0x54, 0x40,
            0x01, 0x01, 0x00, 0x40, 0x02, 0x00, 0x40, 0x05, 0x04, 0x00,
            0x00, 0x00, 0x64, 0xc0, 0x20, 0x18, 0x00, 0x00, 0x00, 0x0a,
            0x00, 0x00, 0x00, 0x14, 0x00, 0x00, 0x00, 0x1e, 0x00, 0x00,
            0x00, 0x0a, 0x00, 0x00, 0x00, 0x3c, 0x00, 0x00, 0x00, 0x0a,
        ];
        let got = decode(&buf, &Negotiated::default());
        assert_eq!(got.origin, Some(PathOrigin::Igp));
        assert_eq!(got.as_path, vec![]);
        assert_eq!(got.local_pref, Some(100));
        assert_eq!(
            got.large_communities,
            vec![
                LargeCommunity { admin: 10, high: 20, low: 30 },
                LargeCommunity { admin: 10, high: 60, low: 10 },
            ]
        );
        let mp = got.mp_reach.unwrap();
        assert_eq!(
            mp.next_hops,
            vec![
                Ipv6Addr::UNSPECIFIED,
                "fe80::a00:27ff:fe3b:be83".parse::<Ipv6Addr>().unwrap(),
            ]
        );
        assert_eq!(
            mp.nlri,
            MpNlri::V6(vec![Prefix6::new(
                "2001:a09:9876:5400::".parse().unwrap(),
                56
            )])
        );
    }

    #[test]
    fn ipv4_update_attribute_blob() {
        // Origin, one-hop AS path, next-hop, MED, local-pref, one
        // community.
        let buf = [
            0x40, 0x01, 0x01, 0x00, 0x40, 0x02, 0x06, 0x02, 0x01, 0x00,
            0x00, 0x00, 0x7b, 0x40, 0x03, 0x04, 0x0a, 0x14, 0x1e, 0x31,
            0x80, 0x04, 0x04, 0x00, 0x00, 0x00, 0x64, 0x40, 0x05, 0x04,
            0x00, 0x00, 0x00, 0x64, 0xc0, 0x08, 0x04, 0xfd, 0xe8, 0x02,
            0x9a,
        ];
        let got = decode(&buf, &Negotiated::default());
        assert_eq!(got.origin, Some(PathOrigin::Igp));
        assert_eq!(
            got.as_path,
            vec![AsPathSegment {
                typ: AsPathType::AsSequence,
                value: vec![123],
            }]
        );
        assert_eq!(got.next_hop, Some(Ipv4Addr::new(10, 20, 30, 49)));
        assert_eq!(got.med, Some(100));
        assert_eq!(got.local_pref, Some(100));
        assert_eq!(
            got.communities,
            vec![Community { high: 65000, low: 666 }]
        );
    }

    #[test]
    fn unknown_attribute_is_skipped() {
        // Type code 99 is nothing we know; the MED after it must still
        // decode.
        let buf = [
            0xc0, 0x63, 0x02, 0xaa, 0xbb, // unknown
            0x80, 0x04, 0x04, 0x00, 0x00, 0x00, 0x64, // med 100
        ];
        let got = decode(&buf, &Negotiated::default());
        assert_eq!(got.med, Some(100));
    }

    #[test]
    fn deprecated_attribute_is_skipped() {
        // DPA (type 11) is deprecated.
        let buf = [
            0xc0, 0x0b, 0x06, 0x00, 0x00, 0x00, 0x01, 0x00, 0x02, // dpa
            0x40, 0x01, 0x01, 0x02, // origin incomplete
        ];
        let got = decode(&buf, &Negotiated::default());
        assert_eq!(got.origin, Some(PathOrigin::Incomplete));
    }

    #[test]
    fn residual_body_is_malformed() {
        // Origin declares two octets but the value is one.
        let buf = [0x40, 0x01, 0x02, 0x00, 0x00];
        let mut r = Reader::new(&buf);
        assert!(matches!(
            decode_path_attributes(
                &mut r,
                &Negotiated::default(),
                &test_log()
            ),
            Err(Error::MalformedAttribute(_))
        ));
    }

    #[test]
    fn truncated_attribute_is_malformed() {
        // MED declares four octets, two present.
        let buf = [0x80, 0x04, 0x04, 0x00, 0x00];
        let mut r = Reader::new(&buf);
        assert!(matches!(
            decode_path_attributes(
                &mut r,
                &Negotiated::default(),
                &test_log()
            ),
            Err(Error::MalformedAttribute(_))
        ));
    }

    #[test]
    fn extended_communities_are_opaque() {
        let buf = [
            0xc0, 0x10, 0x08, 0x00, 0x02, 0xfc, 0x00, 0x00, 0x00, 0x00,
            0x2a,
        ];
        let got = decode(&buf, &Negotiated::default());
        assert_eq!(
            got.extended_communities,
            vec![ExtCommunity(0x0002fc000000002a)]
        );
        assert_eq!(
            got.extended_communities[0].to_string(),
            "0x0002fc000000002a"
        );
    }
}
