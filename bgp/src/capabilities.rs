// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! OPEN optional parameters and the capabilities they carry.
//!
//! Decoding walks the (type, length, value) parameter sequence of a peer's
//! OPEN; only the Capabilities parameter (type 2) is recognised, and each of
//! its values may hold one or more capability triplets depending on how the
//! sender packs them. The result is a [`Parameters`] record. Encoding goes
//! the other way: given the peer's record, build the single Capabilities
//! parameter for our reply OPEN, reflecting only what both sides can do.

use crate::error::Error;
use crate::wire::Reader;
use num_enum::TryFromPrimitive;
use slog::{debug, warn, Logger};
use std::fmt::{self, Display, Formatter};

/// Optional parameter type carrying capabilities. RFC 5492 §4.
pub const OPT_PARAM_CAPABILITIES: u8 = 2;

/// Capability codes this speaker acts on. Everything else is recorded as
/// unsupported and skipped by its declared length.
///
/// Ref: IANA capability-codes registry
#[derive(Debug, Eq, PartialEq, Copy, Clone, TryFromPrimitive)]
#[repr(u8)]
pub enum CapabilityCode {
    /// RFC 2858
    MultiprotocolExtensions = 1,

    /// RFC 2918. Decoded but counted as unsupported; only the enhanced
    /// variant is answered.
    RouteRefresh = 2,

    /// RFC 4724
    GracefulRestart = 64,

    /// RFC 6793
    FourOctetAs = 65,

    /// RFC 7911
    AddPath = 69,

    /// RFC 7313
    EnhancedRouteRefresh = 70,

    /// RFC 8810 (deprecated Cisco pre-standard refresh)
    PrestandardRouteRefresh = 128,
}

/// An (AFI, SAFI) pair. Anything may appear in a capability; only
/// IPv4/Unicast and IPv6/Unicast get NLRI handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressFamily {
    pub afi: u16,
    pub safi: u8,
}

impl AddressFamily {
    pub const IPV4_UNICAST: AddressFamily = AddressFamily { afi: 1, safi: 1 };
    pub const IPV6_UNICAST: AddressFamily = AddressFamily { afi: 2, safi: 1 };

    pub fn is_ipv4_unicast(&self) -> bool {
        *self == Self::IPV4_UNICAST
    }

    pub fn is_ipv6_unicast(&self) -> bool {
        *self == Self::IPV6_UNICAST
    }

    pub fn recognised(&self) -> bool {
        self.is_ipv4_unicast() || self.is_ipv6_unicast()
    }
}

impl Display for AddressFamily {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match *self {
            Self::IPV4_UNICAST => write!(f, "ipv4-unicast"),
            Self::IPV6_UNICAST => write!(f, "ipv6-unicast"),
            Self { afi, safi } => write!(f, "afi {afi} safi {safi}"),
        }
    }
}

/// Everything learned from a peer's OPEN optional parameters.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Parameters {
    /// 4-octet ASN from capability 65. Zero means the peer sent none.
    pub asn32: u32,

    /// Peer advertised enhanced route refresh (code 70).
    pub refresh: bool,

    /// Unicast address families from MP-BGP capabilities (code 1).
    pub addr_families: Vec<AddressFamily>,

    /// Families the peer may send multiple paths for: ADD-PATH entries
    /// (code 69) advertising Send (2) or Send/Receive (3).
    pub add_path_families: Vec<AddressFamily>,

    /// Capability codes acted on, in order of appearance.
    pub supported: Vec<u8>,

    /// Capability codes recorded but not acted on, in order of appearance.
    pub unsupported: Vec<u8>,
}

impl Parameters {
    /// Decode the optional-parameters block of an OPEN message.
    pub fn from_wire(buf: &[u8], log: &Logger) -> Result<Parameters, Error> {
        let mut r = Reader::new(buf);
        let mut p = Parameters::default();
        while !r.is_empty() {
            let typ = r.read_u8()?;
            let len = usize::from(r.read_u8()?);
            let mut body = r.sub_reader(len).map_err(|_| {
                Error::TooSmall(format!(
                    "optional parameter {typ} overruns block"
                ))
            })?;
            if typ == OPT_PARAM_CAPABILITIES {
                Self::decode_capabilities(&mut body, &mut p, log)?;
            } else {
                warn!(log, "ignoring optional parameter type {typ}");
            }
        }
        Ok(p)
    }

    /// One Capabilities parameter value: one or more (code, length, value)
    /// triplets. Vendors differ on whether each capability gets its own
    /// parameter or they share one.
    fn decode_capabilities(
        r: &mut Reader,
        p: &mut Parameters,
        log: &Logger,
    ) -> Result<(), Error> {
        while !r.is_empty() {
            let code = r.read_u8()?;
            let len = usize::from(r.read_u8()?);
            let mut body = r.sub_reader(len).map_err(|_| {
                Error::TooSmall(format!("capability {code} overruns value"))
            })?;
            match CapabilityCode::try_from(code) {
                Ok(CapabilityCode::MultiprotocolExtensions) => {
                    let afi = body.read_u16()?;
                    let _reserved = body.read_u8()?;
                    let safi = body.read_u8()?;
                    let family = AddressFamily { afi, safi };
                    debug!(log, "peer advertised mp-bgp {family}");
                    p.addr_families.push(family);
                    p.supported.push(code);
                }
                Ok(CapabilityCode::FourOctetAs) => {
                    // An empty value means the peer sent no ASN.
                    if len == 4 {
                        p.asn32 = body.read_u32()?;
                        debug!(log, "peer advertised 4-octet asn {}", p.asn32);
                    }
                    p.supported.push(code);
                }
                Ok(CapabilityCode::EnhancedRouteRefresh) => {
                    debug!(log, "peer advertised enhanced route refresh");
                    p.refresh = true;
                    p.supported.push(code);
                }
                Ok(CapabilityCode::AddPath) => {
                    let mut send_capable = false;
                    while !body.is_empty() {
                        let afi = body.read_u16()?;
                        let safi = body.read_u8()?;
                        let send_receive = body.read_u8()?;
                        // 2 = peer sends, 3 = peer sends and receives.
                        if send_receive == 2 || send_receive == 3 {
                            p.add_path_families
                                .push(AddressFamily { afi, safi });
                            send_capable = true;
                        }
                    }
                    if send_capable {
                        p.supported.push(code);
                    } else {
                        debug!(
                            log,
                            "peer add-path is receive-only, not negotiated"
                        );
                    }
                }
                _ => {
                    debug!(log, "capability code {code} is unsupported");
                    p.unsupported.push(code);
                }
            }
        }
        Ok(())
    }

    /// Encode the reply capability set as one Capabilities optional
    /// parameter: enhanced refresh, a 4-octet ASN (the peer's echoed back,
    /// or our wire ASN zero-extended), MP-BGP for each recognised family the
    /// peer advertised, and receive-only ADD-PATH for each family the peer
    /// can send multiple paths for. Deterministic for a given input.
    pub fn reply_to_wire(&self, wire_asn: u16) -> Vec<u8> {
        let mut caps = vec![CapabilityCode::EnhancedRouteRefresh as u8, 0];

        caps.extend_from_slice(&[CapabilityCode::FourOctetAs as u8, 4]);
        if self.asn32 != 0 {
            caps.extend_from_slice(&self.asn32.to_be_bytes());
        } else {
            caps.extend_from_slice(&[0, 0]);
            caps.extend_from_slice(&wire_asn.to_be_bytes());
        }

        for family in &self.addr_families {
            if !family.recognised() {
                continue;
            }
            caps.extend_from_slice(&[
                CapabilityCode::MultiprotocolExtensions as u8,
                4,
            ]);
            caps.extend_from_slice(&family.afi.to_be_bytes());
            caps.extend_from_slice(&[0, family.safi]);
        }

        for family in &self.add_path_families {
            caps.extend_from_slice(&[CapabilityCode::AddPath as u8, 4]);
            caps.extend_from_slice(&family.afi.to_be_bytes());
            // Receive only: we accept multiple paths, we send none.
            caps.extend_from_slice(&[family.safi, 1]);
        }

        let mut buf = vec![OPT_PARAM_CAPABILITIES, caps.len() as u8];
        buf.extend_from_slice(&caps);
        buf
    }
}

/// The capability set a session actually runs with, derived once from the
/// peer's [`Parameters`] when the OPEN exchange completes.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Negotiated {
    /// Min of the peer's offered hold time and ours. Zero disables the hold
    /// timer and keepalives.
    pub hold_time: u16,

    /// Peer's 4-octet ASN, zero if it sent none.
    pub asn32: u32,

    pub refresh: bool,
    pub v4_unicast: bool,
    pub v6_unicast: bool,

    /// ADD-PATH receive is in effect for the family: the peer prepends a
    /// path identifier to each NLRI it sends us.
    pub v4_add_path: bool,
    pub v6_add_path: bool,
}

impl Negotiated {
    pub fn new(p: &Parameters, hold_time: u16) -> Self {
        Self {
            hold_time,
            asn32: p.asn32,
            refresh: p.refresh,
            v4_unicast: p
                .addr_families
                .iter()
                .any(AddressFamily::is_ipv4_unicast),
            v6_unicast: p
                .addr_families
                .iter()
                .any(AddressFamily::is_ipv6_unicast),
            v4_add_path: p
                .add_path_families
                .iter()
                .any(AddressFamily::is_ipv4_unicast),
            v6_add_path: p
                .add_path_families
                .iter()
                .any(AddressFamily::is_ipv6_unicast),
        }
    }
}
