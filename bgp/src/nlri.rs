// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Network layer reachability information: packed prefix lists as carried in
//! the UPDATE body and in MP_REACH_NLRI/MP_UNREACH_NLRI attributes. Whether a
//! 32-bit path identifier precedes each prefix depends on the ADD-PATH
//! negotiation for the family being decoded; callers pass that flag in
//! explicitly, derived once per session.

use crate::error::Error;
use crate::wire::Reader;
use std::fmt::{self, Display, Formatter};
use std::net::{Ipv4Addr, Ipv6Addr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prefix4 {
    pub value: Ipv4Addr,
    pub length: u8,

    /// RFC 7911 path identifier. Zero when ADD-PATH is not in effect.
    pub path_id: u32,
}

impl Prefix4 {
    pub fn new(value: Ipv4Addr, length: u8) -> Self {
        Self {
            value,
            length,
            path_id: 0,
        }
    }
}

impl Display for Prefix4 {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.value, self.length)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prefix6 {
    pub value: Ipv6Addr,
    pub length: u8,
    pub path_id: u32,
}

impl Prefix6 {
    pub fn new(value: Ipv6Addr, length: u8) -> Self {
        Self {
            value,
            length,
            path_id: 0,
        }
    }
}

impl Display for Prefix6 {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.value, self.length)
    }
}

/// Decode a packed IPv4 prefix list until the reader is drained.
pub fn decode_v4(
    r: &mut Reader,
    add_path: bool,
) -> Result<Vec<Prefix4>, Error> {
    let mut result = Vec::new();
    while !r.is_empty() {
        let path_id = if add_path {
            r.read_u32().map_err(short_nlri)?
        } else {
            0
        };
        let mask = r.read_u8().map_err(short_nlri)?;
        let value = r.read_v4_prefix(mask).map_err(short_nlri)?;
        result.push(Prefix4 {
            value,
            length: mask,
            path_id,
        });
    }
    Ok(result)
}

/// Decode a packed IPv6 prefix list until the reader is drained.
pub fn decode_v6(
    r: &mut Reader,
    add_path: bool,
) -> Result<Vec<Prefix6>, Error> {
    let mut result = Vec::new();
    while !r.is_empty() {
        let path_id = if add_path {
            r.read_u32().map_err(short_nlri)?
        } else {
            0
        };
        let mask = r.read_u8().map_err(short_nlri)?;
        let value = r.read_v6_prefix(mask).map_err(short_nlri)?;
        result.push(Prefix6 {
            value,
            length: mask,
            path_id,
        });
    }
    Ok(result)
}

fn short_nlri(e: Error) -> Error {
    match e {
        Error::Eom => Error::MalformedNlri("truncated prefix list".into()),
        e => e,
    }
}
