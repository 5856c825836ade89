// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::error::Error;

/// Hold time offered in our OPEN when nothing else is configured.
pub const DEFAULT_HOLD_TIME: u16 = 90;

#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// BGP identifier, from a dotted-quad configuration string.
    pub id: u32,

    /// Local autonomous system number.
    pub asn: u32,

    /// TCP listen port.
    pub port: u16,

    /// Hold time offered to peers, seconds.
    pub hold_time: u16,

    /// Suppress a family's update logging until its End-of-RIB arrives.
    pub log_after_eor: bool,
}

/// Parse a dotted-quad router id. Exactly four parts, each a decimal
/// integer that fits an octet.
pub fn parse_router_id(s: &str) -> Result<u32, Error> {
    let parts: Vec<&str> = s.split('.').collect();
    if parts.len() != 4 {
        return Err(Error::InvalidRouterId(format!(
            "{s}: expected four octets"
        )));
    }
    let mut id = [0u8; 4];
    for (i, part) in parts.iter().enumerate() {
        id[i] = part.parse::<u8>().map_err(|_| {
            Error::InvalidRouterId(format!(
                "{s}: {part:?} is not an 8-bit unsigned integer"
            ))
        })?;
    }
    Ok(u32::from_be_bytes(id))
}
