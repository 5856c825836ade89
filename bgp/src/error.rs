// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use num_enum::TryFromPrimitiveError;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("too small: {0}")]
    TooSmall(String),

    #[error("too large: {0}")]
    TooLarge(String),

    #[error("no marker")]
    NoMarker,

    #[error("unexpected end of input")]
    Eom,

    #[error("bad version")]
    BadVersion,

    #[error("Message type error")]
    MessageType(#[from] TryFromPrimitiveError<crate::messages::MessageType>),

    #[error("Path origin error")]
    PathOrigin(#[from] TryFromPrimitiveError<crate::attributes::PathOrigin>),

    #[error("AS path type error")]
    AsPathType(#[from] TryFromPrimitiveError<crate::attributes::AsPathType>),

    #[error("malformed attribute: {0}")]
    MalformedAttribute(String),

    #[error("malformed nlri: {0}")]
    MalformedNlri(String),

    #[error("invalid router id: {0}")]
    InvalidRouterId(String),

    #[error("hold time too small")]
    HoldTimeTooSmall,

    #[error("hold timer expired")]
    HoldTimerExpired,

    #[error("disconnected")]
    Disconnected,

    #[error("io {0}")]
    Io(#[from] std::io::Error),
}
