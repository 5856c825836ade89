// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::attributes::{self, PathAttributes};
use crate::capabilities::{Negotiated, Parameters};
use crate::error::Error;
use crate::nlri::{self, Prefix4};
use crate::wire::Reader;
use num_enum::TryFromPrimitive;
use slog::Logger;

/// BGP message types.
///
/// Ref: RFC 4271 §4.1
#[derive(Debug, Eq, PartialEq, TryFromPrimitive, Copy, Clone)]
#[repr(u8)]
pub enum MessageType {
    /// The first message sent by each side once a TCP connection is
    /// established.
    ///
    /// RFC 4271 §4.2
    Open = 1,

    /// Used to transfer routing information between BGP peers.
    ///
    /// RFC 4271 §4.3
    Update = 2,

    /// Sent when an error condition is detected.
    ///
    /// RFC 4271 §4.5
    Notification = 3,

    /// Exchanged between peers often enough not to cause the hold timer to
    /// expire.
    ///
    /// RFC 4271 §4.4
    KeepAlive = 4,

    /// Asks the peer to re-advertise a family.
    ///
    /// RFC 2918, RFC 7313
    RouteRefresh = 5,
}

/// Each BGP message has a fixed sized header.
///
/// ```text
/// 0                   1                   2                   3
/// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
///   +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///   |                                                               |
///   +                                                               +
///   |                                                               |
///   +                                                               +
///   |                           Marker                              |
///   +                                                               +
///   |                                                               |
///   +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///   |          Length               |      Type     |
///   +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// Ref: RFC 4271 §4.1
#[derive(Debug, PartialEq, Eq)]
pub struct Header {
    /// Total length of the message, including the header. May be no larger
    /// than 4096.
    pub length: u16,

    /// Indicates the type of message.
    pub typ: MessageType,
}

/// Per RFC 4271 §4.1 the marker is all ones.
pub const MARKER: [u8; 16] = [0xff; 16];

pub const MAX_MESSAGE_SIZE: usize = 4096;

impl Header {
    pub const WIRE_SIZE: usize = 19;

    /// Create a new BGP message header. Length must be between 19 and 4096
    /// per RFC 4271 §4.1.
    pub fn new(length: u16, typ: MessageType) -> Result<Header, Error> {
        if usize::from(length) < Self::WIRE_SIZE {
            return Err(Error::TooSmall("message length".into()));
        }
        if usize::from(length) > MAX_MESSAGE_SIZE {
            return Err(Error::TooLarge("message length".into()));
        }
        Ok(Header { length, typ })
    }

    /// Serialize the header to wire format.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut buf = MARKER.to_vec();
        buf.extend_from_slice(&self.length.to_be_bytes());
        buf.push(self.typ as u8);
        buf
    }

    /// Deserialize a header from wire format, validating marker and length
    /// bounds.
    pub fn from_wire(buf: &[u8]) -> Result<Header, Error> {
        if buf.len() < Self::WIRE_SIZE {
            return Err(Error::TooSmall("message header".into()));
        }
        if buf[..16] != MARKER {
            return Err(Error::NoMarker);
        }

        let length = u16::from_be_bytes([buf[16], buf[17]]);
        if usize::from(length) < Self::WIRE_SIZE {
            return Err(Error::TooSmall("message length".into()));
        }
        if usize::from(length) > MAX_MESSAGE_SIZE {
            return Err(Error::TooLarge("message length".into()));
        }

        let typ = MessageType::try_from(buf[18])?;

        Ok(Header { length, typ })
    }
}

/// The ASN used in the 16-bit "my autonomous system" field when the real
/// ASN needs four octets.
///
/// Ref: RFC 6793 §9
pub const AS_TRANS: u16 = 23456;

/// The version number for BGP-4.
pub const BGP4: u8 = 4;

/// Messages this speaker originates. An observer never sends an UPDATE or a
/// ROUTE-REFRESH, so neither has an outbound representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Open(OpenMessage),
    KeepAlive,
    Notification(NotificationMessage),
}

impl Message {
    pub fn kind(&self) -> MessageType {
        match self {
            Self::Open(_) => MessageType::Open,
            Self::KeepAlive => MessageType::KeepAlive,
            Self::Notification(_) => MessageType::Notification,
        }
    }

    /// Serialize the message body; the caller frames it with a [`Header`].
    pub fn to_wire(&self) -> Result<Vec<u8>, Error> {
        match self {
            Self::Open(m) => m.to_wire(),
            Self::KeepAlive => Ok(Vec::new()),
            Self::Notification(m) => Ok(m.to_wire()),
        }
    }
}

/// The first message sent by each side once a TCP connection is
/// established.
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |    Version    |     My Autonomous System      |   Hold Time   :
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// :               |                BGP Identifier                 :
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// :               | Opt Parm Len  |     Optional Parameters       :
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// :                                                               :
/// :             Optional Parameters (cont, variable)              :
/// :                                                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// Ref: RFC 4271 §4.2
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenMessage {
    /// BGP protocol version.
    pub version: u8,

    /// Autonomous system number of the sender. AS_TRANS when the real ASN
    /// is in the 4-octet capability.
    pub asn: u16,

    /// Number of seconds the sender proposes for the hold timer.
    pub hold_time: u16,

    /// BGP identifier of the sender.
    pub id: u32,

    /// Decoded capability record. For an inbound OPEN this is what the peer
    /// advertised; for the reply it is the peer record the reply reflects.
    pub parameters: Parameters,
}

impl OpenMessage {
    /// Build the reply OPEN for a peer whose OPEN carried `parameters`.
    pub fn reply(
        local_asn: u32,
        hold_time: u16,
        id: u32,
        parameters: Parameters,
    ) -> OpenMessage {
        let asn = match u16::try_from(local_asn) {
            Ok(asn) => asn,
            Err(_) => AS_TRANS,
        };
        OpenMessage {
            version: BGP4,
            asn,
            hold_time,
            id,
            parameters,
        }
    }

    /// The peer's ASN with the 4-octet capability folded in.
    pub fn effective_asn(&self) -> u32 {
        if self.asn == AS_TRANS && self.parameters.asn32 != 0 {
            self.parameters.asn32
        } else {
            u32::from(self.asn)
        }
    }

    /// Serialize a reply OPEN. The capability block reflects only what both
    /// sides support, per [`Parameters::reply_to_wire`].
    pub fn to_wire(&self) -> Result<Vec<u8>, Error> {
        let mut buf = vec![self.version];
        buf.extend_from_slice(&self.asn.to_be_bytes());
        buf.extend_from_slice(&self.hold_time.to_be_bytes());
        buf.extend_from_slice(&self.id.to_be_bytes());

        let params = self.parameters.reply_to_wire(self.asn);
        let len = u8::try_from(params.len())
            .map_err(|_| Error::TooLarge("optional parameters".into()))?;
        buf.push(len);
        buf.extend_from_slice(&params);
        Ok(buf)
    }

    /// Deserialize an OPEN message body.
    pub fn from_wire(buf: &[u8], log: &Logger) -> Result<OpenMessage, Error> {
        let mut r = Reader::new(buf);
        let version = r.read_u8()?;
        if version != BGP4 {
            return Err(Error::BadVersion);
        }
        let asn = r.read_u16()?;
        let hold_time = r.read_u16()?;
        let id = r.read_u32()?;
        let param_len = usize::from(r.read_u8()?);
        let params = r
            .take(param_len)
            .map_err(|_| Error::TooSmall("optional parameters".into()))?;
        let parameters = Parameters::from_wire(params, log)?;
        Ok(OpenMessage {
            version,
            asn,
            hold_time,
            id,
            parameters,
        })
    }
}

/// An UPDATE as decoded off the wire: the withdrawn-routes block, the
/// path-attribute section folded into a bundle, and the IPv4 NLRI tail.
/// IPv6 reachability and withdrawals ride inside the MP attributes of the
/// bundle.
///
/// Ref: RFC 4271 §4.3
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UpdateMessage {
    pub withdrawn: Vec<Prefix4>,
    pub attrs: PathAttributes,
    pub nlri: Vec<Prefix4>,
}

impl UpdateMessage {
    /// Decode an UPDATE body. ADD-PATH handling follows the session's
    /// negotiated per-family state in `caps`.
    pub fn from_wire(
        buf: &[u8],
        caps: &Negotiated,
        log: &Logger,
    ) -> Result<UpdateMessage, Error> {
        let mut r = Reader::new(buf);

        let withdrawn_len = usize::from(r.read_u16()?);
        let mut wr = r.sub_reader(withdrawn_len).map_err(|_| {
            Error::MalformedNlri("withdrawn block overruns message".into())
        })?;
        let withdrawn = nlri::decode_v4(&mut wr, caps.v4_add_path)?;

        let attr_len = usize::from(r.read_u16()?);
        if withdrawn_len == 0 && attr_len == 0 {
            // IPv4 End-of-RIB.
            return Ok(UpdateMessage::default());
        }
        let mut ar = r.sub_reader(attr_len).map_err(|_| {
            Error::MalformedAttribute(
                "attribute section overruns message".into(),
            )
        })?;
        let attrs = attributes::decode_path_attributes(&mut ar, caps, log)?;

        let nlri = nlri::decode_v4(&mut r, caps.v4_add_path)?;

        Ok(UpdateMessage {
            withdrawn,
            attrs,
            nlri,
        })
    }

    /// An empty UPDATE (no withdraws, no attributes) ends the initial IPv4
    /// table transfer.
    pub fn is_v4_end_of_rib(&self) -> bool {
        self.withdrawn.is_empty()
            && self.attrs.is_empty()
            && self.nlri.is_empty()
    }

    /// Total prefixes withdrawn by this UPDATE across families.
    pub fn withdrawn_count(&self) -> usize {
        let mp = self
            .attrs
            .mp_unreach
            .as_ref()
            .map(|m| m.nlri.len())
            .unwrap_or(0);
        self.withdrawn.len() + mp
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationMessage {
    pub error_code: u8,
    pub error_subcode: u8,
    pub data: Vec<u8>,
}

impl NotificationMessage {
    pub fn new(code: ErrorCode, subcode: u8) -> NotificationMessage {
        NotificationMessage {
            error_code: code as u8,
            error_subcode: subcode,
            data: Vec::new(),
        }
    }

    pub fn to_wire(&self) -> Vec<u8> {
        let mut buf = vec![self.error_code, self.error_subcode];
        buf.extend_from_slice(&self.data);
        buf
    }

    pub fn from_wire(buf: &[u8]) -> Result<NotificationMessage, Error> {
        let mut r = Reader::new(buf);
        let error_code = r.read_u8()?;
        let error_subcode = r.read_u8()?;
        let data = r.take(r.remaining())?.to_vec();
        Ok(NotificationMessage {
            error_code,
            error_subcode,
            data,
        })
    }

    /// Human name for the error code, for logging.
    pub fn code_name(&self) -> String {
        match ErrorCode::try_from(self.error_code) {
            Ok(c) => c.to_string(),
            Err(_) => format!("code {}", self.error_code),
        }
    }
}

/// Notification error codes.
///
/// Ref: RFC 4271 §4.5
#[derive(Debug, PartialEq, Eq, Copy, Clone, TryFromPrimitive)]
#[repr(u8)]
pub enum ErrorCode {
    Header = 1,
    Open = 2,
    Update = 3,
    HoldTimerExpired = 4,
    Fsm = 5,
    Cease = 6,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            Self::Header => "message header error",
            Self::Open => "open message error",
            Self::Update => "update message error",
            Self::HoldTimerExpired => "hold timer expired",
            Self::Fsm => "finite state machine error",
            Self::Cease => "cease",
        };
        write!(f, "{s}")
    }
}

/// OPEN message error subcodes.
///
/// Ref: RFC 4271 §6.2
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[repr(u8)]
pub enum OpenErrorSubcode {
    Unspecific = 0,
    UnsupportedVersionNumber = 1,
    BadPeerAs = 2,
    BadBgpIdentifier = 3,
    UnsupportedOptionalParameter = 4,
    UnacceptableHoldTime = 6,
}

/// A ROUTE-REFRESH request: the family the sender wants re-advertised.
/// Decoded for the log; an observer advertises nothing, so there is never
/// anything to answer with.
///
/// Ref: RFC 2918 §3
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteRefreshMessage {
    pub afi: u16,
    pub safi: u8,
}

impl RouteRefreshMessage {
    pub fn from_wire(buf: &[u8]) -> Result<RouteRefreshMessage, Error> {
        let mut r = Reader::new(buf);
        let afi = r.read_u16()?;
        let _reserved = r.read_u8()?;
        let safi = r.read_u8()?;
        Ok(RouteRefreshMessage { afi, safi })
    }
}
