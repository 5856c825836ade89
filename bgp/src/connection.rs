// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Framing over an accepted TCP connection. One PDU at a time: read the
//! 19-octet header to completion, validate the marker and length bounds,
//! then read exactly the declared remainder. The framer hands the type
//! octet and raw body up to the session and never interprets further; a
//! corrupt marker or length means the stream can no longer be trusted, so
//! the connection is torn down without a NOTIFICATION.

use crate::error::Error;
use crate::messages::{Header, Message, MessageType};
use slog::{trace, Logger};
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

pub struct BgpConnection {
    peer: SocketAddr,
    stream: TcpStream,
    log: Logger,
}

impl BgpConnection {
    pub fn new(stream: TcpStream, peer: SocketAddr, log: Logger) -> Self {
        Self { peer, stream, log }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Arm or disarm the hold timer. The negotiated hold time becomes the
    /// socket read deadline, so a silent peer surfaces as
    /// [`Error::HoldTimerExpired`] from [`recv`].
    ///
    /// [`recv`]: Self::recv
    pub fn set_hold_time(&self, hold: Option<Duration>) -> Result<(), Error> {
        self.stream.set_read_timeout(hold)?;
        Ok(())
    }

    /// Read one whole PDU, blocking until it arrives in full.
    pub fn recv(&mut self) -> Result<(MessageType, Vec<u8>), Error> {
        let mut buf = [0u8; Header::WIRE_SIZE];
        self.stream.read_exact(&mut buf).map_err(map_read_err)?;
        let header = Header::from_wire(&buf)?;

        let mut body =
            vec![0u8; usize::from(header.length) - Header::WIRE_SIZE];
        self.stream.read_exact(&mut body).map_err(map_read_err)?;

        trace!(
            self.log,
            "[{}] recv: {:?} ({} octets)",
            self.peer,
            header.typ,
            header.length
        );
        Ok((header.typ, body))
    }

    /// Frame and send one message.
    pub fn send(&mut self, msg: Message) -> Result<(), Error> {
        let body = msg.to_wire()?;
        let length = u16::try_from(body.len() + Header::WIRE_SIZE)
            .map_err(|_| Error::TooLarge("outbound message".into()))?;
        let header = Header::new(length, msg.kind())?;

        let mut buf = header.to_wire();
        buf.extend_from_slice(&body);
        trace!(self.log, "[{}] send: {:?}", self.peer, msg.kind());
        self.stream.write_all(&buf)?;
        Ok(())
    }

    pub fn shutdown(&self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

fn map_read_err(e: std::io::Error) -> Error {
    match e.kind() {
        std::io::ErrorKind::UnexpectedEof
        | std::io::ErrorKind::ConnectionReset
        | std::io::ErrorKind::BrokenPipe => Error::Disconnected,
        // read_exact surfaces a hit read deadline as one of these,
        // depending on platform.
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut => {
            Error::HoldTimerExpired
        }
        _ => Error::Io(e),
    }
}
