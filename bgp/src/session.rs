// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The per-peer session worker. One blocking loop per peer: pull a framed
//! PDU off the socket, dispatch on type, reply where the protocol calls for
//! it. The observer side of the FSM is small. A peer connects, we wait for
//! its OPEN, answer with ours plus a KEEPALIVE, then sit in Established
//! echoing keepalives and decoding updates until either side goes away.

use crate::capabilities::Negotiated;
use crate::config::RouterConfig;
use crate::connection::BgpConnection;
use crate::dispatcher::PeerTable;
use crate::error::Error;
use crate::messages::{
    ErrorCode, Message, MessageType, NotificationMessage, OpenErrorSubcode,
    OpenMessage, RouteRefreshMessage, UpdateMessage,
};
use crate::{attributes, lock, write_lock};
use chrono::{DateTime, Utc};
use slog::{debug, info, warn, Logger};
use std::fmt::{self, Display, Formatter};
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

/// The states a session may be in. An observer never dials out, so there is
/// no connect/retry half to this machine: a session exists only once a TCP
/// connection does.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum FsmState {
    /// Initial state, before the worker has started on the accepted
    /// connection.
    Idle,

    /// Waiting for the peer's OPEN.
    OpenWait,

    /// OPEN exchange complete; keepalives echo and updates flow.
    Established,

    /// Terminal. The socket is gone and the worker is exiting.
    Closed,
}

impl FsmState {
    fn as_str(&self) -> &str {
        match self {
            FsmState::Idle => "idle",
            FsmState::OpenWait => "open wait",
            FsmState::Established => "established",
            FsmState::Closed => "closed",
        }
    }
}

impl Display for FsmState {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Message counters for one session.
#[derive(Default)]
pub struct SessionCounters {
    pub opens_received: AtomicU64,
    pub opens_sent: AtomicU64,
    pub keepalives_received: AtomicU64,
    pub keepalives_sent: AtomicU64,
    pub updates_received: AtomicU64,
    pub prefixes_withdrawn: AtomicU64,
    pub notifications_received: AtomicU64,
    pub notifications_sent: AtomicU64,
    pub route_refreshes_received: AtomicU64,
    pub malformed_updates: AtomicU64,
}

/// Session state shared between the worker and outside readers (the peer
/// table, exporters). The worker is the only writer; everyone else takes
/// the reader side.
pub struct SessionInfo {
    pub peer: IpAddr,
    pub start_time: DateTime<Utc>,
    pub counters: SessionCounters,
    pub state: Mutex<FsmState>,

    /// Populated once the OPEN exchange completes, immutable afterwards.
    pub negotiated: RwLock<Option<Negotiated>>,

    /// Peer ASN with the 4-octet capability folded in.
    pub remote_asn: RwLock<Option<u32>>,

    /// Peer router id from its OPEN.
    pub remote_id: RwLock<Option<u32>>,

    pub last_keepalive: RwLock<Option<DateTime<Utc>>>,

    /// Initial table transfer complete, per family.
    pub v4_end_of_rib: AtomicBool,
    pub v6_end_of_rib: AtomicBool,

    /// Most recently decoded UPDATE.
    pub last_update: RwLock<Option<UpdateMessage>>,
}

impl SessionInfo {
    pub fn new(peer: IpAddr) -> Self {
        Self {
            peer,
            start_time: Utc::now(),
            counters: SessionCounters::default(),
            state: Mutex::new(FsmState::Idle),
            negotiated: RwLock::new(None),
            remote_asn: RwLock::new(None),
            remote_id: RwLock::new(None),
            last_keepalive: RwLock::new(None),
            v4_end_of_rib: AtomicBool::new(false),
            v6_end_of_rib: AtomicBool::new(false),
            last_update: RwLock::new(None),
        }
    }
}

/// Negotiate the session hold time: the smaller of what the peer offered
/// and what we offer. Zero disables the timer entirely; a nonzero value
/// below three seconds is not acceptable.
///
/// Ref: RFC 4271 §4.2
pub fn negotiate_hold_time(peer: u16, local: u16) -> Result<u16, Error> {
    let hold = peer.min(local);
    if hold != 0 && hold < 3 {
        return Err(Error::HoldTimeTooSmall);
    }
    Ok(hold)
}

pub struct SessionRunner {
    conn: BgpConnection,
    config: RouterConfig,
    info: Arc<SessionInfo>,
    peers: PeerTable,
    caps: Option<Negotiated>,
    state: FsmState,
    log: Logger,
}

impl SessionRunner {
    pub fn new(
        conn: BgpConnection,
        config: RouterConfig,
        info: Arc<SessionInfo>,
        peers: PeerTable,
        log: Logger,
    ) -> Self {
        Self {
            conn,
            config,
            info,
            peers,
            caps: None,
            state: FsmState::Idle,
            log,
        }
    }

    /// Drive the session until the peer goes away, a NOTIFICATION arrives,
    /// or the stream turns out to be garbage.
    pub fn run(&mut self) {
        // Until a hold time is negotiated, our own offer bounds how long
        // we wait for the peer's OPEN.
        if self.config.hold_time > 0 {
            if let Err(e) = self.conn.set_hold_time(Some(
                Duration::from_secs(u64::from(self.config.hold_time)),
            )) {
                warn!(self.log, "[{}] set read deadline: {e}", self.info.peer);
            }
        }
        self.transition(FsmState::OpenWait);

        loop {
            let (typ, body) = match self.conn.recv() {
                Ok(pdu) => pdu,
                Err(Error::Disconnected) => {
                    debug!(self.log, "[{}] peer disconnected", self.info.peer);
                    break;
                }
                Err(Error::HoldTimerExpired) => {
                    warn!(
                        self.log,
                        "[{}] hold timer expired, closing session",
                        self.info.peer
                    );
                    break;
                }
                Err(e) => {
                    warn!(self.log, "[{}] framing error: {e}", self.info.peer);
                    break;
                }
            };

            match (self.state, typ) {
                (FsmState::OpenWait, MessageType::Open) => {
                    if let Err(e) = self.handle_open(&body) {
                        warn!(
                            self.log,
                            "[{}] open exchange failed: {e}", self.info.peer
                        );
                        break;
                    }
                }
                (FsmState::OpenWait, typ) => {
                    warn!(
                        self.log,
                        "[{}] expected open, got {typ:?}", self.info.peer
                    );
                    self.send_notification(ErrorCode::Fsm, 0);
                    break;
                }
                (FsmState::Established, MessageType::KeepAlive) => {
                    self.handle_keepalive();
                }
                (FsmState::Established, MessageType::Update) => {
                    self.handle_update(&body);
                }
                (FsmState::Established, MessageType::Notification) => {
                    self.handle_notification(&body);
                    break;
                }
                (FsmState::Established, MessageType::RouteRefresh) => {
                    self.handle_route_refresh(&body);
                }
                (state, typ) => {
                    warn!(
                        self.log,
                        "[{}] unexpected {typ:?} in state {state}",
                        self.info.peer
                    );
                    self.send_notification(ErrorCode::Fsm, 0);
                    break;
                }
            }
        }

        self.transition(FsmState::Closed);
        self.conn.shutdown();
        self.deregister();
    }

    /// The peer's OPEN arrived: negotiate, reply with our OPEN, kick the
    /// keepalive exchange off, and move to Established.
    fn handle_open(&mut self, body: &[u8]) -> Result<(), Error> {
        let peer = self.info.peer;
        let open = match OpenMessage::from_wire(body, &self.log) {
            Ok(m) => m,
            Err(e) => {
                self.send_notification(
                    ErrorCode::Open,
                    OpenErrorSubcode::Unspecific as u8,
                );
                return Err(e);
            }
        };
        self.info.counters.opens_received.fetch_add(1, Ordering::Relaxed);

        let hold = match negotiate_hold_time(
            open.hold_time,
            self.config.hold_time,
        ) {
            Ok(hold) => hold,
            Err(e) => {
                self.send_notification(
                    ErrorCode::Open,
                    OpenErrorSubcode::UnacceptableHoldTime as u8,
                );
                return Err(e);
            }
        };

        let negotiated = Negotiated::new(&open.parameters, hold);
        info!(
            self.log,
            "[{peer}] open received: asn {} id {} hold {} \
             refresh {} v4 {} v6 {} add-path v4 {} v6 {}",
            open.effective_asn(),
            std::net::Ipv4Addr::from(open.id),
            hold,
            negotiated.refresh,
            negotiated.v4_unicast,
            negotiated.v6_unicast,
            negotiated.v4_add_path,
            negotiated.v6_add_path,
        );
        if !open.parameters.unsupported.is_empty() {
            debug!(
                self.log,
                "[{peer}] unsupported capability codes: {:?}",
                open.parameters.unsupported
            );
        }

        let reply = OpenMessage::reply(
            self.config.asn,
            self.config.hold_time,
            self.config.id,
            open.parameters.clone(),
        );
        self.conn.send(Message::Open(reply))?;
        self.info.counters.opens_sent.fetch_add(1, Ordering::Relaxed);

        self.conn.send(Message::KeepAlive)?;
        self.info.counters.keepalives_sent.fetch_add(1, Ordering::Relaxed);

        let deadline = if hold > 0 {
            Some(Duration::from_secs(u64::from(hold)))
        } else {
            None
        };
        self.conn.set_hold_time(deadline)?;

        *write_lock!(self.info.remote_asn) = Some(open.effective_asn());
        *write_lock!(self.info.remote_id) = Some(open.id);
        *write_lock!(self.info.negotiated) = Some(negotiated.clone());
        self.caps = Some(negotiated);

        self.transition(FsmState::Established);
        Ok(())
    }

    /// Keepalives are echoed one for one; the observer never runs a
    /// keepalive timer of its own.
    fn handle_keepalive(&mut self) {
        let n = self
            .info
            .counters
            .keepalives_received
            .fetch_add(1, Ordering::Relaxed)
            + 1;
        *write_lock!(self.info.last_keepalive) = Some(Utc::now());
        debug!(self.log, "[{}] received keepalive #{n}", self.info.peer);

        if let Err(e) = self.conn.send(Message::KeepAlive) {
            warn!(self.log, "[{}] keepalive reply: {e}", self.info.peer);
            return;
        }
        self.info.counters.keepalives_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Decode and log one UPDATE. A malformed UPDATE is dropped with a
    /// warning; one bad attribute must not take the session down.
    fn handle_update(&mut self, body: &[u8]) {
        let peer = self.info.peer;
        let caps = self.caps.clone().unwrap_or_default();
        let update = match UpdateMessage::from_wire(body, &caps, &self.log) {
            Ok(u) => u,
            Err(e) => {
                self.info
                    .counters
                    .malformed_updates
                    .fetch_add(1, Ordering::Relaxed);
                warn!(self.log, "[{peer}] dropping malformed update: {e}");
                return;
            }
        };
        self.info.counters.updates_received.fetch_add(1, Ordering::Relaxed);

        if update.is_v4_end_of_rib() {
            self.info.v4_end_of_rib.store(true, Ordering::Relaxed);
            info!(self.log, "[{peer}] ipv4 end-of-rib received");
        }
        if let Some(mp) = &update.attrs.mp_unreach {
            if mp.end_of_rib {
                if mp.family.is_ipv6_unicast() {
                    self.info.v6_end_of_rib.store(true, Ordering::Relaxed);
                    info!(self.log, "[{peer}] ipv6 end-of-rib received");
                } else if mp.family.is_ipv4_unicast() {
                    self.info.v4_end_of_rib.store(true, Ordering::Relaxed);
                    info!(self.log, "[{peer}] ipv4 end-of-rib received");
                }
            }
        }

        let withdrawn = update.withdrawn_count() as u64;
        if withdrawn > 0 {
            self.info
                .counters
                .prefixes_withdrawn
                .fetch_add(withdrawn, Ordering::Relaxed);
        }

        self.log_update(&update);
        *write_lock!(self.info.last_update) = Some(update);
    }

    /// Write the decoded UPDATE to the log, honoring the end-of-rib gate:
    /// with the gate on, a family's routes are not logged until its initial
    /// table transfer has completed.
    fn log_update(&self, update: &UpdateMessage) {
        let peer = self.info.peer;
        let v4_open = !self.config.log_after_eor
            || self.info.v4_end_of_rib.load(Ordering::Relaxed);
        let v6_open = !self.config.log_after_eor
            || self.info.v6_end_of_rib.load(Ordering::Relaxed);

        let mut logged_route = false;

        if v4_open {
            for p in &update.withdrawn {
                info!(self.log, "[{peer}] withdraw {p}");
                logged_route = true;
            }
            for p in &update.nlri {
                if p.path_id != 0 {
                    info!(
                        self.log,
                        "[{peer}] nlri {p} path-id {}", p.path_id
                    );
                } else {
                    info!(self.log, "[{peer}] nlri {p}");
                }
                logged_route = true;
            }
        }

        if let Some(mp) = &update.attrs.mp_reach {
            if v6_open {
                if let crate::attributes::MpNlri::V6(prefixes) = &mp.nlri {
                    for p in prefixes {
                        if p.path_id != 0 {
                            info!(
                                self.log,
                                "[{peer}] nlri {p} path-id {}", p.path_id
                            );
                        } else {
                            info!(self.log, "[{peer}] nlri {p}");
                        }
                        logged_route = true;
                    }
                    for nh in &mp.next_hops {
                        info!(self.log, "[{peer}] next-hop {nh}");
                    }
                }
            }
        }

        if let Some(mp) = &update.attrs.mp_unreach {
            if v6_open && !mp.end_of_rib {
                if let crate::attributes::MpNlri::V6(prefixes) = &mp.nlri {
                    for p in prefixes {
                        info!(self.log, "[{peer}] withdraw {p}");
                        logged_route = true;
                    }
                }
            }
        }

        if !logged_route {
            return;
        }

        let attrs = &update.attrs;
        if let Some(origin) = attrs.origin {
            info!(self.log, "[{peer}] origin: {origin}");
        }
        if !attrs.as_path.is_empty() {
            info!(
                self.log,
                "[{peer}] as-path: {}",
                attributes::format_as_path(&attrs.as_path)
            );
        }
        if let Some(nh) = attrs.next_hop {
            info!(self.log, "[{peer}] next-hop: {nh}");
        }
        if let Some(med) = attrs.med {
            info!(self.log, "[{peer}] med: {med}");
        }
        if let Some(lp) = attrs.local_pref {
            info!(self.log, "[{peer}] local-pref: {lp}");
        }
        if let Some(originator) = attrs.originator_id {
            info!(self.log, "[{peer}] originator id: {originator}");
        }
        if !attrs.cluster_list.is_empty() {
            info!(
                self.log,
                "[{peer}] cluster list: {}",
                attributes::format_cluster_list(&attrs.cluster_list)
            );
        }
        if attrs.atomic_aggregate {
            info!(self.log, "[{peer}] atomic aggregate set");
        }
        if let Some(aggregator) = &attrs.aggregator {
            info!(
                self.log,
                "[{peer}] aggregator: asn {} id {}",
                aggregator.asn,
                aggregator.id
            );
        }
        if !attrs.communities.is_empty() {
            info!(
                self.log,
                "[{peer}] communities: {}",
                attributes::format_communities(&attrs.communities)
            );
        }
        if !attrs.large_communities.is_empty() {
            info!(
                self.log,
                "[{peer}] large communities: {}",
                attributes::format_large_communities(
                    &attrs.large_communities
                )
            );
        }
        if !attrs.extended_communities.is_empty() {
            info!(
                self.log,
                "[{peer}] extended communities: {}",
                attrs
                    .extended_communities
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" ")
            );
        }
    }

    fn handle_notification(&mut self, body: &[u8]) {
        let peer = self.info.peer;
        self.info
            .counters
            .notifications_received
            .fetch_add(1, Ordering::Relaxed);
        match NotificationMessage::from_wire(body) {
            Ok(n) => {
                warn!(
                    self.log,
                    "[{peer}] notification received: {} subcode {}, \
                     closing session",
                    n.code_name(),
                    n.error_subcode
                );
            }
            Err(e) => {
                warn!(self.log, "[{peer}] undecodable notification: {e}");
            }
        }
    }

    fn handle_route_refresh(&mut self, body: &[u8]) {
        let peer = self.info.peer;
        self.info
            .counters
            .route_refreshes_received
            .fetch_add(1, Ordering::Relaxed);
        match RouteRefreshMessage::from_wire(body) {
            Ok(m) => {
                // Nothing to re-advertise; noted for the record.
                info!(
                    self.log,
                    "[{peer}] route refresh for afi {} safi {}",
                    m.afi,
                    m.safi
                );
            }
            Err(e) => {
                warn!(self.log, "[{peer}] undecodable route refresh: {e}");
            }
        }
    }

    fn send_notification(&mut self, code: ErrorCode, subcode: u8) {
        let msg = Message::Notification(NotificationMessage::new(
            code, subcode,
        ));
        if let Err(e) = self.conn.send(msg) {
            warn!(
                self.log,
                "[{}] send notification: {e}", self.info.peer
            );
            return;
        }
        self.info.counters.notifications_sent.fetch_add(1, Ordering::Relaxed);
    }

    fn transition(&mut self, next: FsmState) {
        info!(
            self.log,
            "[{}] transition {} -> {next}", self.info.peer, self.state
        );
        self.state = next;
        *lock!(self.info.state) = next;
    }

    /// Drop this session's entry from the peer table, unless a newer
    /// session for the same address has already displaced it.
    fn deregister(&mut self) {
        let mut peers = lock!(self.peers);
        if let Some(handle) = peers.get(&self.info.peer) {
            if Arc::ptr_eq(&handle.info, &self.info) {
                peers.remove(&self.info.peer);
                debug!(
                    self.log,
                    "[{}] session deregistered", self.info.peer
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn hold_time_negotiation() {
        assert_eq!(negotiate_hold_time(90, 90).unwrap(), 90);
        assert_eq!(negotiate_hold_time(30, 90).unwrap(), 30);
        assert_eq!(negotiate_hold_time(180, 90).unwrap(), 90);
        // Zero on either side disables the timer.
        assert_eq!(negotiate_hold_time(0, 90).unwrap(), 0);
        assert_eq!(negotiate_hold_time(30, 0).unwrap(), 0);
        // Nonzero but under the floor is unacceptable.
        assert!(matches!(
            negotiate_hold_time(2, 90),
            Err(Error::HoldTimeTooSmall)
        ));
        assert!(matches!(
            negotiate_hold_time(90, 1),
            Err(Error::HoldTimeTooSmall)
        ));
        assert_eq!(negotiate_hold_time(3, 90).unwrap(), 3);
    }

    #[test]
    fn fsm_state_display() {
        assert_eq!(FsmState::OpenWait.to_string(), "open wait");
        assert_eq!(FsmState::Established.to_string(), "established");
    }
}
