// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The accept loop and the peer table. One live session per peer address:
//! a new connection from an address we already track displaces the old
//! session before the new one is inserted, all under a single lock so the
//! invariant holds without races. Each accepted peer gets its own worker
//! thread; workers remove their own entry on the way out.

use crate::config::RouterConfig;
use crate::connection::BgpConnection;
use crate::error::Error;
use crate::lock;
use crate::session::{SessionInfo, SessionRunner};
use crate::to_canonical;
use slog::{info, warn, Logger};
use std::collections::BTreeMap;
use std::net::{
    IpAddr, Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, TcpListener,
    TcpStream,
};
use std::sync::{Arc, Mutex};
use std::thread::spawn;

/// Handle to a running session, owned by the peer table. Enough to evict
/// it (close its socket) and to read its state from outside.
pub struct PeerHandle {
    stream: TcpStream,
    pub info: Arc<SessionInfo>,
}

impl PeerHandle {
    pub fn shutdown(&self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

pub type PeerTable = Arc<Mutex<BTreeMap<IpAddr, PeerHandle>>>;

pub struct Dispatcher {
    peers: PeerTable,
    config: RouterConfig,
    listener: TcpListener,
    log: Logger,
}

impl Dispatcher {
    /// Bind the listen socket. Dual-stack where the platform allows it,
    /// plain IPv4 otherwise.
    pub fn new(config: RouterConfig, log: Logger) -> Result<Self, Error> {
        let listener =
            match TcpListener::bind((Ipv6Addr::UNSPECIFIED, config.port)) {
                Ok(l) => l,
                Err(_) => TcpListener::bind((
                    Ipv4Addr::UNSPECIFIED,
                    config.port,
                ))?,
            };
        Ok(Self {
            peers: Arc::new(Mutex::new(BTreeMap::new())),
            config,
            listener,
            log,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.listener.local_addr()?)
    }

    pub fn peers(&self) -> PeerTable {
        self.peers.clone()
    }

    /// Accept forever. Per-connection failures are logged and the loop
    /// carries on; only losing the listen socket itself ends it.
    pub fn run(&self) {
        loop {
            let (stream, addr) = match self.listener.accept() {
                Ok(a) => a,
                Err(e) => {
                    warn!(self.log, "accept: {e}");
                    continue;
                }
            };
            if let Err(e) = self.handle_accept(stream, addr) {
                warn!(self.log, "failed to start session for {addr}: {e}");
            }
        }
    }

    fn handle_accept(
        &self,
        stream: TcpStream,
        mut addr: SocketAddr,
    ) -> Result<(), Error> {
        let ip = to_canonical(addr.ip());
        addr.set_ip(ip);
        info!(self.log, "connection from {addr}");

        let info = Arc::new(SessionInfo::new(ip));
        let handle = PeerHandle {
            stream: stream.try_clone()?,
            info: info.clone(),
        };
        let conn = BgpConnection::new(stream, addr, self.log.clone());
        let mut runner = SessionRunner::new(
            conn,
            self.config.clone(),
            info,
            self.peers.clone(),
            self.log.clone(),
        );

        {
            let mut peers = lock!(self.peers);
            if let Some(old) = peers.remove(&ip) {
                info!(self.log, "[{ip}] displacing existing session");
                old.shutdown();
            }
            peers.insert(ip, handle);
        }

        spawn(move || runner.run());
        Ok(())
    }
}
