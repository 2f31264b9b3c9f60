//  Copyright 2024, The Tari Project
//
//  Redistribution and use in source and binary forms, with or without modification, are permitted provided that the
//  following conditions are met:
//
//  1. Redistributions of source code must retain the above copyright notice, this list of conditions and the following
//  disclaimer.
//
//  2. Redistributions in binary form must reproduce the above copyright notice, this list of conditions and the
//  following disclaimer in the documentation and/or other materials provided with the distribution.
//
//  3. Neither the name of the copyright holder nor the names of its contributors may be used to endorse or promote
//  products derived from this software without specific prior written permission.
//
//  THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES,
//  INCLUDING, BUT NOT LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE ARE
//  DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
//  SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR
//  SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY THEORY OF LIABILITY,
//  WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE
//  USE OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

use std::{
    collections::HashMap,
    fmt::{Display, Formatter},
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use chainsync_common::log_if_error;
use chainsync_common_types::types::PeerId;
use chainsync_shutdown::ShutdownSignal;
use log::*;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::{
    peers::{Peer, PeerPoolError, PeerServer, ServerEvent},
    protocol::Capability,
};

const LOG_TARGET: &str = "c::peers::pool";

const EVENT_BUFFER_SIZE: usize = 100;

/// Observable changes to the pool. These are informational, no component relies on them for control flow.
#[derive(Clone)]
pub enum PeerPoolEvent {
    Added(Arc<Peer>),
    Removed(PeerId),
    Banned { peer: PeerId, duration: Duration },
    Error(PeerPoolError),
}

impl Display for PeerPoolEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PeerPoolEvent::Added(peer) => write!(f, "Added({})", peer),
            PeerPoolEvent::Removed(peer) => write!(f, "Removed({})", peer.short_str()),
            PeerPoolEvent::Banned { peer, duration } => write!(f, "Banned({}, {:.2?})", peer.short_str(), duration),
            PeerPoolEvent::Error(err) => write!(f, "Error({})", err),
        }
    }
}

/// How `idle` chooses among several matching peers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeerSelection {
    #[default]
    Random,
    /// The matching peer with the lowest id
    Lowest,
}

/// The set of connected peers that support every required capability
pub struct PeerPool {
    peers: RwLock<HashMap<PeerId, Arc<Peer>>>,
    servers: Vec<Arc<dyn PeerServer>>,
    required: Vec<Capability>,
    selection: PeerSelection,
    event_publisher: broadcast::Sender<Arc<PeerPoolEvent>>,
}

impl PeerPool {
    pub fn new(servers: Vec<Arc<dyn PeerServer>>, required: Vec<Capability>) -> Self {
        let (event_publisher, _) = broadcast::channel(EVENT_BUFFER_SIZE);
        Self {
            peers: RwLock::new(HashMap::new()),
            servers,
            required,
            selection: PeerSelection::default(),
            event_publisher,
        }
    }

    pub fn with_selection(mut self, selection: PeerSelection) -> Self {
        self.selection = selection;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<PeerPoolEvent>> {
        self.event_publisher.subscribe()
    }

    /// Open and start every server and feed their events into the pool until `shutdown` triggers
    pub async fn open(self: &Arc<Self>, shutdown: ShutdownSignal) -> Result<(), PeerPoolError> {
        for server in &self.servers {
            // Subscribe first so that no connection made during startup is missed
            let events = server.subscribe();
            server.open().await?;
            server.start().await?;
            debug!(target: LOG_TARGET, "Server `{}` started", server.name());
            tokio::spawn(Arc::clone(self).handle_server_events(events, shutdown.clone()));
        }
        Ok(())
    }

    /// Stop every server and close all peers
    pub async fn close(&self) {
        for server in &self.servers {
            log_if_error!(target: LOG_TARGET, "Failed to stop server: {}", server.stop().await);
        }
        let peers = self.write_peers().drain().map(|(_, p)| p).collect::<Vec<_>>();
        for peer in peers {
            peer.close();
            self.publish(PeerPoolEvent::Removed(*peer.id()));
        }
    }

    async fn handle_server_events(
        self: Arc<Self>,
        mut events: broadcast::Receiver<ServerEvent>,
        mut shutdown: ShutdownSignal,
    ) {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => self.handle_server_event(event),
                    Err(RecvError::Lagged(n)) => {
                        warn!(target: LOG_TARGET, "Peer pool lagged behind by {} server event(s)", n);
                    },
                    Err(RecvError::Closed) => break,
                },
                _ = shutdown.wait() => break,
            }
        }
        debug!(target: LOG_TARGET, "Server event handler exiting");
    }

    pub fn handle_server_event(&self, event: ServerEvent) {
        match event {
            ServerEvent::PeerConnected(peer) => {
                self.add(peer);
            },
            ServerEvent::PeerDisconnected(peer_id) => {
                self.remove(&peer_id);
            },
            ServerEvent::Error(err) => {
                warn!(target: LOG_TARGET, "Server error: {}", err);
                self.publish(PeerPoolEvent::Error(err.into()));
            },
        }
    }

    /// Admit a peer. Peers missing a required capability are ignored and reported as an `Error` event.
    pub fn add(&self, peer: Arc<Peer>) -> bool {
        let missing = self
            .required
            .iter()
            .filter(|c| !peer.supports(**c))
            .copied()
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            debug!(target: LOG_TARGET, "Ignored {}", peer);
            self.publish(PeerPoolEvent::Error(PeerPoolError::MissingCapabilities {
                peer: *peer.id(),
                missing,
            }));
            return false;
        }
        let replaced = {
            let mut peers = self.write_peers();
            if peers.get(peer.id()).map_or(false, |p| Arc::ptr_eq(p, &peer)) {
                return true;
            }
            peers.insert(*peer.id(), peer.clone())
        };
        // A new connection from a known id supersedes the old one
        if let Some(old) = replaced {
            debug!(target: LOG_TARGET, "Replaced {} by a new connection", old);
            old.close();
            self.publish(PeerPoolEvent::Removed(*old.id()));
        }
        debug!(target: LOG_TARGET, "Added {}", peer);
        self.publish(PeerPoolEvent::Added(peer));
        true
    }

    /// Remove a peer and close its sessions. Jobs holding the peer notice through their failing requests.
    pub fn remove(&self, peer_id: &PeerId) -> Option<Arc<Peer>> {
        let removed = self.write_peers().remove(peer_id);
        if let Some(peer) = &removed {
            debug!(target: LOG_TARGET, "Removed {}", peer);
            peer.close();
            self.publish(PeerPoolEvent::Removed(*peer_id));
        }
        removed
    }

    /// Remove the peer and ask its server to refuse it for `duration`
    pub async fn ban(&self, peer: &Peer, duration: Duration) {
        log_if_error!(
            target: LOG_TARGET,
            "Server could not ban peer: {}",
            peer.server().ban(peer.id(), duration).await
        );
        self.remove(peer.id());
        info!(target: LOG_TARGET, "Banned {} for {:.2?}", peer, duration);
        self.publish(PeerPoolEvent::Banned {
            peer: *peer.id(),
            duration,
        });
    }

    /// An idle peer satisfying `predicate`. The peer is not claimed.
    pub fn idle<F>(&self, predicate: F) -> Option<Arc<Peer>>
    where F: Fn(&Peer) -> bool {
        let peers = self.read_peers();
        let mut candidates = peers
            .values()
            .filter(|p| p.is_idle() && predicate(p))
            .collect::<Vec<_>>();
        let selected = match self.selection {
            PeerSelection::Random => candidates.choose(&mut rand::thread_rng()).copied(),
            PeerSelection::Lowest => {
                candidates.sort_by_key(|p| *p.id());
                candidates.first().copied()
            },
        };
        selected.cloned()
    }

    pub fn peers(&self) -> Vec<Arc<Peer>> {
        self.read_peers().values().cloned().collect()
    }

    pub fn get(&self, peer_id: &PeerId) -> Option<Arc<Peer>> {
        self.read_peers().get(peer_id).cloned()
    }

    pub fn contains(&self, peer_id: &PeerId) -> bool {
        self.read_peers().contains_key(peer_id)
    }

    pub fn len(&self) -> usize {
        self.read_peers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn publish(&self, event: PeerPoolEvent) {
        trace!(target: LOG_TARGET, "Publishing {}", event);
        // No subscribers is not an error
        let _result = self.event_publisher.send(Arc::new(event));
    }

    fn read_peers(&self) -> RwLockReadGuard<'_, HashMap<PeerId, Arc<Peer>>> {
        self.peers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_peers(&self) -> RwLockWriteGuard<'_, HashMap<PeerId, Arc<Peer>>> {
        self.peers.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod test {
    use chainsync_shutdown::Shutdown;

    use super::*;
    use crate::{
        protocol::SessionState,
        test_helpers::{create_peer, MockServer},
    };

    #[test]
    fn it_filters_by_required_capabilities() {
        let server = MockServer::new();
        let pool = PeerPool::new(vec![server.clone()], vec![Capability::Les]);
        let mut events = pool.subscribe();

        assert!(!pool.add(create_peer(PeerId::from(1), &[Capability::Eth], server.clone())));
        assert!(pool.is_empty());
        match &*events.try_recv().unwrap() {
            PeerPoolEvent::Error(PeerPoolError::MissingCapabilities { missing, .. }) => {
                assert_eq!(missing, &vec![Capability::Les]);
            },
            event => panic!("Unexpected event {}", event),
        }

        assert!(pool.add(create_peer(
            PeerId::from(2),
            &[Capability::Eth, Capability::Les],
            server
        )));
        assert!(pool.contains(&PeerId::from(2)));
        assert!(matches!(&*events.try_recv().unwrap(), PeerPoolEvent::Added(_)));
    }

    #[test]
    fn a_reconnecting_peer_replaces_and_closes_the_old_connection() {
        let server = MockServer::new();
        let pool = PeerPool::new(vec![], vec![Capability::Les]);
        let old = create_peer(PeerId::from(1), &[Capability::Les], server.clone());
        assert!(pool.add(old.clone()));
        // Adding the same connection again changes nothing
        assert!(pool.add(old.clone()));
        assert_ne!(old.session(Capability::Les).unwrap().state(), SessionState::Closed);
        let mut events = pool.subscribe();

        let new = create_peer(PeerId::from(1), &[Capability::Les], server);
        assert!(pool.add(new.clone()));
        assert_eq!(pool.len(), 1);
        assert!(Arc::ptr_eq(&pool.get(&PeerId::from(1)).unwrap(), &new));
        assert_eq!(old.session(Capability::Les).unwrap().state(), SessionState::Closed);
        assert_eq!(new.session(Capability::Les).unwrap().state(), SessionState::Unconnected);
        assert!(matches!(&*events.try_recv().unwrap(), PeerPoolEvent::Removed(id) if *id == PeerId::from(1)));
        assert!(matches!(&*events.try_recv().unwrap(), PeerPoolEvent::Added(_)));
    }

    #[test]
    fn it_selects_idle_peers_matching_the_predicate() {
        let server = MockServer::new();
        let pool = PeerPool::new(vec![], vec![]).with_selection(PeerSelection::Lowest);
        for i in 1..=3 {
            pool.add(create_peer(PeerId::from(i), &[], server.clone()));
        }
        assert_eq!(*pool.idle(|_| true).unwrap().id(), PeerId::from(1));
        pool.get(&PeerId::from(1)).unwrap().claim();
        assert_eq!(*pool.idle(|_| true).unwrap().id(), PeerId::from(2));
        assert_eq!(
            *pool.idle(|p| *p.id() == PeerId::from(3)).unwrap().id(),
            PeerId::from(3)
        );
        assert!(pool.idle(|p| *p.id() == PeerId::from(1)).is_none());
    }

    #[test]
    fn random_selection_only_returns_candidates() {
        let server = MockServer::new();
        let pool = PeerPool::new(vec![], vec![]);
        for i in 1..=5 {
            pool.add(create_peer(PeerId::from(i), &[], server.clone()));
        }
        for _ in 0..20 {
            let peer = pool.idle(|p| *p.id() != PeerId::from(4)).unwrap();
            assert_ne!(*peer.id(), PeerId::from(4));
        }
    }

    #[tokio::test]
    async fn ban_removes_and_notifies_the_server() {
        let server = MockServer::new();
        let pool = PeerPool::new(vec![], vec![]);
        let peer = create_peer(PeerId::from(1), &[Capability::Eth], server.clone());
        pool.add(peer.clone());
        let mut events = pool.subscribe();

        pool.ban(&peer, Duration::from_secs(60)).await;
        assert!(!pool.contains(peer.id()));
        assert_eq!(server.bans(), vec![(PeerId::from(1), Duration::from_secs(60))]);
        assert!(matches!(&*events.recv().await.unwrap(), PeerPoolEvent::Removed(_)));
        assert!(matches!(&*events.recv().await.unwrap(), PeerPoolEvent::Banned { .. }));
        assert!(pool.remove(peer.id()).is_none());
    }

    #[tokio::test]
    async fn it_follows_server_events() {
        let server = MockServer::new();
        let pool = Arc::new(PeerPool::new(vec![server.clone()], vec![]));
        let mut events = pool.subscribe();
        let mut shutdown = Shutdown::new();
        pool.open(shutdown.to_signal()).await.unwrap();
        assert!(server.is_started());

        server.connect(create_peer(PeerId::from(7), &[], server.clone()));
        assert!(matches!(&*events.recv().await.unwrap(), PeerPoolEvent::Added(_)));
        assert!(pool.contains(&PeerId::from(7)));

        server.disconnect(PeerId::from(7));
        assert!(matches!(&*events.recv().await.unwrap(), PeerPoolEvent::Removed(_)));
        assert!(pool.is_empty());

        pool.close().await;
        assert!(!server.is_started());
        shutdown.trigger();
    }
}
