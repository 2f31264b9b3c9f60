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
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
        Mutex,
        OnceLock,
        Weak,
    },
    time::Duration,
};

use async_trait::async_trait;
use chainsync_common_types::types::{BlockHash, PeerId};
use chainsync_core::{
    blocks::{BlockBody, BlockHeader},
    chain_storage::{ChainStorage, MemoryChainStorage},
    peers::{Peer, PeerPool, PeerSelection, PeerServer, PeerServerError, ServerEvent},
    protocol::{
        Capability,
        ChainStatus,
        GetBlockHeaders,
        HeaderOrigin,
        MessageSender,
        ProtocolConfig,
        ProtocolError,
        ProtocolMessage,
        ProtocolSession,
    },
    sync::{start_sync, SyncConfig, SyncHandle},
};
use tokio::sync::broadcast;

pub const NETWORK_ID: u64 = 1;

/// A transport that lets tests connect peers and records bans
pub struct TestServer {
    events: broadcast::Sender<ServerEvent>,
    bans: Mutex<Vec<(PeerId, Duration)>>,
}

impl TestServer {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(20);
        Arc::new(Self {
            events,
            bans: Mutex::new(Vec::new()),
        })
    }

    pub fn connect(&self, peer: Arc<Peer>) {
        assert!(self.events.send(ServerEvent::PeerConnected(peer)).is_ok());
    }

    pub fn banned(&self) -> Vec<PeerId> {
        self.bans.lock().unwrap().iter().map(|(id, _)| *id).collect()
    }
}

#[async_trait]
impl PeerServer for TestServer {
    fn name(&self) -> &str {
        "test"
    }

    fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.events.subscribe()
    }

    async fn open(&self) -> Result<(), PeerServerError> {
        Ok(())
    }

    async fn start(&self) -> Result<(), PeerServerError> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), PeerServerError> {
        Ok(())
    }

    async fn ban(&self, peer_id: &PeerId, duration: Duration) -> Result<(), PeerServerError> {
        self.bans.lock().unwrap().push((*peer_id, duration));
        Ok(())
    }
}

fn upgrade(session: &OnceLock<Weak<ProtocolSession>>) -> Result<Arc<ProtocolSession>, ProtocolError> {
    session.get().and_then(Weak::upgrade).ok_or(ProtocolError::SessionClosed)
}

/// Delivers everything sent on one session to the session at the other end
#[derive(Default)]
pub struct PipeSender {
    remote: OnceLock<Weak<ProtocolSession>>,
}

#[async_trait]
impl MessageSender for PipeSender {
    async fn send_status(&self, status: &ChainStatus) -> Result<(), ProtocolError> {
        upgrade(&self.remote)?.handle_status(status.clone());
        Ok(())
    }

    async fn send_message(&self, message: &ProtocolMessage) -> Result<(), ProtocolError> {
        upgrade(&self.remote)?.handle_message(message.clone());
        Ok(())
    }
}

/// Two sessions connected to each other
pub fn session_pair(capability: Capability) -> (Arc<ProtocolSession>, Arc<ProtocolSession>) {
    let left_sender = Arc::new(PipeSender::default());
    let right_sender = Arc::new(PipeSender::default());
    let left = Arc::new(ProtocolSession::new(
        capability,
        ProtocolConfig::default(),
        left_sender.clone(),
    ));
    let right = Arc::new(ProtocolSession::new(
        capability,
        ProtocolConfig::default(),
        right_sender.clone(),
    ));
    left_sender.remote.set(Arc::downgrade(&right)).unwrap();
    right_sender.remote.set(Arc::downgrade(&left)).unwrap();
    (left, right)
}

/// A node running the full sync stack over a test transport
pub struct TestNode {
    pub id: PeerId,
    pub server: Arc<TestServer>,
    pub pool: Arc<PeerPool>,
    pub storage: Arc<MemoryChainStorage>,
}

impl TestNode {
    pub fn new(id: u64, storage: Arc<MemoryChainStorage>, required: Vec<Capability>) -> Self {
        let server = TestServer::new();
        let pool = PeerPool::new(vec![server.clone()], required).with_selection(PeerSelection::Lowest);
        Self {
            id: PeerId::from(id),
            server,
            pool: Arc::new(pool),
            storage,
        }
    }

    pub async fn start(&self, config: SyncConfig) -> SyncHandle {
        start_sync(config, self.pool.clone(), self.storage.clone()).await.unwrap()
    }
}

/// Connect `dialer` to `listener` with one session of `capability` on each side
pub fn connect_nodes(dialer: &TestNode, listener: &TestNode, capability: Capability) {
    let (outbound, inbound) = session_pair(capability);
    dialer.server.connect(Arc::new(Peer::new(
        listener.id,
        format!("listener-{}", listener.id.short_str()),
        false,
        dialer.server.clone(),
        vec![outbound],
    )));
    listener.server.connect(Arc::new(Peer::new(
        dialer.id,
        format!("dialer-{}", dialer.id.short_str()),
        true,
        listener.server.clone(),
        vec![inbound],
    )));
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Behaviour {
    Honest,
    /// Answers head queries and ignores everything else
    Silent,
    /// Adds a transaction to every body it serves
    ForgedBodies,
}

/// An eth peer that answers block requests from its own chain
pub struct RemoteNode {
    id: PeerId,
    storage: Arc<MemoryChainStorage>,
    behaviour: Behaviour,
    session: OnceLock<Weak<ProtocolSession>>,
    range_requests: AtomicUsize,
}

impl RemoteNode {
    pub fn new(id: u64, storage: Arc<MemoryChainStorage>, behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            id: PeerId::from(id),
            storage,
            behaviour,
            session: OnceLock::new(),
            range_requests: AtomicUsize::new(0),
        })
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    /// Number of header range requests received
    pub fn range_requests(&self) -> usize {
        self.range_requests.load(Ordering::SeqCst)
    }

    /// The peer through which the local node talks to this one
    pub fn connect(self: &Arc<Self>, server: &Arc<TestServer>) {
        let session = Arc::new(ProtocolSession::new(
            Capability::Eth,
            ProtocolConfig::default(),
            self.clone(),
        ));
        self.session.set(Arc::downgrade(&session)).unwrap();
        let address = format!("remote-{}", self.id.short_str());
        server.connect(Arc::new(Peer::new(self.id, address, false, server.clone(), vec![session])));
    }

    async fn status(&self) -> ChainStatus {
        let metadata = self.storage.chain_metadata().await.unwrap();
        ChainStatus {
            network_id: NETWORK_ID,
            total_difficulty: metadata.total_difficulty(),
            best_hash: *metadata.best_block_hash(),
            genesis_hash: self.storage.genesis_hash().await.unwrap(),
            head_number: Some(metadata.height()),
            serve_headers: false,
            flow_control: None,
        }
    }

    async fn headers(&self, request: &GetBlockHeaders) -> Vec<BlockHeader> {
        let start = match request.origin {
            HeaderOrigin::Number(number) => number,
            HeaderOrigin::Hash(hash) => match self.storage.fetch_header_by_hash(&hash).await.unwrap() {
                Some(header) => header.number,
                None => return Vec::new(),
            },
        };
        self.storage.fetch_headers(start, request.max as usize).await.unwrap()
    }

    async fn bodies(&self, hashes: &[BlockHash]) -> Vec<BlockBody> {
        let mut bodies = Vec::with_capacity(hashes.len());
        for hash in hashes {
            let header = match self.storage.fetch_header_by_hash(hash).await.unwrap() {
                Some(header) => header,
                None => break,
            };
            let mut body = self.storage.fetch_body(header.number).unwrap().unwrap_or_default();
            if self.behaviour == Behaviour::ForgedBodies {
                body.transactions.push(b"forged".to_vec());
            }
            bodies.push(body);
        }
        bodies
    }
}

#[async_trait]
impl MessageSender for RemoteNode {
    async fn send_status(&self, _status: &ChainStatus) -> Result<(), ProtocolError> {
        let status = self.status().await;
        upgrade(&self.session)?.handle_status(status);
        Ok(())
    }

    async fn send_message(&self, message: &ProtocolMessage) -> Result<(), ProtocolError> {
        let reply = match message {
            ProtocolMessage::GetBlockHeaders(request) => {
                let is_head_query = matches!(request.origin, HeaderOrigin::Hash(_)) && request.max == 1;
                if !is_head_query {
                    self.range_requests.fetch_add(1, Ordering::SeqCst);
                    if self.behaviour == Behaviour::Silent {
                        return Ok(());
                    }
                }
                ProtocolMessage::BlockHeaders {
                    headers: self.headers(request).await,
                    buffer_value: None,
                }
            },
            ProtocolMessage::GetBlockBodies(hashes) => ProtocolMessage::BlockBodies {
                bodies: self.bodies(hashes).await,
                buffer_value: None,
            },
            _ => return Ok(()),
        };
        upgrade(&self.session)?.handle_message(reply);
        Ok(())
    }
}
