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

use std::sync::Arc;

use chainsync_shutdown::ShutdownSignal;
use log::*;
use tokio::sync::{broadcast::error::RecvError, watch};

use crate::{
    blocks::BlockHeader,
    chain_storage::{ChainStorage, ChainStorageError},
    peers::{Peer, PeerPool, PeerPoolEvent},
    protocol::{
        Capability,
        FlowControl,
        GetBlockHeaders,
        HeaderOrigin,
        MessageCode,
        ProtocolMessage,
        ProtocolSession,
        SessionState,
    },
};

const LOG_TARGET: &str = "c::sync::header_server";

/// Most headers returned for a single request
pub const MAX_HEADERS_SERVED: u64 = 192;

/// Answers les header requests from the local chain, charging every request against the requester's buffer
pub struct HeaderServer {
    pool: Arc<PeerPool>,
    storage: Arc<dyn ChainStorage>,
    flow_control: Arc<FlowControl>,
}

impl HeaderServer {
    pub fn new(pool: Arc<PeerPool>, storage: Arc<dyn ChainStorage>, flow_control: Arc<FlowControl>) -> Self {
        Self {
            pool,
            storage,
            flow_control,
        }
    }

    pub async fn run(self, mut shutdown: ShutdownSignal) {
        let server = Arc::new(self);
        let mut events = server.pool.subscribe();
        for peer in server.pool.peers() {
            server.clone().spawn_serve(peer, shutdown.clone());
        }

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => match &*event {
                        PeerPoolEvent::Added(peer) => server.clone().spawn_serve(peer.clone(), shutdown.clone()),
                        PeerPoolEvent::Removed(peer_id) => server.flow_control.remove_peer(peer_id),
                        _ => {},
                    },
                    Err(RecvError::Lagged(n)) => {
                        warn!(target: LOG_TARGET, "Header server lagged behind by {} pool event(s)", n);
                    },
                    Err(RecvError::Closed) => break,
                },
                _ = shutdown.wait() => break,
            }
        }
        debug!(target: LOG_TARGET, "Header server exiting");
    }

    fn spawn_serve(self: Arc<Self>, peer: Arc<Peer>, shutdown: ShutdownSignal) {
        if peer.supports(Capability::Les) {
            tokio::spawn(self.serve_peer(peer, shutdown));
        }
    }

    /// Serve requests arriving on the les session of `peer` until the session closes
    pub async fn serve_peer(self: Arc<Self>, peer: Arc<Peer>, mut shutdown: ShutdownSignal) {
        let session = match peer.session(Capability::Les) {
            Ok(session) => session.clone(),
            Err(err) => {
                debug!(target: LOG_TARGET, "Not serving {}: {}", peer, err);
                return;
            },
        };
        let mut messages = session.subscribe();
        let closed = wait_closed(session.watch_state());
        tokio::pin!(closed);

        loop {
            tokio::select! {
                message = messages.recv() => match message {
                    Ok(message) => {
                        if let ProtocolMessage::GetBlockHeaders(request) = &*message {
                            if !self.serve(&peer, &session, request).await {
                                break;
                            }
                        }
                    },
                    Err(RecvError::Lagged(n)) => {
                        warn!(target: LOG_TARGET, "Dropped {} message(s) from {}", n, peer);
                    },
                    Err(RecvError::Closed) => break,
                },
                _ = &mut closed => break,
                _ = shutdown.wait() => break,
            }
        }
        trace!(target: LOG_TARGET, "Stopped serving {}", peer);
    }

    /// Answer one request. Returns false if the peer was dropped.
    async fn serve(&self, peer: &Peer, session: &ProtocolSession, request: &GetBlockHeaders) -> bool {
        let buffer_value = match self
            .flow_control
            .handle_request(peer.id(), MessageCode::GetBlockHeaders, request.max)
        {
            Ok(buffer_value) => match u64::try_from(buffer_value) {
                Ok(buffer_value) => buffer_value,
                Err(_) => {
                    warn!(
                        target: LOG_TARGET,
                        "{} exceeded its request budget, dropping it", peer
                    );
                    self.pool.remove(peer.id());
                    return false;
                },
            },
            Err(err) => {
                warn!(target: LOG_TARGET, "Cannot serve headers to {}: {}", peer, err);
                return true;
            },
        };

        let headers = match self.collect_headers(request).await {
            Ok(headers) => headers,
            Err(err) => {
                warn!(target: LOG_TARGET, "Could not read headers for {}: {}", peer, err);
                return true;
            },
        };
        trace!(
            target: LOG_TARGET,
            "Serving {} header(s) to {}, buffer value {}",
            headers.len(),
            peer,
            buffer_value
        );
        let reply = ProtocolMessage::BlockHeaders {
            headers,
            buffer_value: Some(buffer_value),
        };
        match session.send(&reply).await {
            Ok(()) => true,
            Err(err) => {
                debug!(target: LOG_TARGET, "Could not reply to {}: {}", peer, err);
                false
            },
        }
    }

    async fn collect_headers(&self, request: &GetBlockHeaders) -> Result<Vec<BlockHeader>, ChainStorageError> {
        let count = request.max.min(MAX_HEADERS_SERVED);
        if count == 0 {
            return Ok(Vec::new());
        }
        let origin = match request.origin {
            HeaderOrigin::Number(number) => number,
            HeaderOrigin::Hash(hash) => match self.storage.fetch_header_by_hash(&hash).await? {
                Some(header) => header.number,
                None => return Ok(Vec::new()),
            },
        };
        if request.skip == 0 && !request.reverse {
            return self.storage.fetch_headers(origin, count as usize).await;
        }

        let step = request.skip.saturating_add(1);
        let mut headers = Vec::new();
        let mut number = Some(origin);
        while let Some(n) = number {
            if headers.len() as u64 >= count {
                break;
            }
            match self.storage.fetch_headers(n, 1).await?.pop() {
                Some(header) => headers.push(header),
                None => break,
            }
            number = if request.reverse {
                n.checked_sub(step)
            } else {
                n.checked_add(step)
            };
        }
        Ok(headers)
    }
}

async fn wait_closed(mut state: watch::Receiver<SessionState>) {
    let _result = state.wait_for(|s| *s == SessionState::Closed).await;
}

#[cfg(test)]
mod test {
    use chainsync_common_types::types::PeerId;
    use chainsync_shutdown::Shutdown;
    use tokio::{sync::mpsc, time::Duration};

    use super::*;
    use crate::{
        chain_storage::MemoryChainStorage,
        protocol::{FlowControlParams, ProtocolConfig},
        test_helpers::{build_headers, create_status, genesis, MockSender, MockServer, SentMessage},
    };

    struct TestServer {
        server: Arc<HeaderServer>,
        pool: Arc<PeerPool>,
        headers: Vec<BlockHeader>,
    }

    async fn create_server(params: FlowControlParams) -> TestServer {
        let storage = Arc::new(MemoryChainStorage::new(genesis()));
        let headers = build_headers(&genesis(), 20);
        storage.put_headers(headers.clone()).await.unwrap();
        let pool = Arc::new(PeerPool::new(vec![], vec![]));
        let server = Arc::new(HeaderServer::new(
            pool.clone(),
            storage,
            Arc::new(FlowControl::new(params)),
        ));
        TestServer { server, pool, headers }
    }

    async fn create_client(pool: &PeerPool) -> (Arc<Peer>, mpsc::UnboundedReceiver<SentMessage>) {
        let (sender, mut sent) = MockSender::new();
        let session = Arc::new(ProtocolSession::new(Capability::Les, ProtocolConfig::default(), sender));
        session.handle_status(create_status(1));
        session.handshake(&create_status(1)).await.unwrap();
        assert!(matches!(sent.recv().await, Some(SentMessage::Status(_))));
        let peer = Arc::new(Peer::new(PeerId::from(7), "10.0.0.1:30303", true, MockServer::new(), vec![session]));
        pool.add(peer.clone());
        (peer, sent)
    }

    async fn reply_to(sent: &mut mpsc::UnboundedReceiver<SentMessage>) -> (Vec<BlockHeader>, Option<u64>) {
        match tokio::time::timeout(Duration::from_secs(5), sent.recv()).await {
            Ok(Some(SentMessage::Message(ProtocolMessage::BlockHeaders { headers, buffer_value }))) => {
                (headers, buffer_value)
            },
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[tokio::test]
    async fn it_serves_header_queries() {
        let test = create_server(FlowControlParams::default()).await;
        let (peer, mut sent) = create_client(&test.pool).await;
        let session = peer.session(Capability::Les).unwrap().clone();
        let shutdown = Shutdown::new();
        let task = tokio::spawn(test.server.clone().serve_peer(peer.clone(), shutdown.to_signal()));
        tokio::task::yield_now().await;

        session.handle_message(ProtocolMessage::GetBlockHeaders(GetBlockHeaders::range(3, 4)));
        let (headers, buffer_value) = reply_to(&mut sent).await;
        assert_eq!(headers, test.headers[2..6].to_vec());
        assert_eq!(buffer_value, Some(300_000_000 - 150_000 - 4 * 30_000));

        let hash = test.headers[9].hash();
        session.handle_message(ProtocolMessage::GetBlockHeaders(GetBlockHeaders {
            origin: HeaderOrigin::Hash(hash),
            max: 3,
            skip: 2,
            reverse: true,
        }));
        let (headers, _) = reply_to(&mut sent).await;
        let numbers = headers.iter().map(|h| h.number).collect::<Vec<_>>();
        assert_eq!(numbers, vec![10, 7, 4]);

        session.handle_message(ProtocolMessage::GetBlockHeaders(GetBlockHeaders::range(18, 10)));
        let (headers, _) = reply_to(&mut sent).await;
        assert_eq!(headers.len(), 3);

        test.pool.remove(peer.id());
        task.await.unwrap();
    }

    #[tokio::test]
    async fn it_drops_peers_that_exceed_their_buffer() {
        let params = FlowControlParams {
            buffer_limit: 150_000 + 5 * 30_000,
            max_recharge: 0,
            ..Default::default()
        };
        let test = create_server(params).await;
        let (peer, mut sent) = create_client(&test.pool).await;
        let session = peer.session(Capability::Les).unwrap().clone();
        let shutdown = Shutdown::new();
        let task = tokio::spawn(test.server.clone().serve_peer(peer.clone(), shutdown.to_signal()));
        tokio::task::yield_now().await;

        session.handle_message(ProtocolMessage::GetBlockHeaders(GetBlockHeaders::range(1, 5)));
        let (headers, buffer_value) = reply_to(&mut sent).await;
        assert_eq!(headers.len(), 5);
        assert_eq!(buffer_value, Some(0));

        session.handle_message(ProtocolMessage::GetBlockHeaders(GetBlockHeaders::range(6, 1)));
        task.await.unwrap();
        assert!(!test.pool.contains(peer.id()));
        assert_eq!(session.state(), SessionState::Closed);
    }
}
