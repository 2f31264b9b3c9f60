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

use chainsync_common::log_if_error;
use chainsync_shutdown::ShutdownSignal;
use futures::{stream::FuturesUnordered, StreamExt};
use log::*;
use tokio::sync::broadcast::error::RecvError;

use crate::{
    chain_storage::{ChainStorage, ChainStorageError},
    peers::{Peer, PeerPool, PeerPoolEvent},
    protocol::{Capability, ChainStatus, FlowControlParams},
    sync::SyncConfig,
};

const LOG_TARGET: &str = "c::sync::handshaker";

/// Negotiates every session of every peer that joins the pool. Peers that fail a handshake are dropped.
pub struct PeerHandshaker {
    pool: Arc<PeerPool>,
    storage: Arc<dyn ChainStorage>,
    network_id: u64,
    light_serve: bool,
    flow_control: FlowControlParams,
}

impl PeerHandshaker {
    pub fn new(config: &SyncConfig, pool: Arc<PeerPool>, storage: Arc<dyn ChainStorage>) -> Self {
        Self {
            pool,
            storage,
            network_id: config.network_id,
            light_serve: config.light_serve,
            flow_control: config.flow_control.clone(),
        }
    }

    /// The status announced over `capability`, taken from the current local chain
    pub async fn local_status(&self, capability: Capability) -> Result<ChainStatus, ChainStorageError> {
        let metadata = self.storage.chain_metadata().await?;
        let serve_headers = self.light_serve && capability == Capability::Les;
        Ok(ChainStatus {
            network_id: self.network_id,
            total_difficulty: metadata.total_difficulty(),
            best_hash: *metadata.best_block_hash(),
            genesis_hash: self.storage.genesis_hash().await?,
            head_number: Some(metadata.height()),
            serve_headers,
            flow_control: serve_headers.then(|| self.flow_control.clone()),
        })
    }

    pub async fn handshake(&self, peer: Arc<Peer>) {
        for session in peer.sessions() {
            if session.is_ready() {
                continue;
            }
            let local = match log_if_error!(
                target: LOG_TARGET,
                "Could not build the local status: {}",
                self.local_status(session.capability()).await
            ) {
                Some(local) => local,
                None => return,
            };
            match session.handshake(&local).await {
                Ok(remote) => debug!(
                    target: LOG_TARGET,
                    "{} handshake with {} complete: {}",
                    session.capability(),
                    peer,
                    remote
                ),
                Err(err) => {
                    debug!(
                        target: LOG_TARGET,
                        "Dropping {} after failed {} handshake: {}",
                        peer,
                        session.capability(),
                        err
                    );
                    self.pool.remove(peer.id());
                    return;
                },
            }
        }
    }

    pub async fn run(self, mut shutdown: ShutdownSignal) {
        let mut events = self.pool.subscribe();
        let mut pending = self
            .pool
            .peers()
            .into_iter()
            .map(|peer| self.handshake(peer))
            .collect::<FuturesUnordered<_>>();

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => {
                        if let PeerPoolEvent::Added(peer) = &*event {
                            pending.push(self.handshake(peer.clone()));
                        }
                    },
                    Err(RecvError::Lagged(n)) => {
                        warn!(target: LOG_TARGET, "Handshaker lagged behind by {} pool event(s)", n);
                        for peer in self.pool.peers() {
                            pending.push(self.handshake(peer));
                        }
                    },
                    Err(RecvError::Closed) => break,
                },
                Some(()) = pending.next(), if !pending.is_empty() => {},
                _ = shutdown.wait() => break,
            }
        }
        debug!(target: LOG_TARGET, "Handshaker exiting");
    }
}

#[cfg(test)]
mod test {
    use chainsync_common_types::types::PeerId;
    use chainsync_shutdown::Shutdown;
    use tokio::time::{self, Duration};

    use super::*;
    use crate::{
        chain_storage::MemoryChainStorage,
        protocol::SessionState,
        test_helpers::{create_peer, create_status, genesis, MockServer},
    };

    fn create_handshaker(light_serve: bool) -> PeerHandshaker {
        let config = SyncConfig {
            light_serve,
            ..Default::default()
        };
        let pool = Arc::new(PeerPool::new(vec![], vec![]));
        let storage = Arc::new(MemoryChainStorage::new(genesis()));
        PeerHandshaker::new(&config, pool, storage)
    }

    #[tokio::test]
    async fn it_announces_the_local_chain() {
        let handshaker = create_handshaker(true);
        let status = handshaker.local_status(Capability::Les).await.unwrap();
        assert_eq!(status.network_id, 1);
        assert_eq!(status.genesis_hash, genesis().hash());
        assert_eq!(status.best_hash, genesis().hash());
        assert_eq!(status.head_number, Some(0));
        assert!(status.serve_headers);
        assert!(status.flow_control.is_some());

        let status = handshaker.local_status(Capability::Eth).await.unwrap();
        assert!(!status.serve_headers);
        assert!(status.flow_control.is_none());
    }

    #[tokio::test]
    async fn it_completes_handshakes_of_joining_peers() {
        let handshaker = create_handshaker(false);
        let pool = handshaker.pool.clone();
        let mut shutdown = Shutdown::new();
        let task = tokio::spawn(handshaker.run(shutdown.to_signal()));
        tokio::task::yield_now().await;

        let peer = create_peer(PeerId::from(1), &[Capability::Eth], MockServer::new());
        let session = peer.session(Capability::Eth).unwrap().clone();
        session.handle_status(create_status(5));
        pool.add(peer);

        let mut state = session.watch_state();
        time::timeout(Duration::from_secs(5), state.wait_for(|s| *s == SessionState::Ready))
            .await
            .unwrap()
            .unwrap();
        assert!(pool.contains(&PeerId::from(1)));
        shutdown.trigger();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn it_drops_peers_that_fail_the_handshake() {
        let handshaker = create_handshaker(false);
        let pool = handshaker.pool.clone();
        let silent = create_peer(PeerId::from(1), &[Capability::Eth], MockServer::new());
        let foreign = create_peer(PeerId::from(2), &[Capability::Eth], MockServer::new());
        let mut status = create_status(5);
        status.network_id = 2;
        foreign.session(Capability::Eth).unwrap().handle_status(status);
        pool.add(silent.clone());
        pool.add(foreign.clone());

        let mut shutdown = Shutdown::new();
        let task = tokio::spawn(handshaker.run(shutdown.to_signal()));
        time::sleep(Duration::from_secs(11)).await;

        assert!(pool.is_empty());
        assert_eq!(silent.session(Capability::Eth).unwrap().state(), SessionState::Closed);
        assert_eq!(foreign.session(Capability::Eth).unwrap().state(), SessionState::Closed);
        shutdown.trigger();
        task.await.unwrap();
    }
}
