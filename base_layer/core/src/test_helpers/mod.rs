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

//! Common test helper functions that are small and useful enough to be included in the main crate, rather than the
//! integration test folder.

mod mocks;
pub use mocks::{MockSender, MockServer, SentMessage};

use std::sync::Arc;

use chainsync_common_types::types::PeerId;
use tokio::sync::mpsc;

use crate::{
    blocks::{Block, BlockBody, BlockHeader},
    peers::Peer,
    protocol::{Capability, ChainStatus, ProtocolConfig, ProtocolSession},
};

pub const NETWORK_ID: u64 = 1;

pub fn genesis() -> BlockHeader {
    BlockHeader::genesis(1.into())
}

/// A status on the test network advertising `total_difficulty`
pub fn create_status(total_difficulty: u64) -> ChainStatus {
    ChainStatus {
        network_id: NETWORK_ID,
        total_difficulty: total_difficulty.into(),
        best_hash: genesis().hash(),
        genesis_hash: genesis().hash(),
        head_number: None,
        serve_headers: true,
        flow_control: None,
    }
}

/// `count` empty headers on top of `from`
pub fn build_headers(from: &BlockHeader, count: usize) -> Vec<BlockHeader> {
    let mut prev = from.clone();
    (0..count)
        .map(|_| {
            prev = BlockHeader::from_previous(&prev);
            prev.clone()
        })
        .collect()
}

/// `count` blocks on top of `from`, each with a single transaction holding its number
pub fn build_blocks(from: &BlockHeader, count: usize) -> Vec<Block> {
    let mut prev = from.clone();
    (0..count)
        .map(|_| {
            let mut header = BlockHeader::from_previous(&prev);
            let body = BlockBody::new(vec![header.number.to_be_bytes().to_vec()]);
            header.transactions_root = body.transactions_root();
            prev = header.clone();
            Block::new(header, body)
        })
        .collect()
}

/// A peer with unconnected sessions for `capabilities` that record what is sent to them
pub fn create_peer(id: PeerId, capabilities: &[Capability], server: Arc<MockServer>) -> Arc<Peer> {
    let sessions = capabilities
        .iter()
        .map(|c| {
            let (sender, _) = MockSender::new();
            Arc::new(ProtocolSession::new(*c, ProtocolConfig::default(), sender))
        })
        .collect();
    Arc::new(Peer::new(id, "127.0.0.1:30303", false, server, sessions))
}

/// A peer with a single session that completed a handshake in which the peer announced `status`
pub async fn create_ready_peer(id: PeerId, capability: Capability, status: ChainStatus) -> Arc<Peer> {
    create_listening_peer(id, capability, status).await.0
}

/// Like [`create_ready_peer`], also returning everything sent to the peer after the handshake
pub async fn create_listening_peer(
    id: PeerId,
    capability: Capability,
    status: ChainStatus,
) -> (Arc<Peer>, mpsc::UnboundedReceiver<SentMessage>) {
    let (sender, mut sent) = MockSender::new();
    let session = Arc::new(ProtocolSession::new(capability, ProtocolConfig::default(), sender));
    session.handle_status(status);
    session.handshake(&create_status(0)).await.unwrap();
    assert!(matches!(sent.try_recv(), Ok(SentMessage::Status(_))));
    let peer = Arc::new(Peer::new(id, "127.0.0.1:30303", false, MockServer::new(), vec![session]));
    (peer, sent)
}
