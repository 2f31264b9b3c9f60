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

use async_trait::async_trait;
use chainsync_common_types::types::BlockHash;
use log::*;

use crate::{
    blocks::{Block, BlockHeader},
    chain_storage::ChainStorage,
    fetcher::{
        BlockFetchStrategy,
        BlockWriter,
        FetchStrategy,
        FetchWriter,
        HeaderFetchStrategy,
        HeaderRange,
        HeaderWriter,
    },
    peers::Peer,
    protocol::{Capability, FlowControl, GetBlockHeaders, ProtocolMessage},
    sync::{SyncError, SyncMode, SyncPeer},
};

const LOG_TARGET: &str = "c::sync::variant";

/// What a synchronizer fetches, from which peers, and where it is written
#[async_trait]
pub trait SyncVariant: Send + Sync + 'static {
    type Strategy: FetchStrategy<Task = HeaderRange>;

    fn mode(&self) -> SyncMode;

    fn capability(&self) -> Capability;

    /// Whether `peer` may be selected as a sync target
    fn syncable(&self, peer: &Peer) -> bool;

    /// Height of the head advertised by `target`
    async fn remote_height(&self, target: &SyncPeer) -> Result<u64, SyncError>;

    fn strategy(&self) -> Arc<Self::Strategy>;

    fn writer(&self, storage: Arc<dyn ChainStorage>) -> Arc<dyn FetchWriter<<Self::Strategy as FetchStrategy>::Item>>;
}

/// Full blocks over eth
#[derive(Default)]
pub struct FastSync {
    strategy: Arc<BlockFetchStrategy>,
}

impl FastSync {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SyncVariant for FastSync {
    type Strategy = BlockFetchStrategy;

    fn mode(&self) -> SyncMode {
        SyncMode::Fast
    }

    fn capability(&self) -> Capability {
        Capability::Eth
    }

    fn syncable(&self, peer: &Peer) -> bool {
        self.strategy.peer_filter(peer)
    }

    async fn remote_height(&self, target: &SyncPeer) -> Result<u64, SyncError> {
        fetch_head_number(target, Capability::Eth, None).await
    }

    fn strategy(&self) -> Arc<BlockFetchStrategy> {
        self.strategy.clone()
    }

    fn writer(&self, storage: Arc<dyn ChainStorage>) -> Arc<dyn FetchWriter<Block>> {
        Arc::new(BlockWriter::new(storage))
    }
}

/// Headers over les, from peers that serve them
pub struct LightSync {
    flow_control: Arc<FlowControl>,
    strategy: Arc<HeaderFetchStrategy>,
}

impl LightSync {
    pub fn new(flow_control: Arc<FlowControl>) -> Self {
        Self {
            strategy: Arc::new(HeaderFetchStrategy::new(flow_control.clone())),
            flow_control,
        }
    }
}

#[async_trait]
impl SyncVariant for LightSync {
    type Strategy = HeaderFetchStrategy;

    fn mode(&self) -> SyncMode {
        SyncMode::Light
    }

    fn capability(&self) -> Capability {
        Capability::Les
    }

    fn syncable(&self, peer: &Peer) -> bool {
        self.strategy.peer_filter(peer)
    }

    /// The announced head number is only trusted once the target produced the matching header
    async fn remote_height(&self, target: &SyncPeer) -> Result<u64, SyncError> {
        let height = fetch_head_number(target, Capability::Les, Some(&self.flow_control)).await?;
        match target.head_number() {
            Some(announced) if announced != height => Err(SyncError::RemoteHeightUnavailable {
                peer: *target.id(),
                details: format!("announced head #{} but its best header is #{}", announced, height),
            }),
            _ => Ok(height),
        }
    }

    fn strategy(&self) -> Arc<HeaderFetchStrategy> {
        self.strategy.clone()
    }

    fn writer(&self, storage: Arc<dyn ChainStorage>) -> Arc<dyn FetchWriter<BlockHeader>> {
        Arc::new(HeaderWriter::new(storage))
    }
}

/// Ask `target` for the header of the head it advertised
async fn fetch_head_number(
    target: &SyncPeer,
    capability: Capability,
    flow_control: Option<&FlowControl>,
) -> Result<u64, SyncError> {
    let best_hash = *target.best_hash();
    let unavailable = |details: String| SyncError::RemoteHeightUnavailable {
        peer: *target.id(),
        details,
    };

    let session = target.peer().session(capability)?;
    let request = ProtocolMessage::GetBlockHeaders(GetBlockHeaders::head(best_hash));
    let headers = match session.request(request).await? {
        ProtocolMessage::BlockHeaders { headers, buffer_value } => {
            if let (Some(flow_control), Some(buffer_value)) = (flow_control, buffer_value) {
                flow_control.handle_reply(target.id(), buffer_value);
            }
            headers
        },
        other => return Err(unavailable(format!("expected BlockHeaders, received {}", other))),
    };
    match headers.as_slice() {
        [header] if header.hash() == best_hash => {
            debug!(
                target: LOG_TARGET,
                "Peer {} is at height {}",
                target.id().short_str(),
                header.number
            );
            Ok(header.number)
        },
        _ => Err(unavailable(describe_mismatch(&best_hash, &headers))),
    }
}

fn describe_mismatch(best_hash: &BlockHash, headers: &[BlockHeader]) -> String {
    format!(
        "expected the header of {}, received {} header(s)",
        best_hash.short_str(),
        headers.len()
    )
}
