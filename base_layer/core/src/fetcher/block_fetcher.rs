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

use async_trait::async_trait;

use super::header_fetcher::validate_headers;
use crate::{
    blocks::{Block, BlockBody, BlockHeader},
    fetcher::{FetchStrategy, HeaderRange, ProcessOutcome, RequestError},
    peers::Peer,
    protocol::{Capability, GetBlockHeaders, ProtocolMessage},
};

/// Fetches full blocks from eth peers: the headers of a range, then the bodies for those headers
#[derive(Debug, Clone, Default)]
pub struct BlockFetchStrategy;

impl BlockFetchStrategy {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FetchStrategy for BlockFetchStrategy {
    type Item = Block;
    type Reply = (Vec<BlockHeader>, Vec<BlockBody>);
    type Task = HeaderRange;

    fn peer_filter(&self, peer: &Peer) -> bool {
        peer.session(Capability::Eth).map_or(false, |s| s.is_ready())
    }

    async fn request(&self, task: &HeaderRange, peer: &Peer) -> Result<Self::Reply, RequestError> {
        let session = peer.session(Capability::Eth)?;
        let request = ProtocolMessage::GetBlockHeaders(GetBlockHeaders::range(task.first, task.count));
        let headers = match session.request(request).await? {
            ProtocolMessage::BlockHeaders { headers, .. } => headers,
            other => {
                return Err(RequestError::Malformed(format!(
                    "expected BlockHeaders, received {}",
                    other
                )))
            },
        };
        if headers.is_empty() {
            return Ok((headers, Vec::new()));
        }

        let hashes = headers.iter().map(BlockHeader::hash).collect();
        match session.request(ProtocolMessage::GetBlockBodies(hashes)).await? {
            ProtocolMessage::BlockBodies { bodies, .. } => Ok((headers, bodies)),
            other => Err(RequestError::Malformed(format!("expected BlockBodies, received {}", other))),
        }
    }

    fn process(&self, task: &HeaderRange, _peer: &Peer, (headers, bodies): Self::Reply) -> ProcessOutcome<Block> {
        if let Err(reason) = validate_headers(task.first, task.count, &headers) {
            return ProcessOutcome::Retry(reason);
        }
        if bodies.len() != headers.len() {
            return ProcessOutcome::Retry(format!(
                "received {} bodies for {} header(s)",
                bodies.len(),
                headers.len()
            ));
        }
        let blocks = headers
            .into_iter()
            .zip(bodies)
            .map(|(header, body)| Block::new(header, body))
            .collect::<Vec<_>>();
        if let Some(block) = blocks.iter().find(|b| !b.is_body_consistent()) {
            return ProcessOutcome::Retry(format!(
                "body of block #{} does not match its transaction root",
                block.number()
            ));
        }
        ProcessOutcome::Complete(blocks)
    }
}
