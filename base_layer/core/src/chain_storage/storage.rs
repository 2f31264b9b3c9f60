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
use chainsync_common_types::{
    chain_metadata::ChainMetadata,
    types::{BlockHash, Difficulty},
};

use crate::{
    blocks::{Block, BlockHeader},
    chain_storage::ChainStorageError,
};

/// The local chain as seen by the synchronizer. Every call is atomic: a rejected write leaves the chain unchanged.
#[async_trait]
pub trait ChainStorage: Send + Sync + 'static {
    /// Height of the local tip
    async fn height(&self) -> Result<u64, ChainStorageError>;

    /// Accumulated difficulty of the local chain up to and including the tip
    async fn total_difficulty(&self) -> Result<Difficulty, ChainStorageError>;

    async fn latest_hash(&self) -> Result<BlockHash, ChainStorageError>;

    async fn genesis_hash(&self) -> Result<BlockHash, ChainStorageError>;

    /// Append blocks, in ascending order, on top of the tip
    async fn put_blocks(&self, blocks: Vec<Block>) -> Result<(), ChainStorageError>;

    /// Append headers, in ascending order, on top of the tip
    async fn put_headers(&self, headers: Vec<BlockHeader>) -> Result<(), ChainStorageError>;

    /// Fetch up to `max` consecutive headers starting at `start`. Fewer are returned when the tip is reached.
    async fn fetch_headers(&self, start: u64, max: usize) -> Result<Vec<BlockHeader>, ChainStorageError>;

    async fn fetch_header_by_hash(&self, hash: &BlockHash) -> Result<Option<BlockHeader>, ChainStorageError>;

    async fn chain_metadata(&self) -> Result<ChainMetadata, ChainStorageError> {
        Ok(ChainMetadata::new(
            self.height().await?,
            self.latest_hash().await?,
            self.total_difficulty().await?,
        ))
    }
}
