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

use chainsync_core::{
    blocks::{Block, BlockBody, BlockHeader},
    chain_storage::{ChainStorage, MemoryChainStorage},
};

pub fn create_genesis() -> BlockHeader {
    BlockHeader::genesis(1.into())
}

/// `count` blocks on top of `from`, each carrying one transaction
pub fn build_blocks(from: &BlockHeader, count: usize) -> Vec<Block> {
    let mut prev = from.clone();
    (0..count)
        .map(|_| {
            let mut header = BlockHeader::from_previous(&prev);
            let body = BlockBody::new(vec![format!("tx-{}", header.number).into_bytes()]);
            header.transactions_root = body.transactions_root();
            prev = header.clone();
            Block::new(header, body)
        })
        .collect()
}

/// A chain of `height` blocks on top of the shared genesis
pub async fn create_chain(height: usize) -> Arc<MemoryChainStorage> {
    let genesis = create_genesis();
    let storage = Arc::new(MemoryChainStorage::new(genesis.clone()));
    if height > 0 {
        storage.put_blocks(build_blocks(&genesis, height)).await.unwrap();
    }
    storage
}
