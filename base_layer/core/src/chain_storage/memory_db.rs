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

//! A memory-backed chain storage. All data is lost when the program ends, so it is mainly useful for testing and
//! for light clients that do not persist their header chain.

use std::{
    collections::HashMap,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use async_trait::async_trait;
use chainsync_common_types::types::{BlockHash, Difficulty};
use log::*;

use crate::{
    blocks::{Block, BlockBody, BlockHeader},
    chain_storage::{ChainStorage, ChainStorageError},
};

const LOG_TARGET: &str = "c::cs::memory_db";

struct InnerDatabase {
    headers: Vec<BlockHeader>,
    /// Accumulated difficulty at each height
    total_difficulties: Vec<Difficulty>,
    hashes: HashMap<BlockHash, u64>,
    bodies: HashMap<u64, BlockBody>,
}

impl InnerDatabase {
    fn tip(&self) -> &BlockHeader {
        // The genesis header is inserted on construction and never removed
        &self.headers[self.headers.len() - 1]
    }

    fn tip_difficulty(&self) -> Difficulty {
        self.total_difficulties[self.total_difficulties.len() - 1]
    }

    /// Checks that `headers` extend the tip and returns the accumulated difficulty at each of them
    fn accumulate(&self, headers: &[&BlockHeader]) -> Result<Vec<Difficulty>, ChainStorageError> {
        let mut prev = self.tip();
        let mut total = self.tip_difficulty();
        let mut totals = Vec::with_capacity(headers.len());
        for header in headers.iter().copied() {
            if header.number != prev.number + 1 {
                return Err(ChainStorageError::DiscontinuousHeight {
                    expected: prev.number + 1,
                    actual: header.number,
                });
            }
            let expected = prev.hash();
            if header.parent_hash != expected {
                return Err(ChainStorageError::InvalidParent {
                    number: header.number,
                    expected,
                    actual: header.parent_hash,
                });
            }
            total = total
                .checked_add(header.difficulty)
                .ok_or(ChainStorageError::DifficultyOverflow { number: header.number })?;
            totals.push(total);
            prev = header;
        }
        Ok(totals)
    }

    fn append(&mut self, header: BlockHeader, total: Difficulty) {
        self.hashes.insert(header.hash(), header.number);
        self.total_difficulties.push(total);
        self.headers.push(header);
    }
}

/// A memory-backed [`ChainStorage`] holding a single header chain rooted at a genesis header, plus the bodies of
/// blocks written with `put_blocks`.
pub struct MemoryChainStorage {
    db: RwLock<InnerDatabase>,
}

impl MemoryChainStorage {
    pub fn new(genesis: BlockHeader) -> Self {
        let mut hashes = HashMap::new();
        hashes.insert(genesis.hash(), genesis.number);
        Self {
            db: RwLock::new(InnerDatabase {
                total_difficulties: vec![genesis.difficulty],
                headers: vec![genesis],
                hashes,
                bodies: HashMap::new(),
            }),
        }
    }

    pub fn fetch_body(&self, number: u64) -> Result<Option<BlockBody>, ChainStorageError> {
        Ok(self.db_read_access()?.bodies.get(&number).cloned())
    }

    fn db_read_access(&self) -> Result<RwLockReadGuard<InnerDatabase>, ChainStorageError> {
        self.db.read().map_err(|e| {
            error!(target: LOG_TARGET, "Read lock on the memory database is poisoned: {}", e);
            ChainStorageError::AccessError(e.to_string())
        })
    }

    fn db_write_access(&self) -> Result<RwLockWriteGuard<InnerDatabase>, ChainStorageError> {
        self.db.write().map_err(|e| {
            error!(target: LOG_TARGET, "Write lock on the memory database is poisoned: {}", e);
            ChainStorageError::AccessError(e.to_string())
        })
    }
}

#[async_trait]
impl ChainStorage for MemoryChainStorage {
    async fn height(&self) -> Result<u64, ChainStorageError> {
        Ok(self.db_read_access()?.tip().number)
    }

    async fn total_difficulty(&self) -> Result<Difficulty, ChainStorageError> {
        Ok(self.db_read_access()?.tip_difficulty())
    }

    async fn latest_hash(&self) -> Result<BlockHash, ChainStorageError> {
        Ok(self.db_read_access()?.tip().hash())
    }

    async fn genesis_hash(&self) -> Result<BlockHash, ChainStorageError> {
        Ok(self.db_read_access()?.headers[0].hash())
    }

    async fn put_blocks(&self, blocks: Vec<Block>) -> Result<(), ChainStorageError> {
        let mut db = self.db_write_access()?;
        let totals = db.accumulate(&blocks.iter().map(|b| &b.header).collect::<Vec<_>>())?;
        if let Some(block) = blocks.iter().find(|b| !b.is_body_consistent()) {
            return Err(ChainStorageError::InconsistentBody { number: block.number() });
        }
        for (block, total) in blocks.into_iter().zip(totals) {
            db.bodies.insert(block.header.number, block.body);
            db.append(block.header, total);
        }
        trace!(target: LOG_TARGET, "Tip is now #{}", db.tip().number);
        Ok(())
    }

    async fn put_headers(&self, headers: Vec<BlockHeader>) -> Result<(), ChainStorageError> {
        let mut db = self.db_write_access()?;
        let totals = db.accumulate(&headers.iter().collect::<Vec<_>>())?;
        for (header, total) in headers.into_iter().zip(totals) {
            db.append(header, total);
        }
        trace!(target: LOG_TARGET, "Header tip is now #{}", db.tip().number);
        Ok(())
    }

    async fn fetch_headers(&self, start: u64, max: usize) -> Result<Vec<BlockHeader>, ChainStorageError> {
        let db = self.db_read_access()?;
        let start = usize::try_from(start).unwrap_or(usize::MAX);
        Ok(db.headers.iter().skip(start).take(max).cloned().collect())
    }

    async fn fetch_header_by_hash(&self, hash: &BlockHash) -> Result<Option<BlockHeader>, ChainStorageError> {
        let db = self.db_read_access()?;
        Ok(db
            .hashes
            .get(hash)
            .and_then(|n| usize::try_from(*n).ok())
            .and_then(|n| db.headers.get(n))
            .cloned())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn build_headers(from: &BlockHeader, count: usize) -> Vec<BlockHeader> {
        let mut prev = from.clone();
        (0..count)
            .map(|_| {
                prev = BlockHeader::from_previous(&prev);
                prev.clone()
            })
            .collect()
    }

    #[tokio::test]
    async fn it_accumulates_total_difficulty() {
        let genesis = BlockHeader::genesis(5.into());
        let db = MemoryChainStorage::new(genesis.clone());
        assert_eq!(db.height().await.unwrap(), 0);
        assert_eq!(db.genesis_hash().await.unwrap(), genesis.hash());

        let headers = build_headers(&genesis, 3);
        db.put_headers(headers.clone()).await.unwrap();
        assert_eq!(db.height().await.unwrap(), 3);
        assert_eq!(db.total_difficulty().await.unwrap(), Difficulty::from(20));
        assert_eq!(db.latest_hash().await.unwrap(), headers[2].hash());
        let metadata = db.chain_metadata().await.unwrap();
        assert_eq!(metadata.height(), 3);
    }

    #[tokio::test]
    async fn it_rejects_unlinked_writes_atomically() {
        let genesis = BlockHeader::genesis(1.into());
        let db = MemoryChainStorage::new(genesis.clone());
        let mut headers = build_headers(&genesis, 3);
        headers[2].parent_hash = BlockHash::zero();
        let err = db.put_headers(headers.clone()).await.unwrap_err();
        assert!(matches!(err, ChainStorageError::InvalidParent { number: 3, .. }));
        assert_eq!(db.height().await.unwrap(), 0);

        let err = db.put_headers(headers[1..].to_vec()).await.unwrap_err();
        assert_eq!(err, ChainStorageError::DiscontinuousHeight { expected: 1, actual: 2 });
    }

    #[tokio::test]
    async fn it_rejects_writes_that_overflow_total_difficulty() {
        let genesis = BlockHeader::genesis(1.into());
        let db = MemoryChainStorage::new(genesis.clone());
        let mut headers = build_headers(&genesis, 2);
        headers[1].difficulty = Difficulty::MAX;
        let err = db.put_headers(headers.clone()).await.unwrap_err();
        assert_eq!(err, ChainStorageError::DifficultyOverflow { number: 2 });

        // Nothing was written and the storage is still usable
        assert_eq!(db.height().await.unwrap(), 0);
        assert_eq!(db.total_difficulty().await.unwrap(), Difficulty::from(1));
        db.put_headers(headers[..1].to_vec()).await.unwrap();
        assert_eq!(db.height().await.unwrap(), 1);

        let mut block = build_headers(&headers[0], 1).remove(0);
        block.difficulty = Difficulty::MAX;
        let body = BlockBody::empty();
        block.transactions_root = body.transactions_root();
        let err = db.put_blocks(vec![Block::new(block, body)]).await.unwrap_err();
        assert_eq!(err, ChainStorageError::DifficultyOverflow { number: 2 });
        assert_eq!(db.height().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn it_stores_block_bodies() {
        let genesis = BlockHeader::genesis(1.into());
        let db = MemoryChainStorage::new(genesis.clone());
        let body = BlockBody::new(vec![vec![9; 4]]);
        let mut header = BlockHeader::from_previous(&genesis);
        header.transactions_root = body.transactions_root();
        db.put_blocks(vec![Block::new(header.clone(), body.clone())]).await.unwrap();
        assert_eq!(db.fetch_body(1).unwrap(), Some(body));

        let bad = Block::new(BlockHeader::from_previous(&header), BlockBody::new(vec![vec![1]]));
        let err = db.put_blocks(vec![bad]).await.unwrap_err();
        assert_eq!(err, ChainStorageError::InconsistentBody { number: 2 });
    }

    #[tokio::test]
    async fn it_serves_header_ranges() {
        let genesis = BlockHeader::genesis(1.into());
        let db = MemoryChainStorage::new(genesis.clone());
        let headers = build_headers(&genesis, 5);
        db.put_headers(headers.clone()).await.unwrap();
        assert_eq!(db.fetch_headers(2, 2).await.unwrap(), headers[1..3].to_vec());
        assert_eq!(db.fetch_headers(4, 10).await.unwrap().len(), 2);
        assert!(db.fetch_headers(10, 10).await.unwrap().is_empty());
        assert_eq!(
            db.fetch_header_by_hash(&headers[3].hash()).await.unwrap(),
            Some(headers[3].clone())
        );
        assert_eq!(db.fetch_header_by_hash(&BlockHash::zero()).await.unwrap(), None);
    }
}
