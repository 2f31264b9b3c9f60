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

use chainsync_common_types::types::{BlockHash, Difficulty, FixedHash};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

use crate::blocks::BlockBody;

/// The header of a block. Its hash identifies the block and commits to the parent hash, so a run of headers can
/// be checked for linkage without the bodies.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Height of this block, the genesis block is 0
    pub number: u64,
    pub parent_hash: BlockHash,
    /// The work contributed by this block alone
    pub difficulty: Difficulty,
    pub timestamp: u64,
    /// Commitment to the transactions in the block body, see [`BlockBody::transactions_root`]
    pub transactions_root: FixedHash,
    pub extra_data: Vec<u8>,
}

impl BlockHeader {
    pub fn genesis(difficulty: Difficulty) -> Self {
        Self {
            number: 0,
            parent_hash: BlockHash::zero(),
            difficulty,
            timestamp: 0,
            transactions_root: BlockBody::empty().transactions_root(),
            extra_data: Vec::new(),
        }
    }

    /// Create a child of `prev` with an empty body and the same difficulty
    pub fn from_previous(prev: &BlockHeader) -> Self {
        Self {
            number: prev.number + 1,
            parent_hash: prev.hash(),
            difficulty: prev.difficulty,
            timestamp: prev.timestamp + 1,
            transactions_root: BlockBody::empty().transactions_root(),
            extra_data: Vec::new(),
        }
    }

    pub fn hash(&self) -> BlockHash {
        let mut difficulty = [0u8; 32];
        self.difficulty.to_big_endian(&mut difficulty);
        let mut hasher = Keccak256::new();
        hasher.update(self.number.to_be_bytes());
        hasher.update(self.parent_hash.as_slice());
        hasher.update(difficulty);
        hasher.update(self.timestamp.to_be_bytes());
        hasher.update(self.transactions_root.as_slice());
        hasher.update((self.extra_data.len() as u64).to_be_bytes());
        hasher.update(&self.extra_data);
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&hasher.finalize());
        hash.into()
    }

    /// True if `self` directly follows `prev`
    pub fn extends(&self, prev: &BlockHeader) -> bool {
        self.number == prev.number + 1 && self.parent_hash == prev.hash()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hash_commits_to_every_field() {
        let genesis = BlockHeader::genesis(1.into());
        let mut altered = genesis.clone();
        altered.extra_data = vec![1];
        assert_ne!(genesis.hash(), altered.hash());
        let mut altered = genesis.clone();
        altered.difficulty = 2.into();
        assert_ne!(genesis.hash(), altered.hash());
        assert_eq!(genesis.hash(), genesis.clone().hash());
    }

    #[test]
    fn from_previous_links_to_parent() {
        let genesis = BlockHeader::genesis(1.into());
        let child = BlockHeader::from_previous(&genesis);
        assert!(child.extends(&genesis));
        assert!(!genesis.extends(&child));
        let mut orphan = child.clone();
        orphan.parent_hash = BlockHash::zero();
        assert!(!orphan.extends(&genesis));
    }
}
