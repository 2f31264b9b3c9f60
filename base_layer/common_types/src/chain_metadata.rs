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

use std::fmt::{Display, Error, Formatter};

use serde::{Deserialize, Serialize};

use crate::types::{BlockHash, Difficulty};

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ChainMetadata {
    /// The block number of the chain tip
    height: u64,
    /// The hash of the chain tip
    best_block_hash: BlockHash,
    /// The total difficulty of the chain up to and including the tip
    total_difficulty: Difficulty,
}

impl ChainMetadata {
    pub fn new(height: u64, best_block_hash: BlockHash, total_difficulty: Difficulty) -> Self {
        Self {
            height,
            best_block_hash,
            total_difficulty,
        }
    }

    #[inline]
    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn best_block_hash(&self) -> &BlockHash {
        &self.best_block_hash
    }

    pub fn total_difficulty(&self) -> Difficulty {
        self.total_difficulty
    }

    /// True if this chain is at least as heavy as `other`
    pub fn is_at_least_as_heavy_as(&self, other: &ChainMetadata) -> bool {
        self.total_difficulty >= other.total_difficulty
    }
}

impl Display for ChainMetadata {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result<(), Error> {
        write!(
            fmt,
            "Height: {}, Best block: {}, Total difficulty: {}",
            self.height,
            self.best_block_hash.short_str(),
            self.total_difficulty
        )
    }
}
