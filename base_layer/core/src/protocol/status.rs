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

use std::fmt::{Display, Formatter};

use chainsync_common_types::types::{BlockHash, Difficulty};
use serde::{Deserialize, Serialize};

use crate::protocol::FlowControlParams;

/// Status exchanged during the handshake. Eth peers leave the light protocol fields unset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainStatus {
    pub network_id: u64,
    pub total_difficulty: Difficulty,
    pub best_hash: BlockHash,
    pub genesis_hash: BlockHash,
    /// Number of the head block, only announced under les
    pub head_number: Option<u64>,
    /// Whether the peer answers header requests, only announced under les
    pub serve_headers: bool,
    /// Serving parameters of the peer, only announced under les
    pub flow_control: Option<FlowControlParams>,
}

impl ChainStatus {
    /// True if both statuses describe the same network and genesis block
    pub fn is_compatible_with(&self, other: &ChainStatus) -> bool {
        self.network_id == other.network_id && self.genesis_hash == other.genesis_hash
    }
}

impl Display for ChainStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "network: {}, td: {}, best: {}, genesis: {}",
            self.network_id,
            self.total_difficulty,
            self.best_hash.short_str(),
            self.genesis_hash.short_str()
        )?;
        if let Some(number) = self.head_number {
            write!(f, ", head: #{}", number)?;
        }
        Ok(())
    }
}
