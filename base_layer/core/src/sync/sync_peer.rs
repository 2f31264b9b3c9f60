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

use std::{
    cmp::Ordering,
    fmt::{Display, Formatter},
    sync::Arc,
};

use chainsync_common_types::types::{BlockHash, Difficulty, PeerId};

use crate::{peers::Peer, protocol::ChainStatus};

/// A candidate sync target together with the chain it advertised
#[derive(Clone)]
pub struct SyncPeer {
    peer: Arc<Peer>,
    status: ChainStatus,
}

impl SyncPeer {
    pub fn new(peer: Arc<Peer>, status: ChainStatus) -> Self {
        Self { peer, status }
    }

    pub fn peer(&self) -> &Arc<Peer> {
        &self.peer
    }

    pub fn id(&self) -> &PeerId {
        self.peer.id()
    }

    pub fn total_difficulty(&self) -> &Difficulty {
        &self.status.total_difficulty
    }

    pub fn best_hash(&self) -> &BlockHash {
        &self.status.best_hash
    }

    /// Height of the advertised head, if the peer announced it
    pub fn head_number(&self) -> Option<u64> {
        self.status.head_number
    }
}

impl Display for SyncPeer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Peer: {}, total difficulty: {}, best hash: {}, head: {}",
            self.peer,
            self.status.total_difficulty,
            self.status.best_hash.short_str(),
            self.head_number()
                .map(|n| format!("#{}", n))
                .unwrap_or_else(|| "--".to_string())
        )
    }
}

impl PartialEq for SyncPeer {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}
impl Eq for SyncPeer {}

impl Ord for SyncPeer {
    fn cmp(&self, other: &Self) -> Ordering {
        // Heavier chains first. Ties rank the lower peer id higher so selection is deterministic.
        self.total_difficulty()
            .cmp(other.total_difficulty())
            .then_with(|| other.id().cmp(self.id()))
    }
}

impl PartialOrd for SyncPeer {
    fn partial_cmp(&self, other: &SyncPeer) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_helpers::{create_peer, create_status, MockServer};

    fn sync_peer(id: u64, total_difficulty: u64) -> SyncPeer {
        let peer = create_peer(PeerId::from(id), &[], MockServer::new());
        SyncPeer::new(peer, create_status(total_difficulty))
    }

    #[test]
    fn it_orders_by_total_difficulty_then_id() {
        let mut peers = vec![sync_peer(1, 90), sync_peer(2, 150), sync_peer(3, 120), sync_peer(4, 150)];
        peers.sort();
        let order = peers.iter().map(|p| *p.id()).collect::<Vec<_>>();
        assert_eq!(order, vec![
            PeerId::from(1),
            PeerId::from(3),
            PeerId::from(4),
            PeerId::from(2)
        ]);
    }
}
