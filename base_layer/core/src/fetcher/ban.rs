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

use std::{sync::Arc, time::Duration};

use log::*;

use crate::peers::{Peer, PeerPool};

const LOG_TARGET: &str = "c::fetcher::ban";

// Peers are only banned while they are still in the pool. A peer that disconnected mid-task is gone already.

pub struct PeerBanManager {
    pool: Arc<PeerPool>,
    ban_time: Duration,
}

impl PeerBanManager {
    pub fn new(pool: Arc<PeerPool>, ban_time: Duration) -> Self {
        Self { pool, ban_time }
    }

    /// Ban `peer` for the configured period. Returns true if a ban was issued.
    pub async fn ban_peer_if_required(&self, peer: &Peer, ban_reason: &str) -> bool {
        if !self.pool.contains(peer.id()) {
            debug!(
                target: LOG_TARGET,
                "Peer {} disconnected before it could be banned because {}", peer, ban_reason
            );
            return false;
        }
        warn!(
            target: LOG_TARGET,
            "Banning peer {} for {:.2?} because {}", peer, self.ban_time, ban_reason
        );
        self.pool.ban(peer, self.ban_time).await;
        true
    }
}
