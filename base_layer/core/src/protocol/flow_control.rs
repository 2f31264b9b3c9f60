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
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use chainsync_common_types::types::PeerId;
use log::*;
use serde::{Deserialize, Serialize};
use tokio::time::{Duration, Instant};

use crate::{
    peers::Peer,
    protocol::{Capability, FlowControlError, MessageCode},
};

const LOG_TARGET: &str = "c::protocol::flow_control";

/// Cost of a request of one kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCost {
    pub base: u64,
    pub per_item: u64,
}

impl RequestCost {
    pub fn new(base: u64, per_item: u64) -> Self {
        Self { base, per_item }
    }

    pub fn cost(&self, count: u64) -> u64 {
        self.base.saturating_add(self.per_item.saturating_mul(count))
    }
}

/// Serving parameters of a light peer, announced in its status
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowControlParams {
    /// Ceiling of the buffer value
    /// Default: 300_000_000
    pub buffer_limit: u64,
    /// Maximum cost of each request kind
    pub max_request_cost: HashMap<MessageCode, RequestCost>,
    /// Buffer recharge per millisecond
    /// Default: 10_000
    pub max_recharge: u64,
}

impl FlowControlParams {
    pub fn cost(&self, code: MessageCode, count: u64) -> Result<u64, FlowControlError> {
        self.max_request_cost
            .get(&code)
            .map(|c| c.cost(count))
            .ok_or(FlowControlError::UnknownCost(code))
    }
}

impl Default for FlowControlParams {
    fn default() -> Self {
        let mut max_request_cost = HashMap::new();
        max_request_cost.insert(MessageCode::GetBlockHeaders, RequestCost::new(150_000, 30_000));
        max_request_cost.insert(MessageCode::GetBlockBodies, RequestCost::new(0, 700_000));
        Self {
            buffer_limit: 300_000_000,
            max_request_cost,
            max_recharge: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Ledger {
    buffer_value: i64,
    updated: Instant,
}

impl Ledger {
    /// Buffer value after recharging at `rate` per millisecond since the last update, capped at `limit`
    fn recharged(&self, now: Instant, rate: u64, limit: u64) -> i64 {
        let elapsed = now.saturating_duration_since(self.updated);
        let recharge = millis(elapsed).saturating_mul(rate);
        let limit = to_i64(limit);
        self.buffer_value.saturating_add(to_i64(recharge)).min(limit)
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Credit accounting for both directions of the light protocol.
///
/// As a server, `handle_request` charges requests from a peer against a buffer that recharges over time using the
/// local serving `params`. As a client, `handle_reply` records the buffer value a server reported, from which
/// `max_request_count` derives how many items may still be requested from it.
pub struct FlowControl {
    params: FlowControlParams,
    /// Peers we serve
    served: Mutex<HashMap<PeerId, Ledger>>,
    /// Peers serving us, as last reported by them
    servers: Mutex<HashMap<PeerId, Ledger>>,
}

impl FlowControl {
    pub fn new(params: FlowControlParams) -> Self {
        Self {
            params,
            served: Mutex::new(HashMap::new()),
            servers: Mutex::new(HashMap::new()),
        }
    }

    pub fn params(&self) -> &FlowControlParams {
        &self.params
    }

    /// Charge a request of `count` items from `peer_id` and return its remaining buffer value. A negative value
    /// means the peer exceeded its credit; its ledger is forgotten and the caller is expected to drop it.
    pub fn handle_request(&self, peer_id: &PeerId, code: MessageCode, count: u64) -> Result<i64, FlowControlError> {
        let cost = to_i64(self.params.cost(code, count)?);
        let now = Instant::now();
        let mut served = lock(&self.served);
        let ledger = served.entry(*peer_id).or_insert(Ledger {
            buffer_value: to_i64(self.params.buffer_limit),
            updated: now,
        });
        let buffer_value = ledger
            .recharged(now, self.params.max_recharge, self.params.buffer_limit)
            .saturating_sub(cost);
        if buffer_value < 0 {
            served.remove(peer_id);
            debug!(
                target: LOG_TARGET,
                "Peer {} exceeded its flow control buffer with a {} request of {} item(s)",
                peer_id.short_str(),
                code,
                count
            );
        } else {
            *ledger = Ledger {
                buffer_value,
                updated: now,
            };
        }
        Ok(buffer_value)
    }

    /// Record the buffer value reported by a serving peer in a reply
    pub fn handle_reply(&self, peer_id: &PeerId, buffer_value: u64) {
        lock(&self.servers).insert(*peer_id, Ledger {
            buffer_value: to_i64(buffer_value),
            updated: Instant::now(),
        });
    }

    /// The number of `code` items that can be requested from `peer` without exceeding its remaining buffer. Zero if
    /// the peer did not announce flow control parameters or prices `code` at nothing.
    pub fn max_request_count(&self, peer: &Peer, code: MessageCode) -> u64 {
        let params = match remote_params(peer) {
            Ok(params) => params,
            Err(err) => {
                debug!(target: LOG_TARGET, "No request budget for peer {}: {}", peer.id().short_str(), err);
                return 0;
            },
        };
        let cost = match params.max_request_cost.get(&code) {
            Some(cost) => *cost,
            None => return 0,
        };
        let buffer_value = lock(&self.servers)
            .get(peer.id())
            .map(|l| l.recharged(Instant::now(), params.max_recharge, params.buffer_limit))
            .unwrap_or_else(|| to_i64(params.buffer_limit));
        let available = u64::try_from(buffer_value).unwrap_or(0);
        if available < cost.base || cost.per_item == 0 {
            return 0;
        }
        (available - cost.base) / cost.per_item
    }

    /// Forget everything known about a peer
    pub fn remove_peer(&self, peer_id: &PeerId) {
        lock(&self.served).remove(peer_id);
        lock(&self.servers).remove(peer_id);
    }

    #[cfg(test)]
    fn is_serving(&self, peer_id: &PeerId) -> bool {
        lock(&self.served).contains_key(peer_id)
    }
}

fn remote_params(peer: &Peer) -> Result<FlowControlParams, FlowControlError> {
    peer.session(Capability::Les)?
        .status()
        .and_then(|s| s.flow_control)
        .ok_or(FlowControlError::NotAdvertised)
}

fn lock(ledgers: &Mutex<HashMap<PeerId, Ledger>>) -> MutexGuard<'_, HashMap<PeerId, Ledger>> {
    ledgers.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Default for FlowControl {
    fn default() -> Self {
        Self::new(FlowControlParams::default())
    }
}
