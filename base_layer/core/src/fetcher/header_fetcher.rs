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

use std::{ops::RangeInclusive, sync::Arc};

use async_trait::async_trait;
use chainsync_common_types::types::Difficulty;

use crate::{
    blocks::BlockHeader,
    fetcher::{FetchStrategy, ProcessOutcome, RequestError},
    peers::Peer,
    protocol::{Capability, FlowControl, GetBlockHeaders, MessageCode, ProtocolMessage},
};

/// A run of consecutive block numbers fetched as one task
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeaderRange {
    pub first: u64,
    pub count: u64,
}

impl HeaderRange {
    pub fn last(&self) -> u64 {
        self.first + self.count.saturating_sub(1)
    }

    /// Split `range` into consecutive tasks of at most `max` numbers each, lowest first
    pub fn split(range: RangeInclusive<u64>, max: u64) -> impl Iterator<Item = HeaderRange> + Send {
        let max = max.max(1);
        let (start, end) = range.into_inner();
        let mut next = Some(start).filter(|s| *s <= end);
        std::iter::from_fn(move || {
            let first = next?;
            let count = (end - first).min(max - 1) + 1;
            next = first.checked_add(count).filter(|n| *n <= end);
            Some(HeaderRange { first, count })
        })
    }
}

/// Check that `headers` are exactly the `count` headers numbered from `first`, each extending the previous one
pub(super) fn validate_headers(first: u64, count: u64, headers: &[BlockHeader]) -> Result<(), String> {
    if headers.len() as u64 != count {
        return Err(format!(
            "expected {} header(s) from #{}, received {}",
            count,
            first,
            headers.len()
        ));
    }
    if let Some((i, header)) = headers
        .iter()
        .enumerate()
        .find(|(i, h)| h.number != first + *i as u64)
    {
        return Err(format!("expected header #{}, received #{}", first + i as u64, header.number));
    }
    if let Some(pair) = headers.windows(2).find(|w| !w[1].extends(&w[0])) {
        return Err(format!("header #{} does not extend #{}", pair[1].number, pair[0].number));
    }
    let overflows = headers
        .iter()
        .try_fold(Difficulty::zero(), |total, h| total.checked_add(h.difficulty))
        .is_none();
    if overflows {
        return Err(format!("difficulty of headers #{}..#{} overflows", first, first + count - 1));
    }
    Ok(())
}

/// Fetches header ranges from les peers that serve headers, within the request budget they announced
pub struct HeaderFetchStrategy {
    flow_control: Arc<FlowControl>,
}

impl HeaderFetchStrategy {
    pub fn new(flow_control: Arc<FlowControl>) -> Self {
        Self { flow_control }
    }
}

#[async_trait]
impl FetchStrategy for HeaderFetchStrategy {
    type Item = BlockHeader;
    type Reply = Vec<BlockHeader>;
    type Task = HeaderRange;

    fn peer_filter(&self, peer: &Peer) -> bool {
        !peer.is_inbound() &&
            peer.session(Capability::Les)
                .ok()
                .and_then(|s| s.status())
                .map_or(false, |status| status.serve_headers)
    }

    async fn request(&self, task: &HeaderRange, peer: &Peer) -> Result<Vec<BlockHeader>, RequestError> {
        let session = peer.session(Capability::Les)?;
        let budget = self.flow_control.max_request_count(peer, MessageCode::GetBlockHeaders);
        if budget < task.count {
            return Err(RequestError::Declined(format!(
                "request budget of {} header(s) is below the {} needed",
                budget, task.count
            )));
        }

        let request = ProtocolMessage::GetBlockHeaders(GetBlockHeaders::range(task.first, task.count));
        match session.request(request).await? {
            ProtocolMessage::BlockHeaders { headers, buffer_value } => {
                if let Some(buffer_value) = buffer_value {
                    self.flow_control.handle_reply(peer.id(), buffer_value);
                }
                Ok(headers)
            },
            other => Err(RequestError::Malformed(format!("expected BlockHeaders, received {}", other))),
        }
    }

    fn process(&self, task: &HeaderRange, _peer: &Peer, reply: Vec<BlockHeader>) -> ProcessOutcome<BlockHeader> {
        match validate_headers(task.first, task.count, &reply) {
            Ok(()) => ProcessOutcome::Complete(reply),
            Err(reason) => ProcessOutcome::Retry(reason),
        }
    }
}
