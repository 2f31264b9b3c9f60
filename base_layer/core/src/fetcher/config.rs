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

use std::time::Duration;

use chainsync_common::configuration::serializers;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
#[serde(default)]
pub struct FetcherConfig {
    /// Time a peer has to complete a task before it is banned and the task requeued.
    /// Default: 5 seconds
    #[serde(with = "serializers::seconds")]
    pub timeout: Duration,
    /// Time to wait before trying again when no progress can be made.
    /// Default: 1 second
    #[serde(with = "serializers::seconds")]
    pub interval: Duration,
    /// How long peers that time out are banned for.
    /// Default: 60 seconds
    #[serde(with = "serializers::seconds")]
    pub ban_time: Duration,
    /// Maximum number of tasks that may be in flight or awaiting delivery ahead of the next undelivered task.
    /// Default: 16
    pub max_queue: usize,
    /// Maximum number of items requested in a single task. `None` uses the default of the sync mode, 128 blocks for
    /// fast sync and 192 headers for light sync.
    pub max_per_request: Option<u64>,
    /// How long a stopping fetcher waits for in flight requests to settle.
    /// Default: 5 seconds
    #[serde(with = "serializers::seconds")]
    pub drain_timeout: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            interval: Duration::from_secs(1),
            ban_time: Duration::from_secs(60),
            max_queue: 16,
            max_per_request: None,
            drain_timeout: Duration::from_secs(5),
        }
    }
}
