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

use chainsync_common_types::types::PeerId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SyncState {
    #[default]
    Idle,
    SelectingTarget,
    Fetching {
        target: PeerId,
        first: u64,
        last: u64,
    },
    Synchronized {
        height: u64,
    },
    Failed(String),
}

impl Display for SyncState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncState::Idle => write!(f, "Idle"),
            SyncState::SelectingTarget => write!(f, "Selecting target"),
            SyncState::Fetching { target, first, last } => {
                write!(f, "Fetching #{}-#{} from {}", first, last, target.short_str())
            },
            SyncState::Synchronized { height } => write!(f, "Synchronized at #{}", height),
            SyncState::Failed(reason) => write!(f, "Failed: {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    TargetSelected { peer: PeerId, height: u64 },
    /// A batch was written to the local chain
    Imported { count: u64, height: u64 },
    /// A cycle completed having imported `count` items
    Synchronized { count: u64 },
    Failed(String),
}

impl Display for SyncEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncEvent::TargetSelected { peer, height } => {
                write!(f, "TargetSelected({}, #{})", peer.short_str(), height)
            },
            SyncEvent::Imported { count, height } => write!(f, "Imported({}, #{})", count, height),
            SyncEvent::Synchronized { count } => write!(f, "Synchronized({})", count),
            SyncEvent::Failed(reason) => write!(f, "Failed({})", reason),
        }
    }
}
