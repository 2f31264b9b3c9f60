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

use chainsync_common_types::types::PeerId;
use thiserror::Error;

use crate::{
    chain_storage::ChainStorageError,
    fetcher::FetchError,
    peers::{PeerError, PeerPoolError},
    protocol::ProtocolError,
};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("No peer qualifies as a sync target")]
    NoSyncTarget,
    #[error("Could not get the remote height of peer {peer}: {details}")]
    RemoteHeightUnavailable { peer: PeerId, details: String },
    #[error("Chain storage error: {0}")]
    ChainStorageError(#[from] ChainStorageError),
    #[error("Fetch error: {0}")]
    FetchError(#[from] FetchError),
    #[error("Peer error: {0}")]
    PeerError(#[from] PeerError),
    #[error("Peer pool error: {0}")]
    PeerPoolError(#[from] PeerPoolError),
    #[error("Protocol error: {0}")]
    ProtocolError(#[from] ProtocolError),
    #[error("Synchronization was interrupted by shutdown")]
    Interrupted,
    #[error("Synchronizer did not stop within {0:.2?}")]
    StopTimeout(Duration),
    #[error("Synchronizer task failed: {0}")]
    JoinError(String),
}
