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

use async_trait::async_trait;
use chainsync_common_types::types::PeerId;
use tokio::sync::broadcast;

use crate::peers::{Peer, PeerServerError};

/// Events emitted by a transport server
#[derive(Clone)]
pub enum ServerEvent {
    PeerConnected(Arc<Peer>),
    PeerDisconnected(PeerId),
    Error(PeerServerError),
}

/// A transport that accepts and dials peer connections. Connections are reported as [`ServerEvent`]s.
#[async_trait]
pub trait PeerServer: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Subscribe to connection events
    fn subscribe(&self) -> broadcast::Receiver<ServerEvent>;

    async fn open(&self) -> Result<(), PeerServerError>;

    async fn start(&self) -> Result<(), PeerServerError>;

    async fn stop(&self) -> Result<(), PeerServerError>;

    /// Refuse connections from `peer_id` for `duration`
    async fn ban(&self, peer_id: &PeerId, duration: Duration) -> Result<(), PeerServerError>;
}
